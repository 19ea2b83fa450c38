use super::parse::{validate_config, ConfigError};
use super::types::*;
use std::str::FromStr;

pub const FLUENTD_HOST: &str = "FLUENTD_HOST";
pub const FLUENTD_PORT: &str = "FLUENTD_PORT";
pub const LOG_GROUP: &str = "CLOUDWATCH_LOG_GROUP_NAME";
pub const STORE_ENDPOINT: &str = "CLOUDWATCH_ENDPOINT";
pub const CATCH_UP_ATTEMPTS: &str = "LOGTIDE_CATCHUP_ATTEMPTS";
pub const CATCH_UP_DELAY: &str = "LOGTIDE_CATCHUP_DELAY";
pub const TRACK_DELIVERIES: &str = "LOGTIDE_TRACK_DELIVERIES";

impl BridgeConfig {
    /// Build the config from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_group = lookup(LOG_GROUP)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar(LOG_GROUP.to_string()))?;

        let mut config = BridgeConfig {
            fluentd: FluentdConfig::default(),
            store: StoreConfig {
                log_group,
                endpoint: default_store_endpoint(),
                request_timeout: std::time::Duration::from_secs(30),
            },
            catch_up: CatchUpConfig::default(),
            track_deliveries: true,
        };

        if let Some(host) = lookup(FLUENTD_HOST) {
            config.fluentd.host = host;
        }
        if let Some(port) = lookup(FLUENTD_PORT) {
            config.fluentd.port = parse_var(FLUENTD_PORT, &port)?;
        }
        if let Some(endpoint) = lookup(STORE_ENDPOINT) {
            config.store.endpoint = endpoint;
        }
        if let Some(attempts) = lookup(CATCH_UP_ATTEMPTS) {
            config.catch_up.attempts = parse_var(CATCH_UP_ATTEMPTS, &attempts)?;
        }
        if let Some(delay) = lookup(CATCH_UP_DELAY) {
            config.catch_up.delay =
                duration_format::parse_duration(&delay).map_err(|reason| ConfigError::InvalidVar {
                    name: CATCH_UP_DELAY.to_string(),
                    value: delay.clone(),
                    reason,
                })?;
        }
        if let Some(track) = lookup(TRACK_DELIVERIES) {
            config.track_deliveries = parse_var(TRACK_DELIVERIES, &track)?;
        }

        validate_config(&config)?;
        Ok(config)
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidVar {
        name: name.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}
