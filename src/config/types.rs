use crate::oracle::CatchUpPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub fluentd: FluentdConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub catch_up: CatchUpConfig,
    /// Record delivery watermarks for emitted lines. Off on remote agents,
    /// which cannot see the controller's watermark table.
    #[serde(default = "default_track_deliveries")]
    pub track_deliveries: bool,
}

fn default_track_deliveries() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FluentdConfig {
    #[serde(default = "default_fluentd_host")]
    pub host: String,
    #[serde(default = "default_fluentd_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout", with = "duration_format")]
    pub connect_timeout: Duration,
}

impl Default for FluentdConfig {
    fn default() -> Self {
        Self {
            host: default_fluentd_host(),
            port: default_fluentd_port(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

pub(crate) fn default_fluentd_host() -> String {
    "localhost".to_string()
}

pub(crate) fn default_fluentd_port() -> u16 {
    24224
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub log_group: String,
    #[serde(default = "default_store_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_request_timeout", with = "duration_format")]
    pub request_timeout: Duration,
}

pub(crate) fn default_store_endpoint() -> String {
    "http://localhost:4566".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchUpConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_delay", with = "duration_format")]
    pub delay: Duration,
}

impl Default for CatchUpConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            delay: default_delay(),
        }
    }
}

fn default_attempts() -> u32 {
    crate::oracle::DEFAULT_ATTEMPTS
}

fn default_delay() -> Duration {
    crate::oracle::DEFAULT_DELAY
}

impl From<&CatchUpConfig> for CatchUpPolicy {
    fn from(config: &CatchUpConfig) -> Self {
        Self {
            attempts: config.attempts,
            delay: config.delay,
        }
    }
}

// Custom serde module for duration parsing
pub(crate) mod duration_format {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty duration string".to_string());
        }

        let (value_str, unit) = if let Some(v) = s.strip_suffix("ms") {
            (v, "ms")
        } else if let Some(v) = s.strip_suffix('s') {
            (v, "s")
        } else if let Some(v) = s.strip_suffix('m') {
            (v, "m")
        } else if let Some(v) = s.strip_suffix('h') {
            (v, "h")
        } else {
            return Err(format!("invalid duration format: {}", s));
        };

        let value: u64 = value_str
            .parse()
            .map_err(|_| format!("invalid numeric value: {}", value_str))?;

        let duration = match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value * 60),
            "h" => Duration::from_secs(value * 3600),
            _ => return Err(format!("unknown unit: {}", unit)),
        };

        Ok(duration)
    }

    pub fn format_duration(d: Duration) -> String {
        let secs = d.as_secs();
        if d.subsec_millis() != 0 || secs == 0 {
            format!("{}ms", d.as_millis())
        } else if secs % 3600 == 0 {
            format!("{}h", secs / 3600)
        } else if secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}
