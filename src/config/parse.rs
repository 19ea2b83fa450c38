use super::types::*;
use crate::config::expand_env_vars;
use regex::Regex;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("You must specify the environment variable {0}")]
    MissingVar(String),

    #[error("environment variable {name}={value:?} is invalid: {reason}")]
    InvalidVar {
        name: String,
        value: String,
        reason: String,
    },

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<BridgeConfig, ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string)
}

/// Parse YAML config text, expanding `$env{VAR}` references first.
pub fn parse_config(yaml: &str) -> Result<BridgeConfig, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    let config: BridgeConfig = serde_yaml::from_str(&yaml_string)?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let re = Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| ConfigError::Validation(e.to_string()))?;
    let mut unexpanded_vars: Vec<String> = re
        .captures_iter(yaml_string)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with an actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

pub fn validate_config(config: &BridgeConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.store.log_group.trim().is_empty() {
        errors.push("store.log_group must not be empty".to_string());
    }
    if config.store.endpoint.trim().is_empty() {
        errors.push("store.endpoint must not be empty".to_string());
    }
    if config.fluentd.host.trim().is_empty() {
        errors.push("fluentd.host must not be empty".to_string());
    }
    if config.catch_up.attempts == 0 {
        errors.push("catch_up.attempts must be at least 1".to_string());
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(ConfigError::Validation(errors.remove(0))),
        _ => Err(ConfigError::ValidationList(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config("store:\n  log_group: jenkins\n").unwrap();
        assert_eq!(config.store.log_group, "jenkins");
        assert_eq!(config.store.endpoint, "http://localhost:4566");
        assert_eq!(config.fluentd.host, "localhost");
        assert_eq!(config.fluentd.port, 24224);
        assert_eq!(config.catch_up.attempts, 10);
        assert_eq!(config.catch_up.delay, Duration::from_secs(3));
        assert!(config.track_deliveries);
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
fluentd:
  host: fluentd.internal
  port: 24225
  connect_timeout: 2s
store:
  log_group: builds
  endpoint: http://proxy:8080
  request_timeout: 1m
catch_up:
  attempts: 4
  delay: 250ms
track_deliveries: false
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.fluentd.host, "fluentd.internal");
        assert_eq!(config.fluentd.port, 24225);
        assert_eq!(config.fluentd.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.store.request_timeout, Duration::from_secs(60));
        assert_eq!(config.catch_up.attempts, 4);
        assert_eq!(config.catch_up.delay, Duration::from_millis(250));
        assert!(!config.track_deliveries);
    }

    #[test]
    fn test_missing_log_group_is_rejected() {
        assert!(matches!(
            parse_config("store: {}\n"),
            Err(ConfigError::YamlParse(_))
        ));
        assert!(matches!(
            parse_config("store:\n  log_group: ''\n"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_multiple_validation_errors_are_listed() {
        let yaml = "store:\n  log_group: ''\ncatch_up:\n  attempts: 0\n";
        match parse_config(yaml) {
            Err(ConfigError::ValidationList(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation list, got {:?}", other),
        }
    }

    #[test]
    fn test_unexpanded_env_var_is_reported() {
        let yaml = "store:\n  log_group: $env{LOGTIDE_TEST_SURELY_UNSET_GROUP}\n";
        match parse_config(yaml) {
            Err(ConfigError::Validation(msg)) => {
                assert!(msg.contains("LOGTIDE_TEST_SURELY_UNSET_GROUP"))
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("LOGTIDE_TEST_GROUP", "from-env");
        let config = parse_config("store:\n  log_group: $env{LOGTIDE_TEST_GROUP}\n").unwrap();
        assert_eq!(config.store.log_group, "from-env");
        std::env::remove_var("LOGTIDE_TEST_GROUP");
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "store:\n  log_group: file-group").unwrap();
        file.flush().unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.store.log_group, "file-group");
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/nonexistent/logtide.yml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/logtide.yml"));
    }
}
