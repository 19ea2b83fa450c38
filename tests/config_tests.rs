use logtide::config::{load, load_config, BridgeConfig, ConfigError};
use logtide::oracle::CatchUpPolicy;
use logtide::Bridge;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_explicit_config_file_is_loaded() {
    let file = write_config(
        r#"
fluentd:
  host: fluentd
  port: 24224
store:
  log_group: jenkins
  endpoint: http://localstack:4566
catch_up:
  attempts: 5
  delay: 200ms
"#,
    );

    let config = load(Some(file.path())).unwrap();
    assert_eq!(config.store.log_group, "jenkins");
    assert_eq!(config.store.endpoint, "http://localstack:4566");

    let policy = CatchUpPolicy::from(&config.catch_up);
    assert_eq!(policy.attempts, 5);
    assert_eq!(policy.delay, Duration::from_millis(200));
}

#[test]
fn test_bad_yaml_is_a_parse_error() {
    let file = write_config("store: [not, a, map]\n");
    assert!(matches!(
        load_config(file.path()),
        Err(ConfigError::YamlParse(_))
    ));
}

#[tokio::test]
async fn test_bridge_from_config() {
    let config = BridgeConfig::from_lookup(|name| match name {
        "CLOUDWATCH_LOG_GROUP_NAME" => Some("jenkins".to_string()),
        "LOGTIDE_TRACK_DELIVERIES" => Some("false".to_string()),
        _ => None,
    })
    .unwrap();

    let bridge = Bridge::from_config(&config).unwrap();
    assert_eq!(bridge.log_group(), "jenkins");

    // Emitter creation is lazy: nothing connects until the first line.
    let emitter = bridge.logger_for("folder/job/3/").unwrap();
    assert!(!emitter.is_tracked());
    assert_eq!(emitter.key().stream, "folder/job");
}
