use super::CliError;
use crate::config::BridgeConfig;

/// Print the effective configuration as YAML.
pub fn print(config: &BridgeConfig) -> Result<(), CliError> {
    print!("{}", render(config)?);
    Ok(())
}

fn render(config: &BridgeConfig) -> Result<String, CliError> {
    Ok(serde_yaml::to_string(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn test_rendered_config_parses_back() {
        let config = parse_config("store:\n  log_group: jenkins\ncatch_up:\n  delay: 1500ms\n").unwrap();
        let yaml = render(&config).unwrap();
        assert!(yaml.contains("delay: 1500ms"));
        assert_eq!(parse_config(&yaml).unwrap(), config);
    }
}
