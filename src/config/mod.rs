pub mod env;
pub mod parse;
pub mod types;

use regex::Regex;
use std::path::{Path, PathBuf};

pub use parse::{load_config, parse_config, ConfigError};
pub use types::{BridgeConfig, CatchUpConfig, FluentdConfig, StoreConfig};

/// Expands environment variables in a string.
/// Supports $env{VAR_NAME} syntax.
/// If an environment variable is not set, it's left unchanged.
pub fn expand_env_vars(text: &str) -> String {
    let Ok(re) = Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}") else {
        return text.to_string();
    };

    re.replace_all(text, |caps: &regex::Captures| {
        let whole = caps.get(0).map_or("", |m| m.as_str());
        caps.get(1)
            .and_then(|name| std::env::var(name.as_str()).ok())
            .unwrap_or_else(|| whole.to_string())
    })
    .to_string()
}

/// Expands tilde (~) in paths to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(rest);
        }
    } else if path_str == "~" {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir;
        }
    }

    path.to_path_buf()
}

/// Resolves the config file path based on explicit argument or default locations.
/// Returns the first existing path from:
/// 1. Explicit path (if provided, with tilde expansion)
/// 2. ~/.config/logtide/config.yml
/// 3. /etc/logtide/config.yml
///
/// `None` means the configuration comes from the environment.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(expand_tilde(path));
    }

    if let Some(home_dir) = dirs::home_dir() {
        let user_config = home_dir.join(".config/logtide/config.yml");
        if user_config.exists() {
            return Some(user_config);
        }
    }

    let system_config = PathBuf::from("/etc/logtide/config.yml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Load from the resolved config file if there is one, otherwise from the
/// environment.
pub fn load(explicit: Option<&Path>) -> Result<BridgeConfig, ConfigError> {
    match resolve_config_path(explicit) {
        Some(path) => {
            tracing::info!(config_path = %path.display(), "Loading configuration file");
            load_config(&path)
        }
        None => BridgeConfig::from_env(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars_single() {
        std::env::set_var("LOGTIDE_TEST_VAR", "test_value");
        let result = expand_env_vars("group/$env{LOGTIDE_TEST_VAR}/x");
        assert_eq!(result, "group/test_value/x");
        std::env::remove_var("LOGTIDE_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_unset() {
        let result = expand_env_vars("group/$env{LOGTIDE_NONEXISTENT_VAR}");
        assert_eq!(result, "group/$env{LOGTIDE_NONEXISTENT_VAR}");
    }

    #[test]
    fn test_expand_env_vars_no_expansion() {
        assert_eq!(expand_env_vars("plain text"), "plain text");
    }

    #[test]
    fn test_expand_tilde_with_path() {
        let expanded = expand_tilde(Path::new("~/logtide.yml"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("logtide.yml"));
        }
    }

    #[test]
    fn test_expand_tilde_no_expansion() {
        assert_eq!(
            expand_tilde(Path::new("/etc/logtide/config.yml")),
            Path::new("/etc/logtide/config.yml")
        );
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = resolve_config_path(Some(Path::new("/tmp/custom.yml")));
        assert_eq!(path, Some(PathBuf::from("/tmp/custom.yml")));
    }
}
