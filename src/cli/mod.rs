pub mod config;
pub mod ship;
pub mod show;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("bridge error: {0}")]
    Bridge(#[from] crate::bridge::BridgeError),

    #[error("emit error: {0}")]
    Emit(#[from] crate::emitter::EmitError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to render config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("log unavailable: {0}")]
    Unavailable(String),
}
