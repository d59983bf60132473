use thiserror::Error;

pub mod app_config;
pub mod config;
pub mod model;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use model::{AuthorInfo, Capability, Engagement, NewPost, Platform};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),
    #[error("unknown capability: {0}")]
    UnknownCapability(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingEnvVar(String),
    #[error("environment variable {var} is invalid: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
