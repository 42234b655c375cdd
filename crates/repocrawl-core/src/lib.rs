pub mod app_config;
pub mod boot;
pub mod collections;
pub mod config;

pub use app_config::{AppConfig, Environment, MailConfig};
pub use boot::{BootMode, BOOT_MODE_VAR};
pub use collections::Collection;
pub use config::{load_app_config, load_app_config_from_env};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
