use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum GhNotifyError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Notification not found: {0}")]
    NotificationNotFound(String),

    #[error("Engine is no longer running")]
    EngineGone,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, GhNotifyError>;
