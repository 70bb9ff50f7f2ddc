use crate::platform::Platform;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PulseError>;

#[derive(Debug, Error)]
pub enum PulseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("Invalid {platform} payload: {reason}")]
    InvalidPayload { platform: Platform, reason: String },

    #[error("Persistence error: {0}")]
    Persistence(String),
}
