//! Error types for the fan remote

use thiserror::Error;

/// Result type alias for the fan remote
pub type Result<T> = std::result::Result<T, FanRemoteError>;

/// Failure of a single call against the sensor device.
///
/// Every variant is terminal for the call that produced it; nothing retries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected status: {0}")]
    BadStatus(u16),

    #[error("Malformed response body: {0}")]
    MalformedBody(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            NetworkError::MalformedBody(err.to_string())
        } else if let Some(status) = err.status() {
            NetworkError::BadStatus(status.as_u16())
        } else {
            NetworkError::Transport(err.to_string())
        }
    }
}

/// Rejected operator input
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    #[error("Manual fan speed is disabled while auto mode is on")]
    AutoModeActive,

    #[error("Invalid fan speed {0}: must be between 0.0 and 1.0")]
    InvalidSpeed(f32),
}

/// Main error type for the fan remote
#[derive(Error, Debug)]
pub enum FanRemoteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error("Fan monitor is not running")]
    MonitorStopped,
}
