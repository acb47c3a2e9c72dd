//! Error types for posemirror

use thiserror::Error;

/// Main error type for posemirror
#[derive(Error, Debug)]
pub enum PosemirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Avatar error: {0}")]
    Avatar(#[from] AvatarError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

/// Pose-tracking errors
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Pose receiver error: {0}")]
    Receiver(String),

    #[error("Pose packet parse error: {0}")]
    Parse(String),

    #[error("Tracker subprocess error: {0}")]
    Subprocess(String),
}

/// Avatar model errors
#[derive(Error, Debug)]
pub enum AvatarError {
    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Failed to fetch model: {0}")]
    Fetch(String),
}

/// Result type alias for posemirror operations
pub type Result<T> = std::result::Result<T, PosemirrorError>;
