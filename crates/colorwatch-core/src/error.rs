//! Centralized error types for colorwatch.

use thiserror::Error;

/// Main error type for colorwatch operations.
#[derive(Error, Debug)]
pub enum ColorwatchError {
    #[error("Frame source error: {0}")]
    Source(String),

    #[error("Notification failed: {0}")]
    Notify(#[from] reqwest::Error),

    #[error("Notification queue is full")]
    QueueFull,

    #[error("Notification queue is closed")]
    QueueClosed,

    #[error("Notification abandoned: quit requested")]
    Cancelled,

    #[error("Invalid color range: {0}")]
    InvalidRange(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for colorwatch operations.
pub type ColorwatchResult<T> = Result<T, ColorwatchError>;

impl ColorwatchError {
    /// Create a frame source error.
    pub fn frame_source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
