//! Driver error types.

use thiserror::Error;

/// Errors produced by the UI driver.
#[derive(Error, Debug)]
pub enum DriverError {
    // Attach errors
    #[error("Unsupported Neovim version {major}.{minor}.{patch}")]
    UnsupportedVersion { major: i64, minor: i64, patch: i64 },

    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Neovim error: {0}")]
    Engine(String),

    #[error("RPC channel closed")]
    ChannelClosed,

    #[error("Neovim disconnected unexpectedly")]
    UnexpectedDisconnect,

    // Wire content errors
    #[error("Malformed payload: {0}")]
    Decode(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    /// Shorthand for a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Whether this error means the engine can no longer be used.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedVersion { .. } | Self::ChannelClosed | Self::UnexpectedDisconnect
        )
    }
}
