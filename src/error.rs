//! Vizbridge error types

use thiserror::Error;

/// Vizbridge error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bridge error
    #[error("Bridge error: {0}")]
    Bridge(String),

    /// Session error
    #[error("Session error: {0}")]
    Session(String),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for vizbridge operations
pub type Result<T> = std::result::Result<T, Error>;
