//! Vizbridge configuration management

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main vizbridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Control plane connection configuration
    #[serde(default)]
    pub control_plane: ControlPlaneConfig,

    /// Reconnection behavior
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Control plane connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    /// Base WebSocket URL of the control plane. The connection appends
    /// its own `session_id` query parameter.
    pub endpoint: String,

    /// Maximum number of outbound messages buffered per connection
    pub outbound_queue_size: usize,

    /// Client type reported in the connection announcement
    pub client_type: String,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:3001/agent".to_string(),
            outbound_queue_size: 256,
            client_type: "rust_agent".to_string(),
        }
    }
}

/// Reconnection behavior configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Maximum reconnection attempts before a connection is terminated
    pub max_attempts: u32,

    /// Initial backoff delay in milliseconds; doubles on every attempt
    pub base_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.control_plane.endpoint, "ws://localhost:3001/agent");
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.base_delay_ms, 1000);
        assert_eq!(config.control_plane.outbound_queue_size, 256);
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: BridgeConfig = toml::from_str(
            r#"
            [reconnect]
            max_attempts = 3
            base_delay_ms = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.reconnect.base_delay_ms, 50);
        assert_eq!(config.control_plane.endpoint, "ws://localhost:3001/agent");
    }
}
