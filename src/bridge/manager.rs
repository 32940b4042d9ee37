//! Session registry for bridge connections
//!
//! `BridgeManager` is the only entry point for obtaining or releasing a
//! [`BridgeConnection`], and the only writer of the session→connection map.
//! The map is guarded by a plain mutex scoped strictly to map mutations;
//! it is never held across connect/disconnect I/O.

use crate::bridge::connection::BridgeConnection;
use crate::bridge::transport::{Connector, WsConnector};
use crate::config::BridgeConfig;
use crate::events::EventBus;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Creates, looks up, and tears down per-session bridge connections
pub struct BridgeManager {
    connections: Mutex<HashMap<String, Arc<BridgeConnection>>>,
    bus: Arc<EventBus>,
    connector: Arc<dyn Connector>,
    config: BridgeConfig,
}

impl BridgeManager {
    /// Create a manager using the production WebSocket connector
    pub fn new(bus: Arc<EventBus>, config: BridgeConfig) -> Self {
        Self::with_connector(bus, Arc::new(WsConnector), config)
    }

    /// Create a manager with a custom transport connector
    pub fn with_connector(
        bus: Arc<EventBus>,
        connector: Arc<dyn Connector>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            bus,
            connector,
            config,
        }
    }

    /// Create and connect a bridge connection for a session.
    ///
    /// Idempotent: if a connection already exists for `session_id` it is
    /// returned unchanged, so a session never holds two transports. If the
    /// initial connect fails the registration is removed and `None` is
    /// returned; no orphaned entries are left behind.
    pub async fn create_connection(
        &self,
        session_id: &str,
        endpoint: &str,
    ) -> Option<Arc<BridgeConnection>> {
        let connection = {
            let mut connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(existing) = connections.get(session_id) {
                return Some(existing.clone());
            }
            let connection = Arc::new(BridgeConnection::new(
                session_id,
                self.bus.clone(),
                self.connector.clone(),
                &self.config,
            ));
            connections.insert(session_id.to_string(), connection.clone());
            connection
        };

        if !connection.connect(endpoint).await {
            tracing::error!(session_id, "Failed to connect bridge for session");
            self.connections
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(session_id);
            return None;
        }

        Some(connection)
    }

    /// Look up an existing connection. No side effects.
    pub fn get_connection(&self, session_id: &str) -> Option<Arc<BridgeConnection>> {
        self.connections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .cloned()
    }

    /// Close and remove the connection for a session.
    ///
    /// The registration is removed before `disconnect` runs, so concurrent
    /// lookups stop seeing the connection immediately. Returns `false` if
    /// the session was not registered.
    pub async fn close_connection(&self, session_id: &str) -> bool {
        let connection = self
            .connections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id);

        match connection {
            Some(connection) => {
                connection.disconnect().await;
                true
            }
            None => false,
        }
    }

    /// Close every registered connection. Snapshots the id list first, so
    /// concurrent registration or removal never double-closes.
    pub async fn close_all_connections(&self) {
        let session_ids: Vec<String> = {
            let connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
            connections.keys().cloned().collect()
        };

        for session_id in session_ids {
            self.close_connection(&session_id).await;
        }
    }

    /// Number of currently registered connections
    pub fn connection_count(&self) -> usize {
        self.connections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::transport::mock::MockConnector;

    fn make_manager(connector: Arc<MockConnector>) -> BridgeManager {
        let bus = Arc::new(EventBus::new());
        BridgeManager::with_connector(bus, connector, BridgeConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_connection_is_idempotent() {
        let connector = MockConnector::new();
        let manager = make_manager(connector.clone());

        let first = manager
            .create_connection("s1", "ws://test/agent")
            .await
            .unwrap();
        let second = manager
            .create_connection("s1", "ws://test/agent")
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        // Only one transport was ever opened
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_connect_leaves_no_registration() {
        let connector = MockConnector::new();
        connector.fail_next_connects(1);
        let manager = make_manager(connector.clone());

        let result = manager.create_connection("s1", "ws://test/agent").await;
        assert!(result.is_none());
        assert!(manager.get_connection("s1").is_none());
        assert_eq!(manager.connection_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_connection_after_create() {
        let connector = MockConnector::new();
        let manager = make_manager(connector);

        assert!(manager.get_connection("s1").is_none());
        manager
            .create_connection("s1", "ws://test/agent")
            .await
            .unwrap();

        let found = manager.get_connection("s1").unwrap();
        assert_eq!(found.session_id(), "s1");
        assert!(found.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_connection_removes_and_second_close_is_false() {
        let connector = MockConnector::new();
        let manager = make_manager(connector);

        manager
            .create_connection("s1", "ws://test/agent")
            .await
            .unwrap();

        assert!(manager.close_connection("s1").await);
        assert!(manager.get_connection("s1").is_none());
        assert!(!manager.close_connection("s1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_unknown_session_is_false() {
        let connector = MockConnector::new();
        let manager = make_manager(connector);
        assert!(!manager.close_connection("missing").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_all_connections() {
        let connector = MockConnector::new();
        let manager = make_manager(connector);

        manager
            .create_connection("s1", "ws://test/agent")
            .await
            .unwrap();
        manager
            .create_connection("s2", "ws://test/agent")
            .await
            .unwrap();
        assert_eq!(manager.connection_count(), 2);

        manager.close_all_connections().await;
        assert_eq!(manager.connection_count(), 0);
        assert!(manager.get_connection("s1").is_none());
        assert!(manager.get_connection("s2").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connections_are_independent_per_session() {
        let connector = MockConnector::new();
        let manager = make_manager(connector.clone());

        let first = manager
            .create_connection("s1", "ws://test/agent")
            .await
            .unwrap();
        let second = manager
            .create_connection("s2", "ws://test/agent")
            .await
            .unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(connector.connect_count(), 2);

        // Closing one session leaves the other connected
        manager.close_connection("s1").await;
        assert!(manager.get_connection("s2").unwrap().is_connected());
    }
}
