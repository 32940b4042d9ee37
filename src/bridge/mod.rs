//! Session bridge to the visualization control plane
//!
//! One [`BridgeConnection`] per session, owned by the [`BridgeManager`]
//! registry. Connections forward event bus traffic outward as JSON envelopes
//! and republish inbound control messages as domain events.

pub mod connection;
mod dispatch;
pub mod manager;
pub mod protocol;
pub mod transport;

pub use connection::{BridgeConnection, ConnectionState};
pub use manager::BridgeManager;
pub use protocol::OutboundMessage;
pub use transport::{Connector, WsConnector};
