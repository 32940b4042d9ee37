//! Vizbridge - Session bridge between autonomous agents and a
//! visualization/control plane
//!
//! Vizbridge connects a long-running agent process to an external
//! visualization backend over a persistent WebSocket, one connection per
//! session. Agent logic never touches the wire: it publishes domain events
//! onto an in-process event bus, and the bridge forwards a fixed set of
//! topics outward while republishing inbound control messages (human
//! takeover, tool responses, session control) back onto the bus.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       Agent Process                        │
//! │                                                            │
//! │  agent loop / tools / memory                               │
//! │        │ publish            ▲ subscribe                    │
//! │        ▼                    │                              │
//! │  ┌──────────────────────────┴────────┐                     │
//! │  │             EventBus              │                     │
//! │  └──────────────────────────┬────────┘                     │
//! │        ▲ republish          │ forward (fixed topic set)    │
//! │        │                    ▼                              │
//! │  ┌───────────────────────────────────┐                     │
//! │  │   BridgeConnection (per session)  │                     │
//! │  │   - outbound drain task (FIFO)    │                     │
//! │  │   - inbound receive + dispatch    │                     │
//! │  │   - reconnect w/ backoff          │                     │
//! │  └──────────────┬────────────────────┘                     │
//! │                 │ owned by BridgeManager (session registry)│
//! └─────────────────┼──────────────────────────────────────────┘
//!                   │ WebSocket (JSON envelopes)
//!                   ▼
//!         visualization / control plane
//! ```
//!
//! ## Modules
//!
//! - [`events`]: in-process publish/subscribe bus and topic catalogue
//! - [`bridge`]: per-session connections, wire protocol, session registry
//! - [`config`]: TOML-backed configuration
//! - [`error`]: crate error type

pub mod bridge;
pub mod config;
pub mod error;
pub mod events;

pub use bridge::{BridgeConnection, BridgeManager, ConnectionState};
pub use config::BridgeConfig;
pub use error::{Error, Result};
pub use events::{EventBus, EventPayload, SubscriptionId};
