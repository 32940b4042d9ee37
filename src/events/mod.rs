//! In-process publish/subscribe
//!
//! The event bus is the sole coupling point between agent-side code and the
//! session bridge. Agent components publish domain events onto the bus; each
//! open bridge connection forwards a fixed set of topics to the control plane
//! and republishes inbound control messages as domain events.

pub mod bus;
pub mod topics;

pub use bus::{EventBus, EventPayload, SubscriptionId};
