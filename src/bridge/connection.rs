//! Per-session connection to the control plane
//!
//! A `BridgeConnection` owns one transport for one session and runs two
//! cooperatively scheduled tasks: an outbound drain loop that writes queued
//! messages to the wire in FIFO order, and an inbound receive loop that
//! decodes control messages and republishes them on the event bus. Either
//! task can trigger the reconnection state machine; an explicit `disconnect`
//! always preempts it.
//!
//! All mutable state here is owned by the connection and touched only by its
//! own tasks or through the public entry points; the registry in
//! [`super::manager`] is the only component that shares connections across
//! tasks.

use crate::bridge::protocol::{OutboundMessage, MSG_CONNECTION};
use crate::bridge::transport::{Connector, TransportSink, TransportStream};
use crate::config::{BridgeConfig, ReconnectConfig};
use crate::error::{Error, Result};
use crate::events::topics::{outbound_category, OUTBOUND_TOPICS};
use crate::events::{EventBus, EventPayload, SubscriptionId};
use serde_json::json;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock as StdRwLock};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lifecycle state of a bridge connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport open; initial state and the result of `disconnect`
    Disconnected,
    /// Transport handshake in progress
    Connecting,
    /// Transport open, drain and receive tasks running
    Connected,
    /// Transport lost, backoff/retry cycle in progress
    Reconnecting,
    /// Reconnect budget exhausted; only the registry can remove this
    Terminated,
}

/// One transport connection for one session
pub struct BridgeConnection {
    inner: Arc<ConnectionInner>,
}

pub(crate) struct ConnectionInner {
    session_id: String,
    client_type: String,
    reconnect: ReconnectConfig,
    bus: Arc<EventBus>,
    connector: Arc<dyn Connector>,
    state: StdRwLock<ConnectionState>,
    /// Base endpoint of the first successful connect; reused by reconnects
    endpoint: StdRwLock<Option<String>>,
    outbound_tx: mpsc::Sender<OutboundMessage>,
    /// Taken by the drain task on first connect
    outbound_rx: StdMutex<Option<mpsc::Receiver<OutboundMessage>>>,
    sink: AsyncMutex<Option<Box<dyn TransportSink>>>,
    subscriptions: StdMutex<Vec<(&'static str, SubscriptionId)>>,
    reconnect_attempts: AtomicU32,
    /// Incremented on every successful connect. Tasks record the generation
    /// of the transport they work against and use it to tell a live outage
    /// apart from leftovers of an already-replaced transport.
    generation: AtomicU64,
    /// Serializes reconnection triggers from the drain and receive tasks
    reconnect_gate: AsyncMutex<()>,
    drain_task: StdMutex<Option<JoinHandle<()>>>,
    receive_task: StdMutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl BridgeConnection {
    /// Create a connection for a session. No transport is opened until
    /// [`connect`](Self::connect) is called.
    pub fn new(
        session_id: impl Into<String>,
        bus: Arc<EventBus>,
        connector: Arc<dyn Connector>,
        config: &BridgeConfig,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(config.control_plane.outbound_queue_size);
        Self {
            inner: Arc::new(ConnectionInner {
                session_id: session_id.into(),
                client_type: config.control_plane.client_type.clone(),
                reconnect: config.reconnect,
                bus,
                connector,
                state: StdRwLock::new(ConnectionState::Disconnected),
                endpoint: StdRwLock::new(None),
                outbound_tx,
                outbound_rx: StdMutex::new(Some(outbound_rx)),
                sink: AsyncMutex::new(None),
                subscriptions: StdMutex::new(Vec::new()),
                reconnect_attempts: AtomicU32::new(0),
                generation: AtomicU64::new(0),
                reconnect_gate: AsyncMutex::new(()),
                drain_task: StdMutex::new(None),
                receive_task: StdMutex::new(None),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Session this connection belongs to
    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// Whether the connection currently has an open transport
    pub fn is_connected(&self) -> bool {
        self.inner.state() == ConnectionState::Connected
    }

    /// Open the transport to the control plane.
    ///
    /// On success the drain and receive tasks start, the connection
    /// subscribes to the fixed outbound topic set, and a `connection`
    /// announcement is enqueued. On any transport failure the connection
    /// stays `Disconnected` and `false` is returned; retrying is the
    /// reconnection state machine's job, not the caller's.
    pub async fn connect(&self, endpoint: &str) -> bool {
        self.inner.clone().connect(endpoint).await
    }

    /// Tear the connection down: unsubscribe from the bus, cancel both tasks
    /// and await their completion, close the transport. Safe to call on a
    /// connection that never connected, and always wins over an in-flight
    /// reconnection attempt.
    pub async fn disconnect(&self) -> bool {
        self.inner.disconnect().await
    }

    /// Enqueue an outbound message without blocking.
    ///
    /// Returns `false` if the connection is not in a connected-capable state
    /// (`Connected` or `Reconnecting`) or if the bounded queue is full; the
    /// message is not silently buffered while fully disconnected.
    pub fn send_message(&self, message_type: &str, data: EventPayload) -> bool {
        self.inner.send_message(message_type, data)
    }
}

impl Drop for BridgeConnection {
    fn drop(&mut self) {
        // If the owner forgot to disconnect, make sure the drain and receive
        // tasks stop referencing this connection.
        self.inner.shutdown.cancel();
    }
}

impl ConnectionInner {
    pub(crate) fn session_id(&self) -> &str {
        &self.session_id
    }

    pub(crate) fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Connected or in a recoverable outage; enqueueing is allowed
    fn sendable(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Connected | ConnectionState::Reconnecting
        )
    }

    pub(crate) fn send_message(&self, message_type: &str, data: EventPayload) -> bool {
        if !self.sendable() {
            return false;
        }
        let msg = OutboundMessage::new(message_type, data, &self.session_id);
        match self.outbound_tx.try_send(msg) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    message_type,
                    "Outbound queue rejected message: {}",
                    e
                );
                false
            }
        }
    }

    /// Enqueue a bus event wrapped in its wire category. Not being in a
    /// connected-capable state is a silent gap, not an error; a full queue is.
    fn forward_event(&self, category: &'static str, data: EventPayload) -> Result<()> {
        if !self.sendable() {
            tracing::trace!(session_id = %self.session_id, category, "Not connected, event not forwarded");
            return Ok(());
        }
        let msg = OutboundMessage::new(category, data, &self.session_id);
        self.outbound_tx.try_send(msg).map_err(|_| {
            Error::Bridge(format!(
                "outbound queue full, dropped {} for session {}",
                category, self.session_id
            ))
        })
    }

    // =========================================================================
    // Connect / disconnect
    // =========================================================================

    async fn connect(self: Arc<Self>, endpoint: &str) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }
        match self.state() {
            ConnectionState::Connected => return true,
            ConnectionState::Terminated => return false,
            _ => {}
        }

        self.set_state(ConnectionState::Connecting);
        let url = format!("{}?session_id={}", endpoint, self.session_id);

        let (sink, stream) = match self.connector.connect(&url).await {
            Ok(halves) => halves,
            Err(e) => {
                tracing::warn!(session_id = %self.session_id, %url, "Failed to connect to control plane: {}", e);
                self.set_state(ConnectionState::Disconnected);
                return false;
            }
        };

        *self.sink.lock().await = Some(sink);
        *self.endpoint.write().unwrap_or_else(|e| e.into_inner()) = Some(endpoint.to_string());
        self.reconnect_attempts.store(0, Ordering::SeqCst);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_state(ConnectionState::Connected);

        self.clone().spawn_drain_task();
        self.clone().spawn_receive_task(stream, generation);
        self.clone().subscribe_to_bus();

        tracing::info!(session_id = %self.session_id, %url, "Connected to control plane");

        let mut data = EventPayload::new();
        data.insert("status".to_string(), json!("connected"));
        data.insert(
            "client_info".to_string(),
            json!({
                "type": self.client_type,
                "version": env!("CARGO_PKG_VERSION"),
            }),
        );
        self.send_message(MSG_CONNECTION, data);

        true
    }

    async fn disconnect(&self) -> bool {
        self.unsubscribe_from_bus();
        self.shutdown.cancel();

        let drain = self
            .drain_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let receive = self
            .receive_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        for handle in [drain, receive].into_iter().flatten() {
            let _ = handle.await;
        }

        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.close().await;
        }

        self.set_state(ConnectionState::Disconnected);
        tracing::info!(session_id = %self.session_id, "Disconnected from control plane");
        true
    }

    // =========================================================================
    // Bus subscriptions
    // =========================================================================

    /// Subscribe to the fixed outbound topic set. Runs at most once per
    /// connection lifetime: reconnects reuse the original subscriptions, so
    /// repeated outages never cause duplicate forwarding.
    fn subscribe_to_bus(self: Arc<Self>) {
        let mut subscriptions = self.subscriptions.lock().unwrap_or_else(|e| e.into_inner());
        if !subscriptions.is_empty() {
            return;
        }

        for &topic in OUTBOUND_TOPICS {
            let Some(category) = outbound_category(topic) else {
                continue;
            };
            let weak = Arc::downgrade(&self);
            let id = self.bus.subscribe(topic, move |payload| {
                match weak.upgrade() {
                    Some(inner) => inner.forward_event(category, payload),
                    // Connection already dropped; stale subscription
                    None => Ok(()),
                }
            });
            subscriptions.push((topic, id));
        }
    }

    fn unsubscribe_from_bus(&self) {
        let drained: Vec<_> = self
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for (topic, id) in drained {
            self.bus.unsubscribe(topic, id);
        }
    }

    // =========================================================================
    // Outbound drain task
    // =========================================================================

    fn spawn_drain_task(self: Arc<Self>) {
        let rx = self
            .outbound_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        // Already running (this is a reconnect); the drain task survives
        // transport outages.
        let Some(rx) = rx else { return };

        let inner = self.clone();
        let handle = tokio::spawn(async move { inner.run_drain_loop(rx).await });
        *self.drain_task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    async fn run_drain_loop(self: Arc<Self>, mut rx: mpsc::Receiver<OutboundMessage>) {
        loop {
            let msg = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                msg = rx.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };

            let generation = self.generation.load(Ordering::SeqCst);
            if let Err(e) = self.write_frame(&msg).await {
                tracing::warn!(
                    session_id = %self.session_id,
                    message_type = %msg.message_type,
                    "Failed to send message: {}",
                    e
                );
                self.clone().attempt_reconnect(generation).await;
                if self.state() == ConnectionState::Terminated {
                    tracing::error!(session_id = %self.session_id, "Connection terminated, abandoning outbound queue");
                    break;
                }
                // Keep the failed message; it goes back to the queue for the
                // next delivery attempt.
                if self.outbound_tx.try_send(msg).is_err() {
                    tracing::error!(session_id = %self.session_id, "Outbound queue full, message dropped after reconnect");
                }
            }

            // Cooperative scheduling: never monopolize the worker even with a
            // backed-up queue.
            tokio::task::yield_now().await;
        }
    }

    async fn write_frame(&self, msg: &OutboundMessage) -> Result<()> {
        let frame = serde_json::to_string(msg)?;
        let mut sink = self.sink.lock().await;
        match sink.as_mut() {
            // A wedged transport write must not outlive `disconnect`
            Some(sink) => tokio::select! {
                _ = self.shutdown.cancelled() => {
                    Err(Error::Transport("connection shutting down".to_string()))
                }
                result = sink.send(frame) => result,
            },
            None => Err(Error::Transport("no open transport".to_string())),
        }
    }

    // =========================================================================
    // Inbound receive task
    // =========================================================================

    fn spawn_receive_task(self: Arc<Self>, stream: Box<dyn TransportStream>, generation: u64) {
        let inner = self.clone();
        let handle = tokio::spawn(async move { inner.run_receive_loop(stream, generation).await });
        *self.receive_task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    async fn run_receive_loop(self: Arc<Self>, mut stream: Box<dyn TransportStream>, generation: u64) {
        loop {
            let frame = tokio::select! {
                _ = self.shutdown.cancelled() => return,
                frame = stream.next_frame() => frame,
            };

            // A reconnect replaced the transport while this task waited;
            // whatever the old stream yields now is stale.
            if self.generation.load(Ordering::SeqCst) != generation {
                return;
            }

            match frame {
                Ok(Some(text)) => match serde_json::from_str(&text) {
                    Ok(frame) => self.dispatch_frame(frame),
                    // One bad frame does not cost us the connection
                    Err(e) => {
                        tracing::warn!(session_id = %self.session_id, "Ignoring malformed frame: {}", e);
                    }
                },
                Ok(None) => {
                    tracing::warn!(session_id = %self.session_id, "Control plane closed the connection");
                    self.clone().attempt_reconnect(generation).await;
                    return;
                }
                Err(e) => {
                    tracing::warn!(session_id = %self.session_id, "Transport receive error: {}", e);
                    self.clone().attempt_reconnect(generation).await;
                    return;
                }
            }
        }
    }

    // =========================================================================
    // Reconnection state machine
    // =========================================================================

    /// Run backoff/retry cycles until the transport is re-established, the
    /// attempt budget is exhausted (→ `Terminated`), or `disconnect` preempts.
    ///
    /// `observed_generation` is the generation of the transport whose failure
    /// triggered the call; if it no longer matches, another task has already
    /// replaced that transport and this trigger is obsolete.
    async fn attempt_reconnect(self: Arc<Self>, observed_generation: u64) -> bool {
        let _gate = self.reconnect_gate.lock().await;

        if self.generation.load(Ordering::SeqCst) != observed_generation {
            return self.state() == ConnectionState::Connected;
        }

        loop {
            if self.shutdown.is_cancelled() || self.state() == ConnectionState::Terminated {
                return false;
            }

            let attempt = self.reconnect_attempts.load(Ordering::SeqCst) + 1;
            if attempt > self.reconnect.max_attempts {
                tracing::error!(
                    session_id = %self.session_id,
                    max_attempts = self.reconnect.max_attempts,
                    "Maximum reconnection attempts reached"
                );
                self.set_state(ConnectionState::Terminated);
                return false;
            }
            self.reconnect_attempts.store(attempt, Ordering::SeqCst);
            self.set_state(ConnectionState::Reconnecting);

            let delay = backoff_delay(Duration::from_millis(self.reconnect.base_delay_ms), attempt);
            tracing::info!(
                session_id = %self.session_id,
                attempt,
                max_attempts = self.reconnect.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting after backoff"
            );

            tokio::select! {
                _ = self.shutdown.cancelled() => return false,
                _ = tokio::time::sleep(delay) => {}
            }

            // Drop the stale write half before dialing again
            if let Some(mut sink) = self.sink.lock().await.take() {
                let _ = sink.close().await;
            }

            let endpoint = self
                .endpoint
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone();
            let Some(endpoint) = endpoint else {
                self.set_state(ConnectionState::Disconnected);
                return false;
            };

            let reconnected = tokio::select! {
                _ = self.shutdown.cancelled() => return false,
                ok = self.clone().connect(&endpoint) => ok,
            };
            if reconnected {
                return true;
            }
        }
    }
}

/// Exponential backoff: `base * 2^(attempt-1)` for `attempt >= 1`.
/// Deterministic by design; no jitter.
pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}
