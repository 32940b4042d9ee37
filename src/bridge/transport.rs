//! Transport abstraction for control plane connections
//!
//! The bridge talks to the control plane through the [`Connector`] trait so
//! connections can run over a real WebSocket in production and an in-memory
//! channel pair in tests. A connect yields two independently owned halves —
//! the receive loop never contends with the drain loop for a shared handle.

use crate::error::Result;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

/// Write half of an established transport
#[async_trait]
pub trait TransportSink: Send {
    /// Write one text frame
    async fn send(&mut self, frame: String) -> Result<()>;
    /// Close the transport from the write side
    async fn close(&mut self) -> Result<()>;
}

/// Read half of an established transport
#[async_trait]
pub trait TransportStream: Send {
    /// Next text frame; `Ok(None)` means the peer closed the transport
    async fn next_frame(&mut self) -> Result<Option<String>>;
}

/// Factory opening transports to the control plane
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str)
        -> Result<(Box<dyn TransportSink>, Box<dyn TransportStream>)>;
}

// =============================================================================
// WebSocket connector
// =============================================================================

/// Production connector over `tokio-tungstenite`
#[derive(Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn TransportSink>, Box<dyn TransportStream>)> {
        let (socket, _response) = tokio_tungstenite::connect_async(url).await?;
        let (sink, stream) = socket.split();
        Ok((Box::new(WsSink { sink }), Box::new(WsStream { stream })))
    }
}

type WsSocket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

struct WsSink {
    sink: futures::stream::SplitSink<WsSocket, Message>,
}

#[async_trait]
impl TransportSink for WsSink {
    async fn send(&mut self, frame: String) -> Result<()> {
        self.sink.send(Message::Text(frame)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.sink.close().await?;
        Ok(())
    }
}

struct WsStream {
    stream: futures::stream::SplitStream<WsSocket>,
}

#[async_trait]
impl TransportStream for WsStream {
    async fn next_frame(&mut self) -> Result<Option<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Binary frames and protocol-level ping/pong are not part of
                // the bridge protocol; skip them.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}

// =============================================================================
// In-memory connector for tests
// =============================================================================
