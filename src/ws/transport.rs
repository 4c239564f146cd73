//! WebSocket transport for the live connection
//!
//! The connection manager only sees the [`Transport`] and [`Socket`]
//! traits, so tests drive it with an in-memory pair instead of a real
//! server. The production implementation is tokio-tungstenite carrying
//! JSON text frames.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Dial or handshake failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Established socket failed on send.
    #[error("send failed: {0}")]
    Send(String),

    /// Established socket failed on receive.
    #[error("receive failed: {0}")]
    Recv(String),
}

/// Dialer for live sockets.
///
/// The connection manager holds one of these and re-dials it on every
/// attempt, so one value covers the whole reconnect lifetime.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Sock: Socket;

    async fn connect(&self, url: &str) -> Result<Self::Sock, TransportError>;
}

/// One established socket session.
#[async_trait]
pub trait Socket: Send + 'static {
    /// Send a text frame.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Next inbound text frame. `Ok(None)` means the peer closed.
    async fn recv(&mut self) -> Result<Option<String>, TransportError>;
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Production transport over tokio-tungstenite.
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    type Sock = WsSocket;

    async fn connect(&self, url: &str) -> Result<WsSocket, TransportError> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::debug!("websocket connected (status={})", response.status());
        Ok(WsSocket { stream })
    }
}

pub struct WsSocket {
    stream: WsStream,
}

#[async_trait]
impl Socket for WsSocket {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        tracing::trace!("ws send: {}", text);
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    /// Receive the next text frame, answering pings and skipping binary.
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    tracing::trace!("ws recv: {}", text);
                    return Ok(Some(text));
                }
                Some(Ok(Message::Ping(data))) => {
                    self.stream
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| TransportError::Send(e.to_string()))?;
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!("websocket closed: {:?}", frame);
                    return Ok(None);
                }
                Some(Ok(other)) => {
                    tracing::trace!("ws frame (ignored): {:?}", other);
                }
                Some(Err(e)) => return Err(TransportError::Recv(e.to_string())),
                None => return Ok(None),
            }
        }
    }
}
