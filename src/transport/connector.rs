//! WebSocket client handshake.
//!
//! [`Connector`] is the seam between the bridge and the network: the
//! bridge only ever sees a [`WebSocketStream`], so tests can swap in an
//! in-memory transport.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Connector
// ============================================================================

/// Opens WebSocket connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Byte stream underneath the WebSocket.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Performs the handshake with `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the handshake is refused or the
    /// endpoint is unreachable.
    async fn connect(&self, url: &Url) -> Result<WebSocketStream<Self::Stream>>;
}

// ============================================================================
// TcpConnector
// ============================================================================

/// Connects over TCP.
///
/// `wss://` endpoints require the crate's `tls` feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Stream = MaybeTlsStream<TcpStream>;

    async fn connect(&self, url: &Url) -> Result<WebSocketStream<Self::Stream>> {
        let (ws_stream, response) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::connection(format!("WebSocket handshake failed: {e}")))?;

        debug!(%url, status = %response.status(), "WebSocket handshake completed");
        Ok(ws_stream)
    }
}

// ============================================================================
// Tests
// ============================================================================
