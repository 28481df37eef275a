//! Connection state machine and relay loop.
//!
//! # Lifecycle
//!
//! ```text
//! Connecting ──handshake ok──► Open ──close / error / shutdown──► Closed
//!      │                                                            ▲
//!      └──────────────────────handshake failed──────────────────────┘
//! ```
//!
//! `Closed` is terminal for a connection instance. The bridge may open a
//! new instance afterwards when its retry policy allows.
//!
//! # Relay Loop
//!
//! While `Open`, a single `select!` loop handles:
//!
//! - Text frames from the server: parsed, wrapped, pushed to inbound
//! - Messages from the core's outbound channel: serialized, sent
//! - The core dropping its inbound receiver
//! - Shutdown commands from the session handle
//!
//! Each reaction runs to completion before the next one starts, so both
//! directions keep FIFO order.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, trace, warn};

use crate::bridge::events::{BridgeEvent, EventSink};
use crate::bridge::ports::BridgePorts;
use crate::protocol::{ReceiptClock, WrapPolicy, decode, encode};

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a connection instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Handshake in progress. Nothing is relayed.
    Connecting,
    /// Handshake done. Messages flow both ways.
    Open,
    /// Terminal. Nothing is relayed.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        })
    }
}

// ============================================================================
// CloseReason
// ============================================================================

/// Why a connection instance reached `Closed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The server sent a close frame.
    Remote {
        /// Close code, if the frame carried one.
        code: Option<u16>,
        /// Close reason text.
        reason: String,
    },
    /// The stream ended without a close frame.
    StreamEnded,
    /// Transport-level failure.
    Transport(String),
    /// The handshake failed.
    ConnectFailed(String),
    /// The application core dropped its channels.
    CoreGone,
    /// The session handle requested shutdown.
    Shutdown,
}

impl CloseReason {
    /// Returns `true` if the close was requested locally rather than caused
    /// by the server or the network.
    #[inline]
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::CoreGone | Self::Shutdown)
    }
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Commands from the session handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionCommand {
    /// Send a close frame and stop.
    Shutdown,
}

// ============================================================================
// Relay
// ============================================================================

/// Settings shared by every connection instance of one bridge.
#[derive(Debug, Clone)]
pub(crate) struct Relay {
    pub(crate) policy: WrapPolicy,
    pub(crate) clock: ReceiptClock,
    pub(crate) events: EventSink,
}

// ============================================================================
// Connection
// ============================================================================

/// One open WebSocket connection instance.
pub struct Connection<S> {
    instance: u32,
    ws_stream: WebSocketStream<S>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wraps a stream whose handshake has completed.
    pub(crate) fn new(instance: u32, ws_stream: WebSocketStream<S>) -> Self {
        Self {
            instance,
            ws_stream,
        }
    }

    /// Relays messages until the connection closes.
    ///
    /// Consumes the connection: once this returns the instance is `Closed`
    /// and its stream is dropped.
    pub(crate) async fn run(
        self,
        ports: &mut BridgePorts,
        commands: &mut mpsc::UnboundedReceiver<ConnectionCommand>,
        relay: &Relay,
    ) -> CloseReason {
        let instance = self.instance;
        let (mut ws_write, mut ws_read) = self.ws_stream.split();
        let core_inbound = ports.inbound_watch();
        let mut outbound_open = true;

        let reason = loop {
            tokio::select! {
                // Frames from the server
                frame = ws_read.next() => {
                    match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            if let Some(reason) = Self::handle_text(instance, &text, ports, relay) {
                                break reason;
                            }
                        }

                        Some(Ok(WsMessage::Close(frame))) => {
                            debug!(instance, ?frame, "WebSocket closed by remote");
                            break match frame {
                                Some(frame) => CloseReason::Remote {
                                    code: Some(u16::from(frame.code)),
                                    reason: frame.reason.as_str().to_string(),
                                },
                                None => CloseReason::Remote { code: None, reason: String::new() },
                            };
                        }

                        Some(Err(e)) => {
                            error!(instance, error = %e, "WebSocket error");
                            break CloseReason::Transport(e.to_string());
                        }

                        None => {
                            debug!(instance, "WebSocket stream ended");
                            break CloseReason::StreamEnded;
                        }

                        // Binary frames are outside the wire contract; ping/pong
                        // is answered by tungstenite.
                        Some(Ok(other)) => {
                            trace!(instance, kind = frame_kind(&other), "Ignoring non-text frame");
                        }
                    }
                }

                // Messages from the application core
                message = ports.next_outbound(), if outbound_open => {
                    match message {
                        Some(message) => {
                            let text = match encode(&message) {
                                Ok(text) => text,
                                Err(e) => {
                                    warn!(instance, error = %e, "Dropping unserializable outbound message");
                                    continue;
                                }
                            };

                            if let Err(e) = ws_write.send(WsMessage::Text(text.into())).await {
                                error!(instance, error = %e, "Failed to send outbound message");
                                break CloseReason::Transport(e.to_string());
                            }
                            trace!(instance, "Outbound message sent");
                        }

                        None => {
                            debug!(instance, "Outbound channel closed by core");
                            outbound_open = false;
                            if ports.core_gone() {
                                break CloseReason::CoreGone;
                            }
                        }
                    }
                }

                // Core dropped its inbound receiver
                () = core_inbound.closed() => {
                    debug!(instance, "Inbound channel closed by core");
                    break CloseReason::CoreGone;
                }

                // Commands from the session handle
                command = commands.recv() => {
                    match command {
                        Some(ConnectionCommand::Shutdown) | None => {
                            debug!(instance, "Shutdown requested");
                            let _ = ws_write.close().await;
                            break CloseReason::Shutdown;
                        }
                    }
                }
            }
        };

        debug!(instance, ?reason, "Connection closed");
        reason
    }

    /// Handles one inbound text frame. Returns a close reason if the core is gone.
    fn handle_text(
        instance: u32,
        text: &str,
        ports: &BridgePorts,
        relay: &Relay,
    ) -> Option<CloseReason> {
        let received_at = relay.clock.now_ms();

        let payload = match decode(text) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(instance, error = %e, len = text.len(), "Dropping malformed inbound payload");
                relay.events.emit(BridgeEvent::MalformedPayload {
                    instance,
                    raw: text.to_string(),
                    error: e.to_string(),
                });
                return None;
            }
        };

        if ports.deliver(relay.policy.apply(payload, received_at)).is_err() {
            debug!(instance, "Inbound channel closed by core");
            return Some(CloseReason::CoreGone);
        }

        trace!(instance, received_at, "Inbound message delivered");
        None
    }
}

/// Short frame type name for logs.
fn frame_kind(message: &WsMessage) -> &'static str {
    match message {
        WsMessage::Text(_) => "text",
        WsMessage::Binary(_) => "binary",
        WsMessage::Ping(_) => "ping",
        WsMessage::Pong(_) => "pong",
        WsMessage::Close(_) => "close",
        WsMessage::Frame(_) => "frame",
    }
}

// ============================================================================
// Tests
// ============================================================================
