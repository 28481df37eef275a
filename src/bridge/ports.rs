//! Channel contract between the bridge and the application core.
//!
//! The application core is a black box with two one-way channels:
//!
//! ```text
//!  ┌──────────────────┐   inbound    ┌──────────────┐
//!  │                  │◄─────────────│              │
//!  │ Application core │              │ SessionBridge│◄──► WebSocket
//!  │   (CorePorts)    │─────────────►│ (BridgePorts)│
//!  └──────────────────┘   outbound   └──────────────┘
//! ```
//!
//! Both directions are unbounded FIFO queues; order is preserved per
//! direction only.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::protocol::Message;

// ============================================================================
// Constructor
// ============================================================================

/// Creates a connected pair of core-side and bridge-side ports.
#[must_use]
pub fn pair() -> (CorePorts, BridgePorts) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    let core = CorePorts {
        inbound: InboundPort { rx: inbound_rx },
        outbound: OutboundPort { tx: outbound_tx },
    };
    let bridge = BridgePorts {
        inbound: inbound_tx,
        outbound: outbound_rx,
    };

    (core, bridge)
}

// ============================================================================
// OutboundPort
// ============================================================================

/// Core-side sender for messages bound for the server.
///
/// Cheap to clone, so UI handlers can hold their own copy.
#[derive(Debug, Clone)]
pub struct OutboundPort {
    tx: mpsc::UnboundedSender<Message>,
}

impl OutboundPort {
    /// Queues a message for transmission.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the bridge has stopped.
    pub fn send(&self, message: Message) -> Result<()> {
        self.tx.send(message).map_err(|_| Error::ConnectionClosed)
    }

    /// Serializes `message` and queues it for transmission.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if `message` has no JSON representation
    /// - [`Error::ConnectionClosed`] if the bridge has stopped
    pub fn send_serialized<T: Serialize + ?Sized>(&self, message: &T) -> Result<()> {
        self.send(serde_json::to_value(message)?)
    }

    /// Returns `true` once the bridge has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ============================================================================
// InboundPort
// ============================================================================

/// Core-side receiver for messages pushed by the bridge.
#[derive(Debug)]
pub struct InboundPort {
    rx: mpsc::UnboundedReceiver<Message>,
}

impl InboundPort {
    /// Waits for the next inbound message.
    ///
    /// Returns `None` once the bridge has stopped and the queue is drained.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Returns the next queued message without waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}

// ============================================================================
// CorePorts
// ============================================================================

/// Both channel ends held by the application core.
#[derive(Debug)]
pub struct CorePorts {
    inbound: InboundPort,
    outbound: OutboundPort,
}

impl CorePorts {
    /// Waits for the next inbound message.
    pub async fn recv(&mut self) -> Option<Message> {
        self.inbound.recv().await
    }

    /// Returns the next queued inbound message without waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.inbound.try_recv()
    }

    /// Queues a message for transmission.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the bridge has stopped.
    pub fn send(&self, message: Message) -> Result<()> {
        self.outbound.send(message)
    }

    /// Serializes `message` and queues it for transmission.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if `message` has no JSON representation
    /// - [`Error::ConnectionClosed`] if the bridge has stopped
    pub fn send_serialized<T: Serialize + ?Sized>(&self, message: &T) -> Result<()> {
        self.outbound.send_serialized(message)
    }

    /// Returns a clone of the outbound sender.
    #[must_use]
    pub fn outbound(&self) -> OutboundPort {
        self.outbound.clone()
    }

    /// Splits into independent inbound and outbound halves.
    #[must_use]
    pub fn into_parts(self) -> (InboundPort, OutboundPort) {
        (self.inbound, self.outbound)
    }
}

// ============================================================================
// BridgePorts
// ============================================================================

/// Both channel ends held by the bridge.
///
/// The bridge publishes to inbound and subscribes to outbound. It never
/// originates messages of its own.
#[derive(Debug)]
pub struct BridgePorts {
    inbound: mpsc::UnboundedSender<Message>,
    outbound: mpsc::UnboundedReceiver<Message>,
}

impl BridgePorts {
    /// Pushes a message onto the core's inbound channel.
    pub(crate) fn deliver(&self, message: Message) -> Result<()> {
        self.inbound.send(message).map_err(|_| Error::ConnectionClosed)
    }

    /// Waits for the next message emitted by the core.
    ///
    /// Returns `None` once every outbound sender is dropped.
    pub(crate) async fn next_outbound(&mut self) -> Option<Message> {
        self.outbound.recv().await
    }

    /// Returns a sender that resolves `closed()` once the core drops its
    /// inbound receiver.
    pub(crate) fn inbound_watch(&self) -> mpsc::UnboundedSender<Message> {
        self.inbound.clone()
    }

    /// Returns `true` if the core dropped its inbound receiver.
    #[inline]
    pub(crate) fn core_gone(&self) -> bool {
        self.inbound.is_closed()
    }
}

// ============================================================================
// Tests
// ============================================================================
