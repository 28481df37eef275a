//! Optional diagnostics stream.
//!
//! Off by default. When enabled with
//! [`SessionBridgeBuilder::error_channel`](super::SessionBridgeBuilder::error_channel),
//! the bridge reports lifecycle changes and failures that would otherwise
//! only show up as silence on the inbound channel.

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::mpsc;

use crate::transport::{CloseReason, ConnectionState};

// ============================================================================
// BridgeEvent
// ============================================================================

/// Diagnostic notification from the bridge.
///
/// `instance` numbers connection instances from 1; each retry opens a new one.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// A connection instance changed state.
    StateChanged {
        /// Connection instance.
        instance: u32,
        /// New state.
        state: ConnectionState,
    },

    /// The handshake failed.
    ConnectFailed {
        /// Connection instance.
        instance: u32,
        /// Failure description.
        error: String,
    },

    /// An inbound frame was not valid JSON and was dropped.
    MalformedPayload {
        /// Connection instance.
        instance: u32,
        /// Raw frame text.
        raw: String,
        /// Parser error.
        error: String,
    },

    /// A connection instance closed.
    Closed {
        /// Connection instance.
        instance: u32,
        /// Why it closed.
        reason: CloseReason,
    },
}

// ============================================================================
// EventSink
// ============================================================================

/// Sender side of the diagnostics stream; a no-op when disabled.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventSink {
    tx: Option<mpsc::UnboundedSender<BridgeEvent>>,
}

impl EventSink {
    /// Creates an enabled sink and its receiver.
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<BridgeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Creates a sink that drops every event.
    pub(crate) fn disabled() -> Self {
        Self::default()
    }

    pub(crate) fn emit(&self, event: BridgeEvent) {
        if let Some(tx) = &self.tx {
            // Nobody listening is fine.
            let _ = tx.send(event);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_sink_delivers() {
        let (sink, mut rx) = EventSink::channel();
        sink.emit(BridgeEvent::StateChanged {
            instance: 1,
            state: ConnectionState::Open,
        });
        assert_eq!(
            rx.try_recv().unwrap(),
            BridgeEvent::StateChanged {
                instance: 1,
                state: ConnectionState::Open
            }
        );
    }

    #[test]
    fn test_disabled_sink_is_noop() {
        EventSink::disabled().emit(BridgeEvent::ConnectFailed {
            instance: 1,
            error: "refused".into(),
        });
    }

    #[test]
    fn test_emit_after_receiver_dropped() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.emit(BridgeEvent::Closed {
            instance: 1,
            reason: CloseReason::StreamEnded,
        });
    }
}
