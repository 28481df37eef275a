//! Wire contract between the bridge and the server.
//!
//! # Protocol Overview
//!
//! | Direction | Frame | Delivered as |
//! |-----------|-------|--------------|
//! | Server → Bridge | UTF-8 JSON text | Wrapped per [`WrapPolicy`] |
//! | Bridge → Server | UTF-8 JSON text | Verbatim |
//!
//! The bridge never interprets message contents.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `endpoint` | Endpoint URL and wire contract versions |
//! | `envelope` | Text frame codec and inbound wrapping |

// ============================================================================
// Submodules
// ============================================================================

/// Endpoint URL and wire contract versions.
pub mod endpoint;

/// Text frame codec and inbound wrapping.
pub mod envelope;

// ============================================================================
// Re-exports
// ============================================================================

pub use endpoint::{DEFAULT_HOST, DEFAULT_PORT, Endpoint, Scheme, WireVersion};
pub use envelope::{InboundEnvelope, ReceiptClock, WrapPolicy, decode, encode};

/// Opaque JSON message exchanged with the server.
pub type Message = serde_json::Value;
