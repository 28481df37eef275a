//! Session Bridge - client-side session glue for a server-driven application.
//!
//! This library connects an application core to a server over a single
//! WebSocket, under an anonymous identity that survives restarts.
//!
//! # Architecture
//!
//! The bridge sits between two one-way channels and one socket:
//!
//! - **Core → Bridge**: outbound messages, sent to the server verbatim
//! - **Bridge → Core**: inbound messages, wrapped as `{ data, timeStamp }`
//! - **Bridge ↔ Server**: `ws://host:port/ws?uuid=<identity>`
//!
//! Key design principles:
//!
//! - Each [`SessionBridge`] owns at most one live connection
//! - The bridge never interprets message contents
//! - Order is preserved in each direction
//! - The identity is created lazily and reused forever
//!
//! # Quick Start
//!
//! ```no_run
//! use session_bridge::{Result, SessionBridge, ports};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let (mut core, bridge_ports) = ports::pair();
//!
//!     let handle = SessionBridge::builder()
//!         .host("127.0.0.1")
//!         .port(8080)
//!         .build()?
//!         .start(bridge_ports)?;
//!     println!("Connecting as {}", handle.identity());
//!
//!     core.send(serde_json::json!({ "SetName": "Alex" }))?;
//!     while let Some(message) = core.recv().await {
//!         println!("{message}");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | [`SessionBridge`], configuration, core channels |
//! | [`component`] | The `name-input` element |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identity`] | Anonymous identity and its storage |
//! | [`protocol`] | Endpoint URL and frame codec |
//! | [`transport`] | WebSocket connection lifecycle |

// ============================================================================
// Modules
// ============================================================================

/// Session bridge, configuration and core channels.
///
/// Use [`SessionBridge::builder()`] to create a configured bridge.
pub mod bridge;

/// Page-side UI components.
pub mod component;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Anonymous per-profile identity.
pub mod identity;

/// Wire contract with the server.
pub mod protocol;

/// WebSocket transport layer.
///
/// Handles the client handshake and the per-connection relay loop.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::ports;
pub use bridge::{
    BridgeEvent, BridgeOptions, BridgePorts, CorePorts, InboundPort, OutboundPort, RetryPolicy,
    SessionBridge, SessionBridgeBuilder, SessionHandle, SessionState,
};

// Component types
pub use component::{CustomEvent, EventTarget, NameInput, NameInputDetail};

// Error types
pub use error::{Error, Result};

// Identity types
pub use identity::{FileStore, Identity, IdentityStore, KeyValueStore, MemoryStore};

// Protocol types
pub use protocol::{Endpoint, Message, Scheme, WireVersion, WrapPolicy};

// Transport types
pub use transport::{CloseReason, ConnectionState, Connector, TcpConnector};
