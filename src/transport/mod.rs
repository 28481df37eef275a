//! WebSocket transport layer.
//!
//! This module owns the single connection between the bridge and the server.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  SessionBridge  │         WebSocket            │  Server         │
//! │                 │◄────────────────────────────►│                 │
//! │  Connector      │   ws://host:port/ws?uuid=…   │  /ws endpoint   │
//! │  → Connection   │                              │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connector::connect` - Handshake with the endpoint (`Connecting`)
//! 2. `Connection::run` - Relay messages (`Open`)
//! 3. Close frame, stream end, error, or shutdown (`Closed`)
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | State machine and relay loop |
//! | `connector` | Client handshake |

// ============================================================================
// Submodules
// ============================================================================

/// Connection state machine and relay loop.
pub mod connection;

/// Client handshake.
pub mod connector;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{CloseReason, Connection, ConnectionState};
pub use connector::{Connector, TcpConnector};
