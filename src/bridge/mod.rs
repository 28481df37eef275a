//! Session bridge.
//!
//! Owns exactly one server connection and relays messages between it and
//! the application core's two channels.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SessionBridge`] | Composition root: identity, endpoint, connector |
//! | [`SessionBridgeBuilder`] | Fluent configuration builder |
//! | [`SessionHandle`] | Running session: state, shutdown, diagnostics |
//! | [`BridgeOptions`] | Endpoint, retry and diagnostics settings |
//! | [`CorePorts`] / [`BridgePorts`] | The two one-way channels |
//! | [`BridgeEvent`] | Optional diagnostics stream |
//!
//! # Example
//!
//! ```no_run
//! use session_bridge::{SessionBridge, ports};
//!
//! # async fn example() -> session_bridge::Result<()> {
//! let (mut core, bridge_ports) = ports::pair();
//! let handle = SessionBridge::builder()
//!     .host("127.0.0.1")
//!     .port(8080)
//!     .build()?
//!     .start(bridge_ports)?;
//!
//! core.send(serde_json::json!("Increment"))?;
//! while let Some(message) = core.recv().await {
//!     println!("{message}");
//! }
//! # drop(handle);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for bridge configuration.
pub mod builder;

/// Session bridge and running handle.
pub mod core;

/// Optional diagnostics stream.
pub mod events;

/// Bridge options and retry policy.
pub mod options;

/// Channel contract with the application core.
pub mod ports;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SessionBridgeBuilder;
pub use core::{SessionBridge, SessionHandle, SessionState};
pub use events::BridgeEvent;
pub use options::{BridgeOptions, RetryPolicy};
pub use ports::{BridgePorts, CorePorts, InboundPort, OutboundPort};
