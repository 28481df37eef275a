//! Bridge options.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use session_bridge::{BridgeOptions, RetryPolicy, WireVersion};
//!
//! let options = BridgeOptions::new()
//!     .with_host("0.0.0.0")
//!     .with_port(8080)
//!     .with_retry(RetryPolicy::fixed(3, Duration::from_secs(2)))
//!     .with_error_channel();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::protocol::{Endpoint, Scheme, WireVersion};

// ============================================================================
// RetryPolicy
// ============================================================================

/// What to do after a connection instance closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Stay closed.
    #[default]
    Never,
    /// Open a new connection instance after `delay`, at most `max_retries`
    /// times in a row. The count resets whenever an instance reaches `Open`.
    Fixed {
        /// Consecutive retries allowed.
        max_retries: u32,
        /// Pause before each retry.
        delay: Duration,
    },
}

impl RetryPolicy {
    /// Creates a fixed-delay policy.
    #[inline]
    #[must_use]
    pub const fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self::Fixed { max_retries, delay }
    }

    /// Returns the pause before the next retry, or `None` if
    /// `retries_used` consecutive retries already exhaust the policy.
    #[must_use]
    pub fn next_delay(&self, retries_used: u32) -> Option<Duration> {
        match *self {
            Self::Never => None,
            Self::Fixed { max_retries, delay } => (retries_used < max_retries).then_some(delay),
        }
    }
}

// ============================================================================
// BridgeOptions
// ============================================================================

/// Bridge configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Server endpoint and wire contract.
    pub endpoint: Endpoint,

    /// Reconnection policy.
    pub retry: RetryPolicy,

    /// Expose a [`BridgeEvent`](super::BridgeEvent) stream.
    pub error_channel: bool,
}

impl BridgeOptions {
    /// Creates options with defaults: `ws://127.0.0.1:8080/ws`, no retry,
    /// no error channel.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server host.
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.endpoint.host = host.into();
        self
    }

    /// Sets the server port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.endpoint.port = port;
        self
    }

    /// Sets the URL scheme.
    #[inline]
    #[must_use]
    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.endpoint.scheme = scheme;
        self
    }

    /// Sets the wire contract version.
    #[inline]
    #[must_use]
    pub fn with_wire_version(mut self, wire: WireVersion) -> Self {
        self.endpoint.wire = wire;
        self
    }

    /// Sets the reconnection policy.
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Enables the diagnostics stream.
    #[inline]
    #[must_use]
    pub fn with_error_channel(mut self) -> Self {
        self.error_channel = true;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
