//! Builder pattern for bridge configuration.
//!
//! Provides a fluent API for configuring and creating [`SessionBridge`] instances.
//!
//! # Example
//!
//! ```no_run
//! use session_bridge::SessionBridge;
//!
//! # fn example() -> session_bridge::Result<()> {
//! let bridge = SessionBridge::builder()
//!     .host("127.0.0.1")
//!     .port(8080)
//!     .storage_path("./profile/storage.json")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::identity::{FileStore, KeyValueStore};
use crate::protocol::{Scheme, WireVersion};
use crate::transport::TcpConnector;

use super::core::SessionBridge;
use super::options::{BridgeOptions, RetryPolicy};

// ============================================================================
// StorageSource
// ============================================================================

/// Where the identity is persisted.
#[derive(Clone)]
enum StorageSource {
    /// Caller-provided backend.
    Shared(Arc<dyn KeyValueStore>),
    /// JSON file at a path.
    File(PathBuf),
}

impl fmt::Debug for StorageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared(_) => f.write_str("Shared(..)"),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

// ============================================================================
// SessionBridgeBuilder
// ============================================================================

/// Builder for configuring a [`SessionBridge`] instance.
///
/// Use [`SessionBridge::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct SessionBridgeBuilder {
    /// Endpoint, retry and diagnostics settings.
    options: BridgeOptions,
    /// Identity storage; defaults to the platform data directory.
    storage: Option<StorageSource>,
}

// ============================================================================
// SessionBridgeBuilder Implementation
// ============================================================================

impl SessionBridgeBuilder {
    /// Creates a new builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: BridgeOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the server host (e.g. "127.0.0.1" or "0.0.0.0").
    #[inline]
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.options = self.options.with_host(host);
        self
    }

    /// Sets the server port.
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.options = self.options.with_port(port);
        self
    }

    /// Sets the URL scheme.
    #[inline]
    #[must_use]
    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.options = self.options.with_scheme(scheme);
        self
    }

    /// Sets the wire contract version.
    #[inline]
    #[must_use]
    pub fn wire_version(mut self, wire: WireVersion) -> Self {
        self.options = self.options.with_wire_version(wire);
        self
    }

    /// Sets the reconnection policy.
    #[inline]
    #[must_use]
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.options = self.options.with_retry(retry);
        self
    }

    /// Enables or disables the diagnostics stream.
    #[inline]
    #[must_use]
    pub fn error_channel(mut self, enabled: bool) -> Self {
        self.options.error_channel = enabled;
        self
    }

    /// Persists the identity in the given backend.
    #[inline]
    #[must_use]
    pub fn storage(mut self, storage: impl KeyValueStore + 'static) -> Self {
        self.storage = Some(StorageSource::Shared(Arc::new(storage)));
        self
    }

    /// Persists the identity in a JSON file at `path`.
    #[inline]
    #[must_use]
    pub fn storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage = Some(StorageSource::File(path.into()));
        self
    }

    /// Builds the bridge with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the host is empty, contains `/ ? # @`, or the port is 0
    /// - [`Error::Config`] if a fixed retry policy allows zero retries
    /// - [`Error::Config`] if `wss` is requested without the `tls` feature
    /// - [`Error::Config`] if no storage is set and the platform has no data directory
    pub fn build(self) -> Result<SessionBridge<TcpConnector>> {
        self.validate_endpoint()?;
        self.validate_retry()?;
        let storage = self.resolve_storage()?;

        Ok(SessionBridge::new(self.options, storage, TcpConnector))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SessionBridgeBuilder {
    /// Validates the endpoint configuration.
    fn validate_endpoint(&self) -> Result<()> {
        let endpoint = &self.options.endpoint;

        if endpoint.host.trim().is_empty() {
            return Err(Error::config(
                "Server host is required. Use .host() to set it.\n\
                 Example: SessionBridge::builder().host(\"127.0.0.1\")",
            ));
        }

        endpoint.validate_host()?;

        if endpoint.port == 0 {
            return Err(Error::config(
                "Server port must be non-zero. Use .port() to set it.\n\
                 Example: SessionBridge::builder().port(8080)",
            ));
        }

        #[cfg(not(feature = "tls"))]
        if endpoint.scheme == Scheme::Wss {
            return Err(Error::config(
                "wss:// endpoints need the `tls` feature of session-bridge.",
            ));
        }

        Ok(())
    }

    /// Validates the retry policy.
    fn validate_retry(&self) -> Result<()> {
        if let RetryPolicy::Fixed { max_retries: 0, .. } = self.options.retry {
            return Err(Error::config(
                "Fixed retry policy allows no retries. Use RetryPolicy::Never instead.",
            ));
        }
        Ok(())
    }

    /// Resolves the identity storage backend.
    fn resolve_storage(&self) -> Result<Arc<dyn KeyValueStore>> {
        Ok(match &self.storage {
            Some(StorageSource::Shared(storage)) => Arc::clone(storage),
            Some(StorageSource::File(path)) => Arc::new(FileStore::new(path)),
            None => Arc::new(FileStore::default_location()?),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::identity::MemoryStore;

    #[test]
    fn test_new_creates_default_builder() {
        let builder = SessionBridgeBuilder::new();
        assert_eq!(builder.options, BridgeOptions::default());
        assert!(builder.storage.is_none());
    }

    #[test]
    fn test_setters_update_options() {
        let builder = SessionBridgeBuilder::new()
            .host("0.0.0.0")
            .port(9001)
            .wire_version(WireVersion::Legacy)
            .retry_policy(RetryPolicy::fixed(1, Duration::from_millis(1)))
            .error_channel(true);

        assert_eq!(builder.options.endpoint.host, "0.0.0.0");
        assert_eq!(builder.options.endpoint.port, 9001);
        assert_eq!(builder.options.endpoint.wire, WireVersion::Legacy);
        assert!(builder.options.error_channel);
    }

    #[test]
    fn test_build_with_memory_storage() {
        let bridge = SessionBridgeBuilder::new()
            .storage(MemoryStore::new())
            .build()
            .expect("build should succeed");
        assert_eq!(bridge.options().endpoint.port, 8080);
    }

    #[test]
    fn test_build_fails_with_empty_host() {
        let err = SessionBridgeBuilder::new()
            .host("")
            .storage(MemoryStore::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn test_build_fails_with_path_in_host() {
        let err = SessionBridgeBuilder::new()
            .host("example.com/x")
            .storage(MemoryStore::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("example.com/x"));
    }

    #[test]
    fn test_build_fails_with_zero_port() {
        let err = SessionBridgeBuilder::new()
            .port(0)
            .storage(MemoryStore::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_build_fails_with_empty_retry_budget() {
        let err = SessionBridgeBuilder::new()
            .retry_policy(RetryPolicy::fixed(0, Duration::from_secs(1)))
            .storage(MemoryStore::new())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[cfg(not(feature = "tls"))]
    #[test]
    fn test_build_fails_with_wss_without_tls() {
        let err = SessionBridgeBuilder::new()
            .scheme(Scheme::Wss)
            .storage(MemoryStore::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("tls"));
    }

    #[test]
    fn test_storage_path_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let bridge = SessionBridgeBuilder::new()
            .storage_path(&path)
            .build()
            .expect("build should succeed");
        let identity = bridge.identity().expect("identity");

        let stored = std::fs::read_to_string(&path).unwrap();
        assert!(stored.contains(identity.as_str()));
    }

    #[test]
    fn test_builder_is_clone() {
        let builder = SessionBridgeBuilder::new().host("example.com");
        let cloned = builder.clone();
        assert_eq!(builder.options, cloned.options);
    }
}
