//! Anonymous per-profile identity.
//!
//! The bridge addresses the server with a UUID that is generated once per
//! storage profile and then reused for every connection attempt, across
//! reconnects and restarts.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Identity`] | The persisted identifier |
//! | [`IdentityStore`] | Lazily creates and reads the identity slot |
//! | [`KeyValueStore`] | Durable key-value storage backend |
//! | [`MemoryStore`] | In-process backend |
//! | [`FileStore`] | JSON file backend |

// ============================================================================
// Submodules
// ============================================================================

/// Durable key-value storage backends.
pub mod storage;

// ============================================================================
// Re-exports
// ============================================================================

pub use storage::{FileStore, KeyValueStore, MemoryStore};

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;

// ============================================================================
// Constants
// ============================================================================

/// Storage slot holding the identity.
pub const IDENTITY_KEY: &str = "uuid";

/// Canonical lowercase UUID-v4 layout.
static CANONICAL_V4: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
        .expect("static regex is valid")
});

// ============================================================================
// Identity
// ============================================================================

/// Anonymous identifier sent as the `uuid` query parameter.
///
/// Values read back from storage are not validated; whatever string is
/// stored is used as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Generates a fresh random v4 identity.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    /// Wraps an existing value without validation.
    #[inline]
    #[must_use]
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identity as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the value has the canonical UUID-v4 layout.
    #[must_use]
    pub fn is_canonical_v4(&self) -> bool {
        CANONICAL_V4.is_match(&self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// IdentityStore
// ============================================================================

/// Reads the identity slot, creating it on first access.
#[derive(Debug, Clone)]
pub struct IdentityStore<S> {
    storage: S,
}

impl<S: KeyValueStore> IdentityStore<S> {
    /// Creates an identity store over the given storage backend.
    #[inline]
    #[must_use]
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Returns the persisted identity, generating and storing one if the slot
    /// is absent or empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`](crate::Error::Storage) or
    /// [`Error::Io`](crate::Error::Io) if the backend cannot be read or written.
    pub fn get_identity(&self) -> Result<Identity> {
        if let Some(stored) = self.storage.get(IDENTITY_KEY)?
            && !stored.is_empty()
        {
            let identity = Identity::from_stored(stored);
            if !identity.is_canonical_v4() {
                warn!(identity = %identity, "Stored identity is not a canonical UUID-v4");
            }
            return Ok(identity);
        }

        let identity = Identity::generate();
        self.storage.set(IDENTITY_KEY, identity.as_str())?;

        debug!(identity = %identity, "Generated new identity");
        Ok(identity)
    }

    /// Returns the underlying storage backend.
    #[inline]
    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }
}

// ============================================================================
// Tests
// ============================================================================
