//! Endpoint addressing and wire contract versions.
//!
//! # URL Format
//!
//! | Version | URL | Inbound payloads |
//! |---------|-----|------------------|
//! | [`WireVersion::Current`] | `ws://host:port/ws?uuid=<identity>` | Wrapped |
//! | [`WireVersion::Legacy`] | `ws://host:port/ws/` | Unwrapped |
//!
//! `Legacy` is deprecated and only kept for servers that predate the
//! identity query parameter.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use url::Url;

use crate::error::{Error, Result};
use crate::identity::Identity;

use super::envelope::WrapPolicy;

// ============================================================================
// Constants
// ============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Query parameter carrying the identity.
const IDENTITY_PARAM: &str = "uuid";

/// Characters that would move part of the host into the path, query,
/// fragment or userinfo of the URL.
const HOST_DELIMITERS: &[char] = &['/', '?', '#', '@'];

// ============================================================================
// WireVersion
// ============================================================================

/// Version of the wire contract spoken with the server.
///
/// A version fixes the request path, whether the identity is sent, and the
/// inbound wrapping policy together. They are never mixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum WireVersion {
    /// `/ws?uuid=<identity>` with `{data, timeStamp}` inbound envelopes.
    #[default]
    Current,
    /// Deprecated: `/ws/`, anonymous, unwrapped inbound payloads.
    Legacy,
}

impl WireVersion {
    /// Returns the request path.
    #[inline]
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Current => "/ws",
            Self::Legacy => "/ws/",
        }
    }

    /// Returns `true` if the identity is sent as a query parameter.
    #[inline]
    #[must_use]
    pub const fn carries_identity(self) -> bool {
        matches!(self, Self::Current)
    }

    /// Returns the inbound wrapping policy.
    #[inline]
    #[must_use]
    pub const fn wrap_policy(self) -> WrapPolicy {
        match self {
            Self::Current => WrapPolicy::Timestamped,
            Self::Legacy => WrapPolicy::Unwrapped,
        }
    }
}

// ============================================================================
// Scheme
// ============================================================================

/// WebSocket URL scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plain `ws://`.
    #[default]
    Ws,
    /// TLS `wss://`.
    Wss,
}

impl Scheme {
    /// Returns the scheme string.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ws => "ws",
            Self::Wss => "wss",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Endpoint
// ============================================================================

/// Server address plus wire contract version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// URL scheme.
    pub scheme: Scheme,
    /// Server host name or IP address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Wire contract version.
    pub wire: WireVersion,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            scheme: Scheme::default(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            wire: WireVersion::default(),
        }
    }
}

impl Endpoint {
    /// Creates an endpoint for the current wire contract.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Checks that the host is a bare host name or IP address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the host is empty or contains a URL
    /// delimiter (`/`, `?`, `#`, `@`).
    pub fn validate_host(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("Endpoint host is empty"));
        }

        if let Some(c) = self.host.chars().find(|c| HOST_DELIMITERS.contains(c)) {
            return Err(Error::config(format!(
                "Endpoint host {:?} contains '{c}'. Pass a bare host name or IP address.",
                self.host
            )));
        }

        Ok(())
    }

    /// Builds the connection URL for `identity`.
    ///
    /// The identity is percent-encoded, so a corrupted stored value still
    /// yields a valid URL.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the host fails [`Endpoint::validate_host`]
    /// - [`Error::Url`] if host and port do not form a valid URL
    pub fn url(&self, identity: &Identity) -> Result<Url> {
        self.validate_host()?;

        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };

        let mut url = Url::parse(&format!(
            "{}://{}:{}{}",
            self.scheme,
            host,
            self.port,
            self.wire.path()
        ))?;

        if self.wire.carries_identity() {
            url.query_pairs_mut()
                .append_pair(IDENTITY_PARAM, identity.as_str());
        }

        Ok(url)
    }
}

// ============================================================================
// Tests
// ============================================================================
