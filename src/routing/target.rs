//! Upstream target descriptor.
//!
//! # Design Decisions
//! - `protocol` is kept as the literal string it was configured with
//! - Only the exact literal `"https:"` selects TLS when forwarding
//! - Urls are parsed once, at configuration time

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::config::ConfigError;

/// Protocol literal that selects a TLS connection to the upstream.
pub const SECURE_PROTOCOL: &str = "https:";

/// A resolved upstream: where a request is forwarded.
///
/// # Legacy protocol literal
/// `protocol` is compared as a plain string, not parsed as a URI scheme.
/// `"https"` (without the trailing colon) is *not* the same as `"https:"`
/// and forwards in plaintext. Existing deployments rely on this, so it is
/// preserved rather than normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSpec {
    /// Protocol literal, e.g. `"http:"` or `"https:"`.
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Upstream host name or address.
    pub host: String,
    /// Upstream port.
    pub port: u16,
}

fn default_protocol() -> String {
    "http:".to_string()
}

impl TargetSpec {
    /// Create a target from its parts. The protocol is stored verbatim.
    pub fn new(protocol: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port,
        }
    }

    /// Parse a `scheme://host[:port]` url.
    ///
    /// The protocol becomes `"<scheme>:"`, matching how urls render their
    /// protocol. A missing port falls back to the scheme's well-known port.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidTarget {
            url: raw.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
        // IPv6 literals come back bracketed; store the bare address.
        let host = url
            .host_str()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host"))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;

        Ok(Self {
            protocol: format!("{}:", url.scheme()),
            host: host.to_string(),
            port,
        })
    }

    /// Check an object target supplied directly by configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidTarget {
            url: self.to_string(),
            reason: reason.to_string(),
        };
        if self.host.trim().is_empty() {
            return Err(invalid("missing host"));
        }
        if self.port == 0 {
            return Err(invalid("port must be non-zero"));
        }
        Ok(())
    }

    /// True only when the protocol literal is exactly `"https:"`.
    pub fn is_secure(&self) -> bool {
        self.protocol == SECURE_PROTOCOL
    }

    /// `host:port`, suitable for a `Host` header or a socket connect.
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}//{}", self.protocol, self.authority())
    }
}
