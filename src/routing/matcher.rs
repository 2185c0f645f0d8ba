//! Route table matching logic.
//!
//! # Responsibilities
//! - Parse `host[:port]` and `host[:port]/path` table patterns
//! - Match host header (host case-insensitive, port exact)
//! - Match path prefix (case-sensitive)
//! - Walk the table in insertion order, first match wins
//!
//! # Design Decisions
//! - Patterns compiled at startup, immutable at runtime
//! - No re-ordering by specificity: an earlier, broader entry shadows later ones
//! - No regex to guarantee O(n) matching

use crate::config::ConfigError;
use crate::routing::context::RequestContext;
use crate::routing::target::TargetSpec;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, ctx: &RequestContext) -> bool;
}

/// Split `host[:port]` into its parts. Bracketed IPv6 hosts keep their brackets.
///
/// Returns `None` when the authority is malformed.
fn split_authority(authority: &str) -> Option<(&str, Option<&str>)> {
    let (host, port) = if authority.starts_with('[') {
        let end = authority.find(']')?;
        let (host, rest) = authority.split_at(end + 1);
        match rest {
            "" => (host, None),
            _ => (host, Some(rest.strip_prefix(':')?)),
        }
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => (host, Some(port)),
            Some(_) => return None,
            None => (authority, None),
        }
    };

    if host.is_empty() {
        return None;
    }
    if let Some(port) = port {
        if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }
    Some((host, port))
}

/// Matches the Host header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMatcher {
    /// Lowercased host.
    host: String,
    port: Option<String>,
}

impl HostMatcher {
    /// Parse `host[:port]`. The host is normalized to lowercase.
    pub fn parse(authority: &str) -> Option<Self> {
        let (host, port) = split_authority(authority)?;
        Some(Self {
            host: host.to_ascii_lowercase(),
            port: port.map(str::to_string),
        })
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, ctx: &RequestContext) -> bool {
        ctx.host()
            .and_then(split_authority)
            .map(|(host, port)| host.eq_ignore_ascii_case(&self.host) && port == self.port.as_deref())
            .unwrap_or(false)
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, ctx: &RequestContext) -> bool {
        ctx.path().starts_with(&self.prefix)
    }
}

/// A compiled table key: host, plus an optional path prefix (AND semantics).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    host: HostMatcher,
    path: Option<PathPrefixMatcher>,
}

impl RoutePattern {
    /// Compile `host[:port]` or `host[:port]/path`.
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidPattern(pattern.to_string());

        let (authority, path) = match pattern.find('/') {
            Some(idx) => (&pattern[..idx], Some(&pattern[idx..])),
            None => (pattern, None),
        };

        Ok(Self {
            host: HostMatcher::parse(authority.trim()).ok_or_else(invalid)?,
            path: path.map(PathPrefixMatcher::new),
        })
    }
}

impl Matcher for RoutePattern {
    fn matches(&self, ctx: &RequestContext) -> bool {
        self.host.matches(ctx) && self.path.as_ref().map_or(true, |p| p.matches(ctx))
    }
}

/// One compiled table entry.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    /// Pattern as written in configuration, for logging.
    pub source: String,
    pub pattern: RoutePattern,
    pub target: TargetSpec,
}

/// Ordered, immutable routing table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Compile `(pattern, target url)` pairs, keeping their order.
    pub fn compile<I, K, V>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .map(|(pattern, target)| {
                let source = pattern.as_ref().to_string();
                Ok(RouteEntry {
                    pattern: RoutePattern::parse(&source)?,
                    target: TargetSpec::parse(target.as_ref())?,
                    source,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self { entries })
    }

    /// Find the first entry matching the request.
    pub fn find(&self, ctx: &RequestContext) -> Option<&RouteEntry> {
        self.entries.iter().find(|entry| entry.pattern.matches(ctx))
    }

    /// Targets in table order.
    pub fn targets(&self) -> impl Iterator<Item = &TargetSpec> {
        self.entries.iter().map(|entry| &entry.target)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    fn ctx(host: Option<&str>, path: &str) -> RequestContext {
        RequestContext::new(Method::GET, host, path, "http:")
    }

    fn table() -> RouteTable {
        RouteTable::compile([
            ("alpha.localhost:6000", "https://localhost:6001"),
            ("beta.localhost:6000", "https://localhost:6002"),
            ("localhost:6000/api", "https://localhost:6003"),
        ])
        .unwrap()
    }

    #[test]
    fn test_host_matcher() {
        let matcher = HostMatcher::parse("example.com:8080").unwrap();

        assert!(matcher.matches(&ctx(Some("example.com:8080"), "/")));
        assert!(matcher.matches(&ctx(Some("EXAMPLE.COM:8080"), "/"))); // Case insensitive
        assert!(!matcher.matches(&ctx(Some("example.com:8081"), "/")));
        assert!(!matcher.matches(&ctx(Some("example.com"), "/")));
        assert!(!matcher.matches(&ctx(None, "/")));
    }

    #[test]
    fn test_host_without_port() {
        let matcher = HostMatcher::parse("example.com").unwrap();
        assert!(matcher.matches(&ctx(Some("example.com"), "/")));
        assert!(!matcher.matches(&ctx(Some("example.com:80"), "/")));
    }

    #[test]
    fn test_ipv6_host() {
        let matcher = HostMatcher::parse("[::1]:6000").unwrap();
        assert!(matcher.matches(&ctx(Some("[::1]:6000"), "/")));
        assert!(!matcher.matches(&ctx(Some("[::1]"), "/")));
    }

    #[test]
    fn test_path_matcher() {
        let matcher = PathPrefixMatcher::new("/api");
        assert!(matcher.matches(&ctx(None, "/api/v1")));
        assert!(!matcher.matches(&ctx(None, "/images")));
        assert!(!matcher.matches(&ctx(None, "/API")));
    }

    #[test]
    fn test_host_and_path_pattern() {
        let pattern = RoutePattern::parse("localhost:6000/api").unwrap();
        assert!(pattern.matches(&ctx(Some("localhost:6000"), "/api")));
        assert!(pattern.matches(&ctx(Some("localhost:6000"), "/api/users")));
        assert!(!pattern.matches(&ctx(Some("localhost:6000"), "/")));
        assert!(!pattern.matches(&ctx(Some("other:6000"), "/api")));
    }

    #[test]
    fn test_invalid_patterns() {
        for bad in ["", "/api", ":6000", "host:", "host:abc", "a:b:c", "[::1"] {
            assert!(
                matches!(RoutePattern::parse(bad), Err(ConfigError::InvalidPattern(_))),
                "pattern {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_table_lookup() {
        let table = table();
        assert_eq!(table.len(), 3);

        let hit = |host, path| table.find(&ctx(Some(host), path)).map(|e| e.target.port);
        assert_eq!(hit("alpha.localhost:6000", "/"), Some(6001));
        assert_eq!(hit("beta.localhost:6000", "/anything"), Some(6002));
        assert_eq!(hit("localhost:6000", "/api"), Some(6003));
        assert_eq!(hit("localhost:6000", "/"), None);
        assert_eq!(hit("127.0.0.1:6000", "/api"), None);
    }

    #[test]
    fn test_first_match_wins() {
        // The broad host entry comes first, so the more specific path entry is shadowed.
        let table = RouteTable::compile([
            ("localhost:6000", "http://localhost:7001"),
            ("localhost:6000/api", "http://localhost:7002"),
        ])
        .unwrap();

        let entry = table.find(&ctx(Some("localhost:6000"), "/api")).unwrap();
        assert_eq!(entry.source, "localhost:6000");
        assert_eq!(entry.target.port, 7001);
    }

    #[test]
    fn test_invalid_target_rejected() {
        let err = RouteTable::compile([("alpha.localhost", "not a url")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTarget { .. }));
    }
}
