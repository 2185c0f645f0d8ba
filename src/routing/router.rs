//! Router configuration and normalization.
//!
//! # Responsibilities
//! - Accept the raw router option (url, object, callback, table)
//! - Classify it once into an immutable `RouterConfig`
//! - Reject malformed shapes at construction, never per request
//!
//! # Design Decisions
//! - The variant is decided once; resolution never re-inspects config shape
//! - Table targets are parsed up front so a bad url fails startup

use futures_util::future::BoxFuture;
use serde::de::{self, Deserializer, Unexpected};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::config::ConfigError;
use crate::routing::context::RequestContext;
use crate::routing::matcher::RouteTable;
use crate::routing::resolver::ResolutionError;
use crate::routing::target::TargetSpec;

/// Result a callback router settles with. `Ok(None)` means "use the default target".
pub type RouteResult = Result<Option<TargetSpec>, ResolutionError>;

/// What a callback router hands back: a value now, or one later.
pub enum RouterReturn {
    Ready(RouteResult),
    Pending(BoxFuture<'static, RouteResult>),
}

impl RouterReturn {
    /// An immediate target.
    pub fn target(target: TargetSpec) -> Self {
        Self::Ready(Ok(Some(target)))
    }

    /// An immediate "no target", falling back to the default.
    pub fn none() -> Self {
        Self::Ready(Ok(None))
    }

    /// An immediate failure.
    pub fn error(err: impl Into<ResolutionError>) -> Self {
        Self::Ready(Err(err.into()))
    }

    /// A computation that settles later.
    pub fn pending<F>(fut: F) -> Self
    where
        F: Future<Output = RouteResult> + Send + 'static,
    {
        Self::Pending(Box::pin(fut))
    }
}

impl fmt::Debug for RouterReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// A per-request routing function.
pub trait RouteCallback: Send + Sync {
    fn route(&self, ctx: &RequestContext) -> RouterReturn;
}

impl<F> RouteCallback for F
where
    F: Fn(&RequestContext) -> RouterReturn + Send + Sync,
{
    fn route(&self, ctx: &RequestContext) -> RouterReturn {
        self(ctx)
    }
}

/// Keys that mark a config table as an object target.
const TARGET_FIELDS: [&str; 3] = ["host", "port", "protocol"];

/// Router option as it appears in a config file.
///
/// A table naming any of `host`, `port` or `protocol` is an object target and
/// must deserialize as one; any other table is a pattern mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RouterSource {
    Url(String),
    Target(TargetSpec),
    Table(toml::Table),
}

impl<'de> Deserialize<'de> for RouterSource {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match toml::Value::deserialize(deserializer)? {
            toml::Value::String(url) => Ok(Self::Url(url)),
            toml::Value::Table(table) if table.keys().any(|k| TARGET_FIELDS.contains(&k.as_str())) => {
                TargetSpec::deserialize(toml::Value::Table(table))
                    .map(Self::Target)
                    .map_err(|e| de::Error::custom(format!("invalid router target: {}", e.message())))
            }
            toml::Value::Table(table) => Ok(Self::Table(table)),
            other => Err(de::Error::invalid_type(
                Unexpected::Other(other.type_str()),
                &"a target url, a target object or a route table",
            )),
        }
    }
}

/// Raw router option, before normalization.
#[derive(Clone)]
pub enum RouterOption {
    /// `scheme://host:port`
    Url(String),
    /// `{ host, port, protocol }`
    Target(TargetSpec),
    /// Per-request function.
    Callback(Arc<dyn RouteCallback>),
    /// Ordered `pattern -> target url` mapping.
    Table(toml::Table),
}

impl RouterOption {
    /// Wrap a callback that answers synchronously.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&RequestContext) -> RouteResult + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(move |ctx: &RequestContext| RouterReturn::Ready(f(ctx))))
    }

    /// Wrap an async callback. The context is cloned into the future.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RouteResult> + Send + 'static,
    {
        Self::Callback(Arc::new(move |ctx: &RequestContext| {
            RouterReturn::pending(f(ctx.clone()))
        }))
    }

    /// Build a table option from ordered `(pattern, target url)` pairs.
    pub fn table<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Table(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), toml::Value::String(v.into())))
                .collect(),
        )
    }
}

impl From<RouterSource> for RouterOption {
    fn from(source: RouterSource) -> Self {
        match source {
            RouterSource::Url(url) => Self::Url(url),
            RouterSource::Target(target) => Self::Target(target),
            RouterSource::Table(table) => Self::Table(table),
        }
    }
}

impl fmt::Debug for RouterOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Target(target) => f.debug_tuple("Target").field(target).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
            Self::Table(table) => f.debug_tuple("Table").field(table).finish(),
        }
    }
}

/// Normalized, immutable routing strategy.
#[derive(Clone)]
pub enum RouterConfig {
    StringTarget { url: String, target: TargetSpec },
    ObjectTarget(TargetSpec),
    CallbackRouter(Arc<dyn RouteCallback>),
    TableRouter(RouteTable),
}

impl RouterConfig {
    /// Classify a raw option. Any malformed shape fails here.
    pub fn normalize(option: RouterOption) -> Result<Self, ConfigError> {
        let config = match option {
            RouterOption::Url(url) => {
                let target = TargetSpec::parse(&url)?;
                Self::StringTarget { url, target }
            }
            RouterOption::Target(target) => {
                target.validate()?;
                Self::ObjectTarget(target)
            }
            RouterOption::Callback(callback) => Self::CallbackRouter(callback),
            RouterOption::Table(table) => {
                let entries = table
                    .iter()
                    .map(|(pattern, value)| match value {
                        toml::Value::String(url) => Ok((pattern.as_str(), url.as_str())),
                        other => Err(ConfigError::NonStringRoute {
                            pattern: pattern.clone(),
                            found: other.type_str(),
                        }),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Self::TableRouter(RouteTable::compile(entries)?)
            }
        };

        tracing::debug!(router = ?config, "Router configured");
        Ok(config)
    }

    /// Whether resolution can yield an `"https:"` target. Callbacks always may.
    pub fn may_target_secure(&self) -> bool {
        match self {
            Self::StringTarget { target, .. } | Self::ObjectTarget(target) => target.is_secure(),
            Self::CallbackRouter(_) => true,
            Self::TableRouter(table) => table.targets().any(TargetSpec::is_secure),
        }
    }

    /// Variant name, for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StringTarget { .. } => "string",
            Self::ObjectTarget(_) => "object",
            Self::CallbackRouter(_) => "callback",
            Self::TableRouter(_) => "table",
        }
    }
}

impl fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StringTarget { url, .. } => f.debug_tuple("StringTarget").field(url).finish(),
            Self::ObjectTarget(target) => f.debug_tuple("ObjectTarget").field(target).finish(),
            Self::CallbackRouter(_) => f.write_str("CallbackRouter(..)"),
            Self::TableRouter(table) => f
                .debug_struct("TableRouter")
                .field("entries", &table.len())
                .finish(),
        }
    }
}
