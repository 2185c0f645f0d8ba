//! Per-request target resolution.
//!
//! # Responsibilities
//! - Execute the configured routing strategy for one request
//! - Treat every strategy as async so callbacks compose with fixed targets
//! - Report the outcome: a target, no target, or the router's own error
//!
//! # Design Decisions
//! - Only a pending callback suspends; other variants resolve immediately
//! - Errors (and panics) from a callback are carried verbatim, never retried
//! - Dropping the future discards the resolution with no side effects

use futures_util::FutureExt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

use crate::config::ConfigError;
use crate::routing::context::RequestContext;
use crate::routing::router::{RouteCallback, RouterConfig, RouterOption, RouterReturn};
use crate::routing::target::TargetSpec;

/// Boxed error value produced by a router callback.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A router callback failed at request time.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The callback returned an error, or its future resolved to one.
    #[error(transparent)]
    Router(BoxError),

    /// The callback panicked; carries the panic message.
    #[error("{0}")]
    Panicked(String),
}

impl ResolutionError {
    /// Wrap the router's error value without altering it.
    pub fn new(err: impl Into<BoxError>) -> Self {
        Self::Router(err.into())
    }

    /// Hand back the original error value.
    pub fn into_inner(self) -> BoxError {
        match self {
            Self::Router(err) => err,
            Self::Panicked(msg) => msg.into(),
        }
    }

    /// Downcast to the callback's concrete error type.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Router(err) => err.downcast_ref::<E>(),
            Self::Panicked(_) => None,
        }
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "router panicked".to_string());
        Self::Panicked(msg)
    }
}

impl From<&str> for ResolutionError {
    fn from(msg: &str) -> Self {
        Self::new(msg)
    }
}

impl From<String> for ResolutionError {
    fn from(msg: String) -> Self {
        Self::new(msg)
    }
}

/// Result of resolving one request.
#[derive(Debug)]
pub enum ResolutionOutcome {
    /// Forward to this target.
    Resolved(TargetSpec),
    /// Forward to the configured default target.
    NoMatch,
    /// Do not forward; hand the error to the host.
    Failed(ResolutionError),
}

impl ResolutionOutcome {
    /// Outcome name, for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Resolved(_) => "resolved",
            Self::NoMatch => "no_match",
            Self::Failed(_) => "failed",
        }
    }
}

impl From<Result<Option<TargetSpec>, ResolutionError>> for ResolutionOutcome {
    fn from(result: Result<Option<TargetSpec>, ResolutionError>) -> Self {
        match result {
            Ok(Some(target)) => Self::Resolved(target),
            Ok(None) => Self::NoMatch,
            Err(err) => Self::Failed(err),
        }
    }
}

/// Resolves requests against an immutable router configuration.
///
/// Cheap to clone; every clone shares the same configuration.
#[derive(Debug, Clone)]
pub struct Resolver {
    config: Arc<RouterConfig>,
}

impl Resolver {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Normalize a raw option and build a resolver from it.
    pub fn from_option(option: RouterOption) -> Result<Self, ConfigError> {
        RouterConfig::normalize(option).map(Self::new)
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Resolve the upstream for one request.
    pub async fn resolve(&self, ctx: &RequestContext) -> ResolutionOutcome {
        let outcome = match self.config.as_ref() {
            RouterConfig::StringTarget { target, .. } | RouterConfig::ObjectTarget(target) => {
                ResolutionOutcome::Resolved(target.clone())
            }
            RouterConfig::CallbackRouter(callback) => run_callback(callback.as_ref(), ctx).await,
            RouterConfig::TableRouter(table) => match table.find(ctx) {
                Some(entry) => {
                    tracing::trace!(pattern = %entry.source, "Route table matched");
                    ResolutionOutcome::Resolved(entry.target.clone())
                }
                None => ResolutionOutcome::NoMatch,
            },
        };

        match &outcome {
            ResolutionOutcome::Resolved(target) => {
                tracing::debug!(
                    host = ?ctx.host(),
                    path = %ctx.path(),
                    target = %target,
                    "Router new target"
                );
            }
            ResolutionOutcome::NoMatch => {
                tracing::trace!(host = ?ctx.host(), path = %ctx.path(), "Router found no target");
            }
            ResolutionOutcome::Failed(err) => {
                tracing::debug!(error = %err, "Router failed");
            }
        }

        outcome
    }
}

async fn run_callback(callback: &dyn RouteCallback, ctx: &RequestContext) -> ResolutionOutcome {
    let returned = match panic::catch_unwind(AssertUnwindSafe(|| callback.route(ctx))) {
        Ok(returned) => returned,
        Err(payload) => return ResolutionOutcome::Failed(ResolutionError::from_panic(payload)),
    };

    let result = match returned {
        RouterReturn::Ready(result) => result,
        RouterReturn::Pending(fut) => AssertUnwindSafe(fut)
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(ResolutionError::from_panic(payload))),
    };

    result.into()
}
