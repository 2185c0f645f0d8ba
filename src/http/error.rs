//! Resolution failure hand-off.
//!
//! # Responsibilities
//! - Turn a resolution outcome into a dispatch target or a short-circuit
//! - Pass failures, unchanged, to the host's error hook
//!
//! # Design Decisions
//! - A failed resolution never reaches the forwarder
//! - The hook owns status code and body; the default answers 502
//! - No match is not an error: it falls back to the default target

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::routing::{RequestContext, ResolutionError, ResolutionOutcome, TargetSpec};

/// Why a request could not be dispatched.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The router failed; carries its original error.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The router yielded nothing and no default target is configured.
    #[error("No target configured for this request")]
    NoTarget,
}

/// Host hook for requests that cannot be dispatched.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, err: ProxyError, ctx: &RequestContext) -> Response;
}

impl<F> ErrorHandler for F
where
    F: Fn(ProxyError, &RequestContext) -> Response + Send + Sync,
{
    fn handle(&self, err: ProxyError, ctx: &RequestContext) -> Response {
        self(err, ctx)
    }
}

/// Default hook: `502 Bad Gateway` with the error message as body.
#[derive(Debug, Clone, Copy, Default)]
pub struct BadGatewayHandler;

impl ErrorHandler for BadGatewayHandler {
    fn handle(&self, err: ProxyError, ctx: &RequestContext) -> Response {
        tracing::warn!(
            error = %err,
            host = ?ctx.host(),
            path = %ctx.path(),
            "Request not dispatched"
        );
        (StatusCode::BAD_GATEWAY, err.to_string()).into_response()
    }
}

/// Pick where to forward, or stop the request.
///
/// `Failed` short-circuits with the router's error; `NoMatch` uses `default`.
pub fn dispatch_target(
    outcome: ResolutionOutcome,
    default: Option<&TargetSpec>,
) -> Result<TargetSpec, ProxyError> {
    match outcome {
        ResolutionOutcome::Resolved(target) => Ok(target),
        ResolutionOutcome::NoMatch => default.cloned().ok_or(ProxyError::NoTarget),
        ResolutionOutcome::Failed(err) => Err(ProxyError::Resolution(err)),
    }
}
