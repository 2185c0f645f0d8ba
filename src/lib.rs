//! Reverse proxy with dynamic target resolution.
//!
//! Each request's upstream comes from a fixed url or object, a sync or async
//! callback, or an ordered host/path table; anything unresolved falls back to
//! the configured default target.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use http::{HttpServer, HttpServerBuilder};
pub use lifecycle::Shutdown;
pub use routing::{RequestContext, ResolutionOutcome, Resolver, RouterOption, RouterReturn, TargetSpec};
