//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Router option (url | object | callback | table)
//!     → router.rs (normalize once into RouterConfig)
//!
//! Incoming Request (method, host, path, inbound protocol)
//!     → context.rs (read-only RequestContext)
//!     → resolver.rs (run the configured strategy, async)
//!     → matcher.rs (table strategy: evaluate patterns in order)
//!     → Return: Resolved(TargetSpec) | NoMatch | Failed(error)
//! ```
//!
//! # Design Decisions
//! - Router compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (table insertion order)

pub mod context;
pub mod matcher;
pub mod resolver;
pub mod router;
pub mod target;

pub use context::RequestContext;
pub use matcher::RouteTable;
pub use resolver::{ResolutionError, ResolutionOutcome, Resolver};
pub use router::{RouteCallback, RouteResult, RouterConfig, RouterOption, RouterReturn, RouterSource};
pub use target::TargetSpec;
