//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware, proxy handler)
//!     → request.rs (request ID)
//!     → routing::Resolver (decide target)
//!     → error.rs (failed resolution → host error hook, no forwarding)
//!     → forward.rs (connect, TLS for "https:", send, stream response back)
//! ```

pub mod error;
pub mod forward;
pub mod request;
pub mod server;

pub use error::{BadGatewayHandler, ErrorHandler, ProxyError};
pub use forward::{ForwardError, Forwarder};
pub use request::X_REQUEST_ID;
pub use server::{HttpServer, HttpServerBuilder};
