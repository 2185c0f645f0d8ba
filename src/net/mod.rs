//! Network layer.
//!
//! # Responsibilities
//! - TLS material for the listener (inbound termination)
//! - TLS client config for `https:` upstream targets
//!
//! Plain TCP accept is handled by `axum::serve` / `axum-server`.

pub mod tls;
