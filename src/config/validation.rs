//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that some destination exists (default target or router)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Router shape is checked by the router normalizer, not here

use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::routing::TargetSpec;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("either `target` or `router` must be configured")]
    MissingTarget,

    #[error("target `{url}` is invalid: {reason}")]
    DefaultTarget { url: String, reason: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{field} file not found: {path}")]
    MissingFile { field: &'static str, path: String },

    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),
}

/// Validate a parsed configuration, collecting every problem.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    match &config.target {
        Some(url) => {
            if let Err(e) = TargetSpec::parse(url) {
                errors.push(ValidationError::DefaultTarget {
                    url: url.clone(),
                    reason: e.to_string(),
                });
            }
        }
        None if config.router.is_none() => errors.push(ValidationError::MissingTarget),
        None => {}
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }
    if config.upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::Zero("upstream.connect_timeout_secs"));
    }
    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::Zero("limits.max_body_size"));
    }

    if let Some(tls) = &config.listener.tls {
        for (field, path) in [("listener.tls.cert_path", &tls.cert_path), ("listener.tls.key_path", &tls.key_path)] {
            if !Path::new(path).exists() {
                errors.push(ValidationError::MissingFile { field, path: path.clone() });
            }
        }
    }
    for path in &config.upstream.ca_files {
        if !Path::new(path).exists() {
            errors.push(ValidationError::MissingFile {
                field: "upstream.ca_files",
                path: path.clone(),
            });
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(config.observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RouterSource;

    fn valid() -> ProxyConfig {
        ProxyConfig {
            target: Some("http://localhost:6001".into()),
            ..ProxyConfig::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert_eq!(validate_config(&valid()), Ok(()));
    }

    #[test]
    fn test_router_without_default_target() {
        let config = ProxyConfig {
            router: Some(RouterSource::Url("https://localhost:6003".into())),
            ..ProxyConfig::default()
        };
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.timeouts.request_secs = 0;
        config.upstream.ca_files.push("/definitely/not/here.pem".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::BindAddress("nowhere".into()),
                ValidationError::MissingTarget,
                ValidationError::Zero("timeouts.request_secs"),
                ValidationError::MissingFile {
                    field: "upstream.ca_files",
                    path: "/definitely/not/here.pem".into(),
                },
            ]
        );
    }

    #[test]
    fn test_bad_default_target() {
        let config = ProxyConfig {
            target: Some("localhost:6001".into()),
            ..ProxyConfig::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors.as_slice(), [ValidationError::DefaultTarget { .. }]));
    }
}
