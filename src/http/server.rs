//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (tracing, request ID, timeout, body limit)
//! - Bind server to listener (plaintext or TLS)
//! - Resolve each request's target, then forward or hand off the error

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use rustls::ClientConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ConfigError, ProxyConfig, ValidationError};
use crate::http::error::{dispatch_target, BadGatewayHandler, ErrorHandler};
use crate::http::forward::Forwarder;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::lifecycle::shutdown;
use crate::net::tls::{load_root_store, upstream_client_config};
use crate::observability::metrics;
use crate::routing::{RequestContext, ResolutionOutcome, Resolver, RouterOption, TargetSpec};

/// Grace period for in-flight TLS connections on shutdown.
const TLS_DRAIN_SECS: u64 = 10;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// `None` when only a default target is configured.
    pub resolver: Option<Resolver>,
    pub default_target: Option<TargetSpec>,
    pub forwarder: Forwarder,
    pub error_handler: Arc<dyn ErrorHandler>,
    /// Protocol literal of inbound connections.
    pub inbound_protocol: &'static str,
}

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

/// Assembles an [`HttpServer`] from config plus programmatic pieces.
pub struct HttpServerBuilder {
    config: ProxyConfig,
    router: Option<RouterOption>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    upstream_tls: Option<Arc<ClientConfig>>,
}

impl HttpServerBuilder {
    /// Override the config file's router, e.g. with a callback.
    pub fn router(mut self, router: RouterOption) -> Self {
        self.router = Some(router);
        self
    }

    /// Replace the default `502` error hook.
    pub fn error_handler(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Use this TLS client config for `https:` targets instead of `upstream.ca_files`.
    pub fn upstream_tls(mut self, tls: Arc<ClientConfig>) -> Self {
        self.upstream_tls = Some(tls);
        self
    }

    /// Normalize the router and build the server. Config errors surface here.
    pub fn build(self) -> Result<HttpServer, ConfigError> {
        let config = self.config;
        let router = self.router.or_else(|| config.router.clone().map(RouterOption::from));
        if router.is_none() && config.target.is_none() {
            return Err(ConfigError::Validation(vec![ValidationError::MissingTarget]));
        }

        let resolver = router.map(Resolver::from_option).transpose()?;
        let default_target = config.target.as_deref().map(TargetSpec::parse).transpose()?;
        let tls = match self.upstream_tls {
            Some(tls) => tls,
            None => {
                let roots = load_root_store(config.upstream.ca_files.as_slice())?;
                if roots.is_empty() && may_target_secure(resolver.as_ref(), default_target.as_ref()) {
                    tracing::warn!(
                        "`https:` targets are configured but `upstream.ca_files` is empty; \
                         TLS upstream connections will fail certificate verification"
                    );
                }
                upstream_client_config(roots)?
            }
        };

        tracing::info!(
            router = resolver.as_ref().map(|r| r.config().kind()),
            default_target = ?default_target.as_ref().map(ToString::to_string),
            "Proxy routing configured"
        );

        let state = AppState {
            resolver,
            default_target,
            forwarder: Forwarder::new(tls, Duration::from_secs(config.upstream.connect_timeout_secs)),
            error_handler: self.error_handler.unwrap_or_else(|| Arc::new(BadGatewayHandler)),
            inbound_protocol: if config.listener.tls.is_some() { "https:" } else { "http:" },
        };

        let router = HttpServer::build_router(&config, state);
        Ok(HttpServer { router, config })
    }
}

impl HttpServer {
    /// Create a server from configuration alone.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        Self::builder(config).build()
    }

    pub fn builder(config: ProxyConfig) -> HttpServerBuilder {
        HttpServerBuilder {
            config,
            router: None,
            error_handler: None,
            upstream_tls: None,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            // Kept out of the stack below: `TimeoutLayer` needs a `Default` response body.
            .layer(RequestBodyLimitLayer::new(config.limits.max_body_size))
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                        tracing::info_span!(
                            "request",
                            request_id = %request_id(req),
                            method = %req.method(),
                            uri = %req.uri(),
                        )
                    }))
                    .layer(propagate_request_id_layer())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// Run the server on a plaintext listener until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server with TLS termination until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            shutdown::wait(shutdown).await;
            drain.graceful_shutdown(Some(Duration::from_secs(TLS_DRAIN_SECS)));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// The assembled router, for embedding in another server.
    pub fn into_router(self) -> Router {
        self.router
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Whether any configured route can send a request to an `"https:"` target.
fn may_target_secure(resolver: Option<&Resolver>, default_target: Option<&TargetSpec>) -> bool {
    resolver.is_some_and(|r| r.config().may_target_secure()) || default_target.is_some_and(TargetSpec::is_secure)
}

/// Main proxy handler.
/// Resolves the target, then forwards or hands the failure to the error hook.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let ctx = RequestContext::from_request(&request, state.inbound_protocol);

    let outcome = match &state.resolver {
        Some(resolver) => {
            let outcome = resolver.resolve(&ctx).await;
            metrics::record_resolution(resolver.config().kind(), &outcome);
            outcome
        }
        None => ResolutionOutcome::NoMatch,
    };

    let response = match dispatch_target(outcome, state.default_target.as_ref()) {
        Ok(target) => {
            tracing::debug!(target = %target, path = %ctx.path(), "Proxying request");
            match state.forwarder.forward(&target, request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(target = %target, error = %e, "Upstream error");
                    (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
                }
            }
        }
        Err(err) => state.error_handler.handle(err, &ctx),
    };

    metrics::record_request(&method, response.status().as_u16(), start);
    response
}
