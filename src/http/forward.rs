//! Forwarding to the resolved upstream.
//!
//! # Responsibilities
//! - Open one connection per request to the target (no pooling)
//! - Use TLS only when the target protocol is exactly `"https:"`
//! - Rewrite the request to origin-form, keep the client's `Host`
//! - Strip hop-by-hop headers in both directions
//!
//! # Design Decisions
//! - HTTP/1.1 towards upstreams regardless of inbound version
//! - SNI is the target host, verified against the configured roots

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Request, Uri, Version};
use axum::response::Response;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::routing::TargetSpec;

/// Headers that describe a single hop and must not be forwarded.
const HOP_BY_HOP: [header::HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Errors talking to the upstream.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("connect to {target} failed: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connect to {0} timed out")]
    ConnectTimeout(String),

    #[error("invalid TLS server name `{0}`")]
    ServerName(String),

    #[error("TLS handshake with {target} failed: {source}")]
    Tls {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("upstream HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("invalid upstream request: {0}")]
    Request(#[from] axum::http::Error),
}

/// Sends requests to resolved targets.
#[derive(Clone)]
pub struct Forwarder {
    tls: TlsConnector,
    connect_timeout: Duration,
}

impl Forwarder {
    /// `tls` is used for `"https:"` targets only.
    pub fn new(tls: Arc<ClientConfig>, connect_timeout: Duration) -> Self {
        Self {
            tls: TlsConnector::from(tls),
            connect_timeout,
        }
    }

    /// Forward `req` to `target` and return the upstream response.
    pub async fn forward(&self, target: &TargetSpec, req: Request<Body>) -> Result<Response, ForwardError> {
        let req = prepare_request(target, req)?;
        let stream = self.connect(target).await?;

        if target.is_secure() {
            let name = ServerName::try_from(target.host.clone())
                .map_err(|_| ForwardError::ServerName(target.host.clone()))?;
            let stream = self
                .tls
                .connect(name, stream)
                .await
                .map_err(|source| ForwardError::Tls {
                    target: target.to_string(),
                    source,
                })?;
            send(stream, req).await
        } else {
            send(stream, req).await
        }
    }

    async fn connect(&self, target: &TargetSpec) -> Result<TcpStream, ForwardError> {
        let connect = TcpStream::connect((target.host.as_str(), target.port));
        match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => {
                let _ = stream.set_nodelay(true);
                Ok(stream)
            }
            Ok(Err(source)) => Err(ForwardError::Connect {
                target: target.to_string(),
                source,
            }),
            Err(_) => Err(ForwardError::ConnectTimeout(target.to_string())),
        }
    }
}

async fn send<S>(io: S, req: Request<Body>) -> Result<Response, ForwardError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = http1::handshake(TokioIo::new(io)).await?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!(error = %e, "Upstream connection closed with error");
        }
    });

    let response = sender.send_request(req).await?;
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Ok(Response::from_parts(parts, Body::new(body)))
}

/// Rewrite an inbound request for the upstream connection.
fn prepare_request(target: &TargetSpec, req: Request<Body>) -> Result<Request<Body>, ForwardError> {
    let (mut parts, body) = req.into_parts();

    let host = match parts.headers.get(header::HOST) {
        Some(host) => host.clone(),
        None => match parts.uri.authority() {
            Some(authority) => HeaderValue::from_str(authority.as_str()).map_err(axum::http::Error::from)?,
            None => HeaderValue::from_str(&target.authority()).map_err(axum::http::Error::from)?,
        },
    };

    let path_and_query = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    parts.uri = Uri::try_from(path_and_query).map_err(axum::http::Error::from)?;
    parts.version = Version::HTTP_11;
    strip_hop_by_hop(&mut parts.headers);
    parts.headers.insert(header::HOST, host);

    Ok(Request::from_parts(parts, body))
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named in `Connection` are hop-by-hop too.
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();
    for name in listed {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn target() -> TargetSpec {
        TargetSpec::new("http:", "127.0.0.1", 6001)
    }

    #[test]
    fn test_prepare_origin_form() {
        let req = Request::builder()
            .uri("http://alpha.localhost:6000/api/users?limit=5")
            .header("Host", "alpha.localhost:6000")
            .header("Connection", "keep-alive, x-hop")
            .header("X-Hop", "1")
            .header("X-Kept", "1")
            .body(Body::empty())
            .unwrap();

        let req = prepare_request(&target(), req).unwrap();
        assert_eq!(req.uri(), "/api/users?limit=5");
        assert_eq!(req.headers()["host"], "alpha.localhost:6000");
        assert!(req.headers().get("connection").is_none());
        assert!(req.headers().get("x-hop").is_none());
        assert_eq!(req.headers()["x-kept"], "1");
    }

    #[test]
    fn test_prepare_sets_missing_host() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let req = prepare_request(&target(), req).unwrap();
        assert_eq!(req.headers()["host"], "127.0.0.1:6001");

        let req = Request::builder()
            .version(Version::HTTP_2)
            .uri("https://beta.localhost:6000/x")
            .body(Body::empty())
            .unwrap();
        let req = prepare_request(&target(), req).unwrap();
        assert_eq!(req.headers()["host"], "beta.localhost:6000");
        assert_eq!(req.version(), Version::HTTP_11);
    }

    #[tokio::test]
    async fn test_forward_plaintext() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let _ = socket.read(&mut buf).await.unwrap();
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
                .await;
        });

        let roots = rustls::RootCertStore::empty();
        let forwarder = Forwarder::new(
            crate::net::tls::upstream_client_config(roots).unwrap(),
            Duration::from_secs(1),
        );
        let target = TargetSpec::new("http:", "127.0.0.1", addr.port());
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();

        let response = forwarder.forward(&target, req).await.unwrap();
        assert_eq!(response.status(), 200);
        assert!(response.headers().get("connection").is_none());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on.
        let port = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap().port();
        let forwarder = Forwarder::new(
            crate::net::tls::upstream_client_config(rustls::RootCertStore::empty()).unwrap(),
            Duration::from_secs(1),
        );
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let err = forwarder
            .forward(&TargetSpec::new("http:", "127.0.0.1", port), req)
            .await
            .unwrap_err();
        assert!(matches!(err, ForwardError::Connect { .. }));
    }
}
