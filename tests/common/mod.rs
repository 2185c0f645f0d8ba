//! Shared utilities for integration testing.

use rcgen::{generate_simple_self_signed, CertifiedKey};
use router_proxy::net::tls::upstream_client_config;
use router_proxy::{HttpServer, Shutdown};
use rustls::crypto::aws_lc_rs;
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// First byte of a TLS handshake record.
const TLS_HANDSHAKE: u8 = 0x16;

/// Self-signed `localhost` certificate, as server and as trusted root.
pub struct TestPki {
    pub server: Arc<ServerConfig>,
    pub client: Arc<ClientConfig>,
}

pub fn test_pki() -> TestPki {
    let CertifiedKey { cert, key_pair } = generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_der = cert.der().clone();
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    let server = ServerConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der.clone()], key_der)
        .unwrap();

    let mut roots = RootCertStore::empty();
    roots.add(cert_der).unwrap();

    TestPki {
        server: Arc::new(server),
        client: upstream_client_config(roots).unwrap(),
    }
}

/// A mock upstream that answers `<name>` over TLS and `NOT HTTPS <name>` over plaintext.
pub struct Backend {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
}

impl Backend {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub async fn start_backend(name: &'static str, tls: Arc<ServerConfig>) -> Backend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let acceptor = TlsAcceptor::from(tls);

    let counter = hits.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let mut first = [0u8; 1];
                if socket.peek(&mut first).await.is_err() {
                    return;
                }
                if first[0] == TLS_HANDSHAKE {
                    if let Ok(stream) = acceptor.accept(socket).await {
                        respond(stream, name.to_string()).await;
                    }
                } else {
                    respond(socket, format!("NOT HTTPS {name}")).await;
                }
            });
        }
    });

    Backend { addr, hits }
}

async fn respond<S>(mut io: S, body: String)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Read the request head before answering.
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match io.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&chunk[..n]),
        }
    }

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = io.write_all(response.as_bytes()).await;
    let _ = io.shutdown().await;
}

/// Serve `server` on an ephemeral port.
pub async fn start_proxy(server: HttpServer) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    (addr, shutdown)
}

/// GET `path` through the proxy, optionally overriding the `Host` header.
pub async fn get(proxy: SocketAddr, host: Option<&str>, path: &str) -> (u16, String) {
    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();

    let mut req = client.get(format!("http://{}{}", proxy, path));
    if let Some(host) = host {
        req = req.header("Host", host);
    }

    let res = req.send().await.expect("Proxy unreachable");
    let status = res.status().as_u16();
    (status, res.text().await.unwrap())
}
