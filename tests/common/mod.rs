//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use edge_gateway::auth::token::{now_secs, sign};
use edge_gateway::auth::Claims;
use edge_gateway::config::{GatewayConfig, RateClassConfig, ServiceConfig, DEFAULT_RATE_CLASS};
use edge_gateway::{HttpServer, Shutdown};

pub const SECRET: &str = "integration-test-secret";

/// What a mock backend answers for one request.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
    /// Advertised Content-Length when it differs from the body sent.
    pub declared_length: Option<usize>,
}

impl MockReply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
            declared_length: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Send headers promising `declared` bytes, then only `body`, then stall.
    pub fn truncated(body: impl Into<String>, declared: usize) -> Self {
        let mut reply = Self::ok(body);
        reply.declared_length = Some(declared);
        reply
    }
}

/// A raw-TCP HTTP/1.1 backend that records what it receives.
pub struct MockBackend {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    last_request: Arc<Mutex<Option<String>>>,
}

impl MockBackend {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Request line and headers of the most recent request.
    pub fn last_request(&self) -> Option<String> {
        self.last_request.lock().unwrap().clone()
    }
}

/// Start a programmable mock backend. `f` receives the zero-based hit index.
pub async fn start_backend<F>(f: F) -> MockBackend
where
    F: Fn(usize) -> MockReply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let last_request = Arc::new(Mutex::new(None));
    let f = Arc::new(f);

    let (h, lr) = (hits.clone(), last_request.clone());
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let (f, hits, last_request) = (f.clone(), h.clone(), lr.clone());
            tokio::spawn(async move {
                let Some(head) = read_request(&mut socket).await else {
                    return;
                };
                let index = hits.fetch_add(1, Ordering::SeqCst);
                *last_request.lock().unwrap() = Some(head);

                let reply = f(index);
                tokio::time::sleep(reply.delay).await;
                let response = format!(
                    "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    reply.status,
                    reply.declared_length.unwrap_or(reply.body.len()),
                    reply.body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                if reply.declared_length.is_some() {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    MockBackend {
        addr,
        hits,
        last_request,
    }
}

/// Backend that always answers 200 with `body`.
pub async fn start_mock_backend(body: &'static str) -> MockBackend {
    start_backend(move |_| MockReply::ok(body)).await
}

/// Read the request head (and any declared body) from the socket.
async fn read_request(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = find_head_end(&buf) {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let total = end + 4 + content_length(&head);
            while buf.len() < total {
                let n = socket.read(&mut chunk).await.ok()?;
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            return Some(head);
        }
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Platform defaults with the test secret, metrics off, and every service
/// pointed at a closed port unless overridden.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default().with_platform_defaults();
    config.auth.jwt_secret = SECRET.to_string();
    config.observability.metrics_enabled = false;
    config.retries.base_delay_ms = 10;
    config.retries.max_delay_ms = 20;
    for service in &mut config.services {
        service.address = "127.0.0.1:1".to_string();
    }
    config
}

/// Point `service` at `addr`.
pub fn set_service(config: &mut GatewayConfig, service: &str, addr: SocketAddr) {
    config.services.retain(|s| s.name != service);
    config.services.push(ServiceConfig::new(service, addr.to_string()));
}

pub fn set_default_class(config: &mut GatewayConfig, capacity: u32, refill_per_sec: f64) {
    config.rate_limit.classes.insert(
        DEFAULT_RATE_CLASS.to_string(),
        RateClassConfig {
            capacity,
            refill_per_sec,
        },
    );
}

/// Start the gateway on an ephemeral port.
pub async fn start_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });
    (addr, shutdown)
}

/// Wait until `backend` has seen `count` requests.
pub async fn wait_for_hits(backend: &MockBackend, count: usize) {
    for _ in 0..200 {
        if backend.hits() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("backend saw {} requests, expected {count}", backend.hits());
}

/// Send `head` verbatim (no client-side path normalization) and return the
/// status line of the reply.
pub async fn raw_request(addr: SocketAddr, head: &str) -> String {
    let mut socket = TcpStream::connect(addr).await.unwrap();
    socket.write_all(head.as_bytes()).await.unwrap();
    let mut reply = Vec::new();
    socket.read_to_end(&mut reply).await.unwrap();
    String::from_utf8_lossy(&reply)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// A token for subject `42` (`alice`, role `USER`) valid for an hour.
pub fn user_token() -> String {
    let claims = Claims::new("42", now_secs() + 3600)
        .with_username("alice")
        .with_roles(["USER"]);
    sign(&claims, SECRET.as_bytes()).unwrap()
}

pub fn expired_token() -> String {
    let claims = Claims::new("42", now_secs() - 60);
    sign(&claims, SECRET.as_bytes()).unwrap()
}
