//! Shared utilities for integration and load testing.

use std::net::SocketAddr;
use std::time::Duration;

use ec2_metadata_mock::config::MockConfig;
use ec2_metadata_mock::http::MockServer;
use ec2_metadata_mock::lifecycle::Shutdown;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";
pub const TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";

/// A mock server running on a background task.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub updates: mpsc::UnboundedSender<MockConfig>,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path.trim_start_matches('/'))
    }
}

/// Start the mock on `addr` and wait until it accepts connections.
pub async fn start_server(addr: SocketAddr, mut config: MockConfig) -> TestServer {
    config.server.host = addr.ip().to_string();
    config.server.port = addr.port();

    let shutdown = Shutdown::new();
    let (updates, config_updates) = mpsc::unbounded_channel();
    let server = MockServer::new(config).unwrap();
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let server_shutdown = shutdown.subscribe();

    let handle =
        tokio::spawn(async move { server.run(listener, config_updates, server_shutdown).await });

    wait_until_listening(addr).await;
    TestServer {
        addr,
        shutdown,
        updates,
        handle,
    }
}

async fn wait_until_listening(addr: SocketAddr) {
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("mock server on {addr} never started listening");
}

/// Client that bypasses proxies and does not pool connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Request a session token.
#[allow(dead_code)]
pub async fn fetch_token(client: &reqwest::Client, server: &TestServer, ttl: u64) -> String {
    let res = client
        .put(server.url("latest/api/token"))
        .header(TOKEN_TTL_HEADER, ttl.to_string())
        .send()
        .await
        .expect("mock unreachable");
    assert_eq!(res.status(), 200, "token request failed");
    res.text().await.unwrap()
}
