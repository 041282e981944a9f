//! Shared utilities for integration tests.
#![allow(dead_code)]

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use tcp_https_proxy::config::{ListenerConfig, UpstreamConfig};
use tcp_https_proxy::net::{ConnectionTracker, Listener};
use tcp_https_proxy::observability::Counters;
use tcp_https_proxy::{HttpsForwarder, ProxyServer, Shutdown};

/// One request as seen by the mock upstream.
#[derive(Debug, Clone)]
pub struct Captured {
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

pub struct MockUpstream {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<Captured>>>,
}

impl MockUpstream {
    pub fn url(&self) -> String {
        format!("http://{}/ingest", self.addr)
    }

    pub fn captured(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }
}

/// Start a programmable upstream answering `POST /ingest`.
pub async fn start_upstream<F, Fut>(respond: F) -> MockUpstream
where
    F: Fn(Vec<u8>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = (u16, Vec<u8>)> + Send + 'static,
{
    let requests = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&requests);

    let app = Router::new().route(
        "/ingest",
        post(move |headers: HeaderMap, body: Bytes| {
            let captured = Arc::clone(&captured);
            let respond = respond.clone();
            async move {
                captured.lock().unwrap().push(Captured {
                    headers,
                    body: body.to_vec(),
                });
                let (status, reply) = respond(body.to_vec()).await;
                (StatusCode::from_u16(status).unwrap(), reply)
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockUpstream { addr, requests }
}

pub struct RunningProxy {
    pub addr: SocketAddr,
    pub counters: Arc<Counters>,
    pub tracker: ConnectionTracker,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<()>,
}

pub struct ProxyOptions<'a> {
    pub endpoint: &'a str,
    pub auth_token: Option<&'a str>,
    pub max_connections: usize,
    pub timeout: Duration,
}

impl<'a> ProxyOptions<'a> {
    pub fn new(endpoint: &'a str) -> Self {
        Self {
            endpoint,
            auth_token: None,
            max_connections: 100,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Start a proxy on an ephemeral loopback port.
pub async fn start_proxy(options: ProxyOptions<'_>) -> RunningProxy {
    let counters = Arc::new(Counters::new());
    let upstream = UpstreamConfig {
        endpoint: options.endpoint.to_string(),
        auth_token: options.auth_token.map(str::to_string),
        system_proxy: false,
        ..UpstreamConfig::default()
    };
    let forwarder = HttpsForwarder::new(&upstream, options.timeout).unwrap();

    let listener_config = ListenerConfig {
        bind_address: "127.0.0.1:0".into(),
        max_connections: options.max_connections,
    };
    let listener = Listener::bind(&listener_config, Arc::clone(&counters))
        .await
        .unwrap();

    let server = ProxyServer::new(listener, forwarder, Arc::clone(&counters), options.timeout);
    let addr = server.local_addr().unwrap();
    let tracker = server.tracker();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(shutdown.subscribe()));

    RunningProxy {
        addr,
        counters,
        tracker,
        shutdown,
        handle,
    }
}

/// Send one payload and read until the proxy closes the connection.
pub async fn exchange(addr: SocketAddr, payload: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(payload).await.unwrap();

    let mut reply = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut reply))
        .await
        .expect("proxy did not close the connection")
        .unwrap();
    reply
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
