//! End-to-end tests: raw TCP client → proxy → mock upstream.

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;

use common::{eventually, exchange, start_proxy, start_upstream, ProxyOptions};

#[tokio::test]
async fn response_bytes_come_back_verbatim() {
    let upstream = start_upstream(|body: Vec<u8>| async move {
        let mut reply = vec![0x00, 0x9f, 0x92, 0x96];
        reply.extend_from_slice(&body);
        (200, reply)
    })
    .await;
    let url = upstream.url();
    let proxy = start_proxy(ProxyOptions {
        auth_token: Some("s3cret"),
        ..ProxyOptions::new(&url)
    })
    .await;

    let reply = exchange(proxy.addr, b"hello upstream").await;

    let mut expected = vec![0x00, 0x9f, 0x92, 0x96];
    expected.extend_from_slice(b"hello upstream");
    assert_eq!(reply, expected);

    let captured = upstream.captured();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].body, b"hello upstream");
    let headers = &captured[0].headers;
    assert_eq!(headers["content-type"], "application/octet-stream");
    assert_eq!(headers["user-agent"], "TCP-Proxy/1.0");
    assert_eq!(headers["authorization"], "Bearer s3cret");

    assert!(eventually(|| proxy.counters.total_requests() == 1).await);
    assert!(eventually(|| proxy.counters.active_connections() == 0).await);
    proxy.shutdown.trigger();
}

#[tokio::test]
async fn no_token_means_no_authorization_header() {
    let upstream = start_upstream(|_| async { (200, b"ok".to_vec()) }).await;
    let url = upstream.url();
    let proxy = start_proxy(ProxyOptions::new(&url)).await;

    assert_eq!(exchange(proxy.addr, b"x").await, b"ok");
    assert!(upstream.captured()[0].headers.get("authorization").is_none());
    proxy.shutdown.trigger();
}

#[tokio::test]
async fn error_status_becomes_error_line() {
    let upstream = start_upstream(|_| async { (500, b"boom".to_vec()) }).await;
    let url = upstream.url();
    let proxy = start_proxy(ProxyOptions::new(&url)).await;

    let reply = exchange(proxy.addr, b"payload").await;

    assert_eq!(String::from_utf8(reply).unwrap(), "ERROR: HTTP error 500: boom\n");
    assert!(eventually(|| proxy.counters.total_requests() == 1).await);
    assert_eq!(upstream.captured().len(), 1, "failures are not retried");
    proxy.shutdown.trigger();
}

#[tokio::test]
async fn unreachable_upstream_is_reported_to_client() {
    // Grab a free port, then close it so nothing is listening there.
    let vacant = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let url = format!("http://{}/ingest", vacant);
    let proxy = start_proxy(ProxyOptions::new(&url)).await;

    let reply = String::from_utf8(exchange(proxy.addr, b"payload").await).unwrap();

    assert!(reply.starts_with("ERROR: HTTPS request failed"), "got {:?}", reply);
    assert!(reply.ends_with('\n'));
    assert!(eventually(|| proxy.counters.total_requests() == 1).await);
    proxy.shutdown.trigger();
}

#[tokio::test]
async fn slow_upstream_hits_client_timeout() {
    let upstream = start_upstream(|_| async {
        tokio::time::sleep(Duration::from_secs(3)).await;
        (200, b"late".to_vec())
    })
    .await;
    let url = upstream.url();
    let proxy = start_proxy(ProxyOptions {
        timeout: Duration::from_millis(500),
        ..ProxyOptions::new(&url)
    })
    .await;

    let reply = String::from_utf8(exchange(proxy.addr, b"payload").await).unwrap();

    assert!(reply.starts_with("ERROR: HTTPS request timed out"), "got {:?}", reply);
    proxy.shutdown.trigger();
}

#[tokio::test]
async fn connection_over_ceiling_is_closed_unread() {
    let upstream = start_upstream(|body| async move { (200, body) }).await;
    let url = upstream.url();
    let proxy = start_proxy(ProxyOptions {
        max_connections: 1,
        ..ProxyOptions::new(&url)
    })
    .await;

    let mut first = TcpStream::connect(proxy.addr).await.unwrap();
    assert!(eventually(|| proxy.counters.active_connections() == 1).await);

    let mut second = TcpStream::connect(proxy.addr).await.unwrap();
    let mut buf = [0u8; 64];
    let closed = tokio::time::timeout(Duration::from_secs(2), second.read(&mut buf))
        .await
        .expect("rejected connection was not closed");
    assert!(matches!(closed, Ok(0) | Err(_)));
    assert_eq!(proxy.counters.active_connections(), 1);

    first.write_all(b"still here").await.unwrap();
    let mut reply = Vec::new();
    first.read_to_end(&mut reply).await.unwrap();
    assert_eq!(reply, b"still here");

    assert!(eventually(|| proxy.counters.total_requests() == 1).await);
    assert_eq!(upstream.captured().len(), 1);
    proxy.shutdown.trigger();
}

#[tokio::test]
async fn silent_client_is_dropped_without_counting() {
    let upstream = start_upstream(|body| async move { (200, body) }).await;
    let url = upstream.url();
    let proxy = start_proxy(ProxyOptions {
        timeout: Duration::from_millis(300),
        ..ProxyOptions::new(&url)
    })
    .await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    assert!(eventually(|| proxy.counters.active_connections() == 1).await);

    let mut buf = [0u8; 16];
    let n = tokio::time::timeout(Duration::from_secs(3), client.read(&mut buf))
        .await
        .expect("handler did not close after its deadline")
        .unwrap_or(0);
    assert_eq!(n, 0);

    assert!(eventually(|| proxy.counters.active_connections() == 0).await);
    assert_eq!(proxy.counters.total_requests(), 0);
    assert!(upstream.captured().is_empty());
    proxy.shutdown.trigger();
}

#[tokio::test]
async fn concurrent_clients_each_get_their_own_reply() {
    let upstream = start_upstream(|body| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        (200, body)
    })
    .await;
    let url = upstream.url();
    let proxy = start_proxy(ProxyOptions::new(&url)).await;

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let addr = proxy.addr;
            tokio::spawn(async move {
                let payload = format!("client-{}", i);
                let reply = exchange(addr, payload.as_bytes()).await;
                assert_eq!(reply, payload.as_bytes());
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    assert!(eventually(|| proxy.counters.total_requests() == 20).await);
    assert!(eventually(|| proxy.counters.active_connections() == 0).await);
    assert_eq!(proxy.tracker.in_flight(), 0);
    proxy.shutdown.trigger();
}
