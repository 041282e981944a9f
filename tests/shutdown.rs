//! Graceful shutdown: stop admitting at once, finish what is in flight.

use std::time::Duration;
use tokio::net::TcpStream;

mod common;

use common::{eventually, exchange, start_proxy, start_upstream, ProxyOptions};

#[tokio::test]
async fn drains_in_flight_connections_before_returning() {
    let upstream = start_upstream(|body| async move {
        tokio::time::sleep(Duration::from_millis(600)).await;
        (200, body)
    })
    .await;
    let url = upstream.url();
    let proxy = start_proxy(ProxyOptions::new(&url)).await;
    let addr = proxy.addr;

    let in_flight = tokio::spawn(async move { exchange(addr, b"slow request").await });
    assert!(eventually(|| proxy.tracker.in_flight() == 1).await);

    proxy.shutdown.trigger();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(
        TcpStream::connect(addr).await.is_err(),
        "listener still accepting after shutdown"
    );
    assert!(!proxy.handle.is_finished(), "returned before draining");

    let reply = in_flight.await.unwrap();
    assert_eq!(reply, b"slow request");

    tokio::time::timeout(Duration::from_secs(2), proxy.handle)
        .await
        .expect("proxy did not finish draining")
        .unwrap();
    assert_eq!(proxy.counters.active_connections(), 0);
    assert_eq!(proxy.counters.total_requests(), 1);
}

#[tokio::test]
async fn idle_proxy_stops_immediately() {
    let upstream = start_upstream(|body| async move { (200, body) }).await;
    let url = upstream.url();
    let proxy = start_proxy(ProxyOptions::new(&url)).await;

    proxy.shutdown.trigger();

    tokio::time::timeout(Duration::from_secs(1), proxy.handle)
        .await
        .expect("idle proxy did not stop")
        .unwrap();
}
