#![cfg(feature = "http")]

use std::time::Duration;

use prometheus::{IntGauge, Registry};
use reporter_config::{HostPort, InfluxDbReporterConfig, TimeUnit};
use reporter_influxdb::{
    HttpSender, HttpSenderFactory, InfluxDbReporterAdapter, InfluxDbSender, ReporterError,
    SenderFactory, SenderSettings,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Accepts one connection, captures one request and answers `status_line`.
async fn serve_once(status_line: &'static str) -> (HostPort, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..n]);
            if let Some(end) = header_end(&request) {
                let headers = String::from_utf8_lossy(&request[..end]).to_ascii_lowercase();
                let body_len = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + body_len {
                    break;
                }
            }
        }

        let response = format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
    });

    (HostPort::new("127.0.0.1", port), rx)
}

fn header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn header<'a>(request: &'a str, name: &str) -> Option<&'a str> {
    request.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.eq_ignore_ascii_case(name).then(|| value.trim())
    })
}

async fn closed_port() -> HostPort {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    HostPort::new("127.0.0.1", port)
}

fn settings() -> SenderSettings {
    SenderSettings {
        protocol: "http".into(),
        database: "metrics".into(),
        credentials: Some(("writer".into(), "secret".into())),
        precision: TimeUnit::Milliseconds,
        connect_timeout: Duration::from_secs(2),
        read_timeout: Duration::from_secs(2),
        ping_on_connect: false,
    }
}

#[tokio::test]
async fn write_posts_line_protocol() {
    let (host, request) = serve_once("HTTP/1.1 204 No Content").await;
    let sender = HttpSender::new(host, &settings()).unwrap();

    sender
        .write("queue_depth,host=web-01 value=3 1700000000000\n")
        .await
        .unwrap();

    let request = request.await.unwrap();
    assert!(request.starts_with("POST /write?db=metrics&precision=ms HTTP/1.1\r\n"));
    assert_eq!(
        header(&request, "authorization"),
        Some("Basic d3JpdGVyOnNlY3JldA==")
    );
    assert!(request.ends_with("\r\n\r\nqueue_depth,host=web-01 value=3 1700000000000\n"));
}

#[tokio::test]
async fn server_error_is_reported() {
    let (host, _request) = serve_once("HTTP/1.1 500 Internal Server Error").await;
    let sender = HttpSender::new(host, &settings()).unwrap();

    let err = sender.write("m value=1\n").await.unwrap_err();
    assert!(matches!(err, ReporterError::Server { status: 500, .. }));
}

#[tokio::test]
async fn ping_on_connect_rejects_dead_host() {
    let mut settings = settings();
    settings.ping_on_connect = true;

    let dead = closed_port().await;
    let err = HttpSenderFactory
        .connect(&dead, &settings)
        .await
        .unwrap_err();
    assert!(matches!(err, ReporterError::Network(_)));

    let (live, request) = serve_once("HTTP/1.1 204 No Content").await;
    let sender = HttpSenderFactory.connect(&live, &settings).await.unwrap();
    assert_eq!(sender.endpoint(), &live);
    assert!(request.await.unwrap().starts_with("GET /ping HTTP/1.1\r\n"));
}

#[tokio::test]
async fn adapter_fails_over_to_live_host_and_reports() {
    let dead = closed_port().await;
    let (live, ping) = serve_once("HTTP/1.1 204 No Content").await;

    let config = InfluxDbReporterConfig {
        db_name: "metrics".into(),
        tag: "web-01".into(),
        hosts: Some(vec![dead, live.clone()]),
        ping_on_connect: true,
        ..Default::default()
    };

    let registry = Registry::new();
    let gauge = IntGauge::new("queue_depth", "depth").unwrap();
    gauge.set(3);
    registry.register(Box::new(gauge)).unwrap();

    let mut adapter = InfluxDbReporterAdapter::new(config);
    assert!(adapter.enable(&registry).await);
    assert_eq!(adapter.active_host(), Some(&live));
    assert!(ping.await.unwrap().starts_with("GET /ping"));
}
