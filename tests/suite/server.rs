//! Server infrastructure: limits, headers, panics, timeouts, shutdown.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::support::{MisbehavingStore, parse_reply, raw_request, send, start, start_with_store};

fn misbehaving(delete_delay: Duration) -> MisbehavingStore {
    MisbehavingStore { delete_delay }
}

/// Headers alone declare a 10 MB body; the server answers 413 without
/// waiting for the data.
#[tokio::test]
async fn rejects_oversized_body() {
    let server = start().await;

    let response = raw_request(
        server.addr(),
        b"POST /api/flavors HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: 10485760\r\nConnection: close\r\n\r\n",
    )
    .await;
    let reply = parse_reply(&response);

    server.shutdown().await.unwrap();

    assert_eq!(reply.status, 413);
}

#[tokio::test]
async fn returns_security_headers_and_request_id() {
    let server = start().await;

    let reply = send(server.addr(), "GET", "/api/flavors", None).await;

    server.shutdown().await.unwrap();

    assert_eq!(reply.header("x-content-type-options").as_deref(), Some("nosniff"));
    assert_eq!(reply.header("x-frame-options").as_deref(), Some("DENY"));
    let id = reply.header("x-request-id").expect("missing X-Request-Id");
    assert!(uuid::Uuid::try_parse(&id).is_ok(), "not a UUID: {id}");
}

#[test]
fn header_lookup_ignores_name_case_but_keeps_value() {
    let reply = parse_reply(
        b"HTTP/1.1 200 OK\r\nX-Frame-Options: DENY\r\ncontent-length: 0\r\n\r\n",
    );
    assert_eq!(reply.header("x-frame-options").as_deref(), Some("DENY"));
    assert_eq!(reply.header("Content-Length").as_deref(), Some("0"));
    assert_eq!(reply.header("x-request-id"), None);
}

#[tokio::test]
async fn propagates_client_request_id() {
    let server = start().await;
    let client_id = "550e8400-e29b-41d4-a716-446655440000";

    let request = format!(
        "GET /api/flavors HTTP/1.1\r\nHost: localhost\r\nX-Request-Id: {client_id}\r\nConnection: close\r\n\r\n"
    );
    let reply = parse_reply(&raw_request(server.addr(), request.as_bytes()).await);

    server.shutdown().await.unwrap();

    assert_eq!(reply.header("x-request-id").as_deref(), Some(client_id));
}

#[tokio::test]
async fn replaces_invalid_request_id() {
    let server = start().await;

    let reply = parse_reply(
        &raw_request(
            server.addr(),
            b"GET /api/flavors HTTP/1.1\r\nHost: localhost\r\nX-Request-Id: not-a-uuid\r\nConnection: close\r\n\r\n",
        )
        .await,
    );

    server.shutdown().await.unwrap();

    let id = reply.header("x-request-id").expect("missing X-Request-Id");
    assert_ne!(id, "not-a-uuid");
    assert!(uuid::Uuid::try_parse(&id).is_ok());
}

#[tokio::test]
async fn handler_panic_becomes_500() {
    let server = start_with_store(misbehaving(Duration::ZERO), 30).await;
    let addr = server.addr();

    let reply = send(addr, "GET", "/api/flavors", None).await;
    assert_eq!(reply.status, 500);
    assert_eq!(
        reply.json(),
        serde_json::json!({ "error": "Internal server error" })
    );

    // Other routes still work afterwards.
    assert_eq!(send(addr, "GET", "/api/flavors/1", None).await.status, 404);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn slow_handler_times_out() {
    let server = start_with_store(misbehaving(Duration::from_secs(10)), 1).await;

    let reply = send(server.addr(), "DELETE", "/api/flavors/1", None).await;

    server.shutdown().await.unwrap();

    assert_eq!(reply.status, 503);
}

/// In-flight requests complete after the shutdown signal.
#[tokio::test]
async fn drains_on_shutdown() {
    let server = start_with_store(misbehaving(Duration::from_millis(500)), 30).await;
    let addr = server.addr();

    let mut stream = TcpStream::connect(addr).await.expect("failed to connect");
    stream
        .write_all(b"DELETE /api/flavors/1 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .expect("failed to write");

    tokio::time::sleep(Duration::from_millis(100)).await;
    let shutdown = tokio::spawn(async move { server.shutdown().await });

    let mut buf = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut buf)).await;

    assert_eq!(parse_reply(&buf).status, 204);
    shutdown.await.unwrap().unwrap();

    assert!(TcpStream::connect(addr).await.is_err(), "listener still open");
}

/// A connection that stalls mid-headers is closed by the server.
#[tokio::test]
async fn closes_slow_connections() {
    let server = start().await;

    let mut stream = TcpStream::connect(server.addr()).await.expect("failed to connect");
    stream
        .write_all(b"GET /api/flavors HTTP/1.1\r\nHost: localhost\r\n")
        .await
        .expect("failed to write partial request");

    tokio::time::sleep(Duration::from_secs(3)).await;

    let mut buf = vec![0u8; 4096];
    let result = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf)).await;

    server.shutdown().await.unwrap();

    match result {
        Ok(Ok(0)) | Ok(Err(_)) => {}
        Ok(Ok(n)) => {
            let resp = String::from_utf8_lossy(&buf[..n]);
            assert!(
                resp.contains("408") || resp.contains("timeout"),
                "Expected connection close or 408, got:\n{resp}"
            );
        }
        Err(_) => panic!("Server did not close the stalled connection"),
    }
}
