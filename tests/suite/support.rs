//! Shared harness: server startup, test-double stores, and a raw HTTP client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use flavors::config::{Config, Database, Server as ServerConfig};
use flavors::{Error, Flavor, FlavorUpdate, Flavors, Module, NewFlavor, Result, SqlStore, Store};
use flavors::{db, server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn test_config(request_timeout_secs: u64) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            request_timeout_secs,
        },
        database: Database {
            url: ":memory:".to_string(),
        },
    }
}

/// Start a server whose flavors module is backed by `store`.
pub async fn start_with_store<S: Store>(store: S, request_timeout_secs: u64) -> server::Server {
    let mut router = flavors::Router::new();
    Flavors::new(Arc::new(store)).routes(&mut router);

    server::start(test_config(request_timeout_secs), router.into_handle())
        .await
        .expect("failed to start test server")
}

/// Start a server over a fresh, migrated in-memory database.
pub async fn start() -> server::Server {
    let store = SqlStore::new(db::connect(":memory:").await.unwrap()).unwrap();
    db::migrate(store.connection()).await.unwrap();
    start_with_store(store, 30).await
}

/// Store whose every call fails with an error carrying internal detail.
pub struct FailingStore;

fn failure<T>() -> Result<T> {
    Err(Error::Internal(
        "disk I/O error while running SELECT id, text FROM flavors".into(),
    ))
}

impl Store for FailingStore {
    async fn list(&self) -> Result<Vec<Flavor>> {
        failure()
    }

    async fn get(&self, _id: i64) -> Result<Option<Flavor>> {
        failure()
    }

    async fn create(&self, _new: NewFlavor) -> Result<Flavor> {
        failure()
    }

    async fn update(&self, _id: i64, _update: FlavorUpdate) -> Result<Option<Flavor>> {
        failure()
    }

    async fn delete(&self, _id: i64) -> Result<bool> {
        failure()
    }
}

/// Store that panics on reads and sleeps before answering deletes.
pub struct MisbehavingStore {
    pub delete_delay: Duration,
}

impl Store for MisbehavingStore {
    async fn list(&self) -> Result<Vec<Flavor>> {
        panic!("list exploded");
    }

    async fn get(&self, _id: i64) -> Result<Option<Flavor>> {
        Ok(None)
    }

    async fn create(&self, _new: NewFlavor) -> Result<Flavor> {
        failure()
    }

    async fn update(&self, _id: i64, _update: FlavorUpdate) -> Result<Option<Flavor>> {
        Ok(None)
    }

    async fn delete(&self, _id: i64) -> Result<bool> {
        tokio::time::sleep(self.delete_delay).await;
        Ok(true)
    }
}

/// A parsed HTTP response.
pub struct Reply {
    pub status: u16,
    /// Raw header block, exactly as received.
    pub head: String,
    pub body: String,
}

impl Reply {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body)
            .unwrap_or_else(|e| panic!("body is not JSON ({e}): {:?}", self.body))
    }

    /// Value of the first header called `name`, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }
}

pub fn parse_reply(raw: &[u8]) -> Reply {
    let text = String::from_utf8_lossy(raw).into_owned();
    let (head, body) = text
        .split_once("\r\n\r\n")
        .unwrap_or_else(|| panic!("incomplete response: {text:?}"));
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("bad status line: {head:?}"));
    Reply {
        status,
        head: head.to_string(),
        body: body.to_string(),
    }
}

/// Send a raw HTTP/1.1 request with `Connection: close` and read the full response.
pub async fn raw_request(addr: SocketAddr, payload: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.expect("failed to connect");
    stream.write_all(payload).await.expect("failed to write");

    let mut buf = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf)).await;
    buf
}

/// Send a request with an optional JSON body and parse the reply.
pub async fn send(addr: SocketAddr, method: &str, path: &str, body: Option<&str>) -> Reply {
    let request = match body {
        Some(body) => format!(
            "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ),
        None => format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"),
    };
    parse_reply(&raw_request(addr, request.as_bytes()).await)
}
