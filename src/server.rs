//! HTTP server implementation using hyper.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::header::HeaderValue;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::response;
use crate::router::{Context, RouteMatch, RouterHandle};

/// Maximum request body size in bytes (1 MB).
const MAX_BODY_SIZE: usize = 1_048_576;

/// Maximum number of concurrent connections.
const MAX_CONNECTIONS: usize = 128;

/// Timeout for reading request headers (slowloris protection).
const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// How long shutdown waits for open connections to finish.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

const REQUEST_ID: &str = "x-request-id";

/// Shared server state.
pub struct State {
    pub config: Config,
    pub router: Arc<RouterHandle>,
}

/// Handle to a running server instance.
pub struct Server {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<crate::Result<()>>,
}

impl Server {
    /// The address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting, drain open connections, and wait for the accept loop
    /// to finish.
    pub async fn shutdown(self) -> crate::Result<()> {
        let _ = self.shutdown_tx.send(());
        join_accept_loop(self.task.await)
    }
}

/// Surface a panicked or cancelled accept loop as an error.
fn join_accept_loop(
    joined: Result<crate::Result<()>, tokio::task::JoinError>,
) -> crate::Result<()> {
    joined.unwrap_or_else(|e| Err(crate::Error::Internal(format!("Accept loop failed: {e}"))))
}

/// Reuse a client-supplied request id when it is a UUID, otherwise mint one.
fn request_id(headers: &hyper::HeaderMap) -> String {
    headers
        .get(REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::try_parse(v.trim()).ok())
        .unwrap_or_else(Uuid::new_v4)
        .to_string()
}

/// Add security and request-id headers to a response.
fn add_standard_headers(response: &mut Response<Full<Bytes>>, request_id: &str) {
    let headers = response.headers_mut();
    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    if let Ok(value) = HeaderValue::from_str(request_id) {
        headers.insert(REQUEST_ID, value);
    }
}

/// Handle an incoming HTTP request.
async fn handle_request(
    req: Request<Incoming>,
    state: Arc<State>,
) -> Result<Response<Full<Bytes>>, std::convert::Infallible> {
    let started = Instant::now();
    let (parts, body) = req.into_parts();
    let request_id = request_id(&parts.headers);
    let method = parts.method.clone();
    let path = parts.uri.path().to_string();

    let mut response = dispatch(parts, body, &state).await;
    add_standard_headers(&mut response, &request_id);

    info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        request_id = %request_id,
        "request"
    );
    Ok(response)
}

async fn dispatch(
    parts: hyper::http::request::Parts,
    body: Incoming,
    state: &State,
) -> Response<Full<Bytes>> {
    // Reject oversized bodies early via Content-Length header
    if let Some(cl) = parts.headers.get(hyper::header::CONTENT_LENGTH)
        && let Ok(len) = cl.to_str().unwrap_or("0").parse::<usize>()
        && len > MAX_BODY_SIZE
    {
        return response::error(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large");
    }

    // Read body with size limit (fallback for chunked encoding)
    let body = match BodyExt::collect(Limited::new(body, MAX_BODY_SIZE)).await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return response::error(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large"),
    };

    match state.router.match_route(&parts.method, parts.uri.path()) {
        RouteMatch::Matched { handler, params } => {
            let ctx = Context {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                params,
                body,
            };

            // A separate task isolates handler panics from the connection.
            let mut task = tokio::spawn(handler(ctx));
            match tokio::time::timeout(state.config.server.request_timeout(), &mut task).await {
                Ok(Ok(Ok(response))) => response,
                Ok(Ok(Err(e))) => e.into_response(),
                Ok(Err(e)) => {
                    error!("Handler failed: {e}");
                    response::internal_error("Internal server error")
                }
                Err(_) => {
                    task.abort();
                    warn!("Handler exceeded request timeout");
                    response::error(StatusCode::SERVICE_UNAVAILABLE, "Request timed out")
                }
            }
        }
        RouteMatch::MethodNotAllowed => {
            response::error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
        }
        RouteMatch::NotFound => response::not_found("Not found"),
    }
}

fn connection_builder() -> auto::Builder<TokioExecutor> {
    let mut builder = auto::Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(HEADER_READ_TIMEOUT);
    builder
}

/// Bind, start accepting connections, and return a handle.
///
/// The returned [`Server`] exposes the bound address and a
/// [`shutdown`](Server::shutdown) method for graceful termination.
pub async fn start(config: Config, router: Arc<RouterHandle>) -> crate::Result<Server> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;

    let state = Arc::new(State { config, router });

    info!("Server listening on http://{}", addr);

    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let (drain_tx, drain_rx) = watch::channel(false);
    let semaphore = Arc::new(Semaphore::new(MAX_CONNECTIONS));

    let task = tokio::spawn(async move {
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, remote_addr) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!("Failed to accept connection: {e}");
                            continue;
                        }
                    };
                    let io = TokioIo::new(stream);

                    match semaphore.clone().try_acquire_owned() {
                        Ok(permit) => {
                            let state = Arc::clone(&state);
                            let mut drain = drain_rx.clone();
                            connections.spawn(async move {
                                let service = service_fn(move |req| {
                                    let state = Arc::clone(&state);
                                    handle_request(req, state)
                                });

                                let builder = connection_builder();
                                let conn = builder.serve_connection(io, service);
                                tokio::pin!(conn);

                                let result = tokio::select! {
                                    result = conn.as_mut() => result,
                                    _ = drain.changed() => {
                                        conn.as_mut().graceful_shutdown();
                                        conn.await
                                    }
                                };
                                if let Err(e) = result {
                                    error!("Error serving connection from {}: {}", remote_addr, e);
                                }

                                drop(permit);
                            });
                        }
                        Err(_) => {
                            warn!("Connection limit reached, rejecting {}", remote_addr);
                            tokio::spawn(async move {
                                let service = service_fn(|_req: Request<Incoming>| async {
                                    Ok::<_, std::convert::Infallible>(response::error(
                                        StatusCode::SERVICE_UNAVAILABLE,
                                        "Service unavailable",
                                    ))
                                });

                                let _ = connection_builder().serve_connection(io, service).await;
                            });
                        }
                    }
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = &mut shutdown_rx => {
                    break;
                }
            }
        }

        drop(listener);
        let _ = drain_tx.send(true);
        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("Aborting {} connections still open after drain", connections.len());
            connections.abort_all();
        }
        info!("Server on http://{} stopped", addr);

        Ok(())
    });

    Ok(Server {
        addr,
        shutdown_tx,
        task,
    })
}

/// Run the HTTP server until Ctrl-C, then shut down gracefully.
pub async fn run(config: Config, router: Arc<RouterHandle>) -> crate::Result<()> {
    let mut server = start(config, router).await?;
    tokio::select! {
        result = &mut server.task => return join_accept_loop(result),
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }
    server.shutdown().await
}
