//! HTTP server.
//!
//! One Tokio task per accepted connection, served with Hyper's HTTP/1
//! connection builder. Each request is handled in three steps:
//!
//! 1. Collect the body, bounded by `max_body_bytes` and `request_timeout`.
//!    The outcome becomes a [`RawBody`]; failures are left for the pipeline
//!    to report.
//! 2. Build a [`RequestContext`] and run the [`Pipeline`] in its own task.
//! 3. If that task is lost, let the pipeline's error handler answer with a
//!    500 envelope.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stoa_config::StoaConfig;
//! use stoa_middleware::identity::DisabledIdentityProvider;
//! use stoa_middleware::Pipeline;
//! use stoa_router::RouteTable;
//! use stoa_server::Server;
//!
//! # async fn run() -> Result<(), stoa_server::ServerError> {
//! let config = StoaConfig::default();
//! let pipeline = Pipeline::standard(
//!     &config,
//!     Arc::new(RouteTable::new()),
//!     Arc::new(DisabledIdentityProvider),
//! );
//!
//! Server::from_config(&config, Arc::new(pipeline))?.run().await
//! # }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::header::CONTENT_LENGTH;
use http::{HeaderMap, HeaderValue, Method, Request, Uri};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use stoa_config::StoaConfig;
use stoa_core::{RawBody, RequestContext, RequestId, Response, StoaError, REQUEST_ID_HEADER};
use stoa_middleware::Pipeline;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{AbortHandle, JoinError};

use crate::shutdown::{ConnectionTracker, ShutdownSignal};
use crate::{ServerError, ServerSettings};

/// The Stoa HTTP server.
pub struct Server {
    settings: ServerSettings,
    pipeline: Arc<Pipeline>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("settings", &self.settings)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

impl Server {
    /// Creates a server that runs every request through `pipeline`.
    #[must_use]
    pub fn new(settings: ServerSettings, pipeline: Arc<Pipeline>) -> Self {
        Self { settings, pipeline }
    }

    /// Creates a server from the application configuration.
    pub fn from_config(config: &StoaConfig, pipeline: Arc<Pipeline>) -> Result<Self, ServerError> {
        Ok(Self::new(ServerSettings::from_config(config)?, pipeline))
    }

    /// Returns the listener settings.
    #[must_use]
    pub const fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// Binds the configured address and serves until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = ShutdownSignal::with_os_signals();
        self.run_with_shutdown(shutdown).await
    }

    /// Binds the configured address and serves until `shutdown` triggers.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.settings.addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already bound listener.
    ///
    /// Once `shutdown` triggers, the listener is closed, open connections are
    /// asked to finish their current request, and the call returns when they
    /// have all closed or the shutdown timeout expires.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        tracing::info!(
            addr = %local_addr,
            stages = ?self.pipeline.stage_names(),
            "Server listening"
        );

        let service = Arc::new(RequestService {
            pipeline: self.pipeline,
            request_timeout: self.settings.request_timeout(),
            max_body_bytes: self.settings.max_body_bytes(),
        });
        let tracker = ConnectionTracker::new();

        let stopping = shutdown.recv();
        tokio::pin!(stopping);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        let guard = tracker.acquire();
                        let service = Arc::clone(&service);
                        let shutdown = shutdown.clone();

                        tokio::spawn(async move {
                            serve_connection(stream, remote_addr, service, shutdown).await;
                            drop(guard);
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                    }
                },
                () = &mut stopping => {
                    tracing::info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }
        drop(listener);

        let timeout = self.settings.shutdown_timeout();
        tracing::info!(
            active_connections = tracker.active_connections(),
            timeout_secs = timeout.as_secs(),
            "Waiting for connections to close"
        );

        if tokio::time::timeout(timeout, tracker.drained()).await.is_ok() {
            tracing::info!("All connections closed");
        } else {
            tracing::warn!(
                active_connections = tracker.active_connections(),
                "Shutdown timeout reached with connections still open"
            );
        }

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    service: Arc<RequestService>,
    shutdown: ShutdownSignal,
) {
    let svc = service_fn(move |req: Request<Incoming>| {
        let service = Arc::clone(&service);
        async move { Ok::<_, Infallible>(service.handle(req, remote_addr).await) }
    });

    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), svc);
    tokio::pin!(conn);

    let stopping = shutdown.recv();
    tokio::pin!(stopping);
    let mut draining = false;

    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(remote_addr = %remote_addr, error = %e, "Connection closed with error");
                }
                break;
            }
            () = &mut stopping, if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

/// Per-request work shared by every connection.
struct RequestService {
    pipeline: Arc<Pipeline>,
    request_timeout: Duration,
    max_body_bytes: usize,
}

impl RequestService {
    async fn handle(&self, req: Request<Incoming>, remote_addr: SocketAddr) -> Response {
        let (parts, body) = req.into_parts();
        let head = RequestHead::of(&parts);
        let declared = declared_length(&parts.headers);
        let raw = collect_body(body, declared, self.max_body_bytes, self.request_timeout).await;

        let ctx = RequestContext::from_parts(parts, raw, Some(remote_addr));
        let request_id = ctx.request_id();

        let pipeline = Arc::clone(&self.pipeline);
        let task = tokio::spawn(async move {
            let mut ctx = ctx;
            pipeline.process(&mut ctx).await
        });
        let _abort = AbortOnDrop(task.abort_handle());

        match task.await {
            Ok(response) => response,
            Err(e) => self.recover(head, request_id, remote_addr, &e),
        }
    }

    /// Answers a request whose pipeline task did not complete.
    fn recover(
        &self,
        head: RequestHead,
        request_id: RequestId,
        remote_addr: SocketAddr,
        error: &JoinError,
    ) -> Response {
        let what = if error.is_panic() { "panicked" } else { "was cancelled" };
        tracing::error!(request_id = %request_id, error = %error, "Request task {what}");

        let mut ctx = head.into_context(request_id, remote_addr);
        self.pipeline
            .recover(&mut ctx, &StoaError::unhandled(format!("request task {what}")))
    }
}

/// The parts of a request needed to answer it after its context is gone.
struct RequestHead {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
}

impl RequestHead {
    fn of(parts: &http::request::Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
        }
    }

    /// Rebuilds a bodiless context that keeps the original request id.
    fn into_context(self, request_id: RequestId, remote_addr: SocketAddr) -> RequestContext {
        let mut request = Request::new(());
        *request.method_mut() = self.method;
        *request.uri_mut() = self.uri;
        *request.headers_mut() = self.headers;
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            request.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        let (parts, ()) = request.into_parts();
        RequestContext::from_parts(parts, RawBody::empty(), Some(remote_addr))
    }
}

/// Aborts the pipeline task if the connection goes away first.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Collects a request body into a [`RawBody`].
///
/// A declared length above `limit` is rejected without reading.
pub(crate) async fn collect_body<B>(
    body: B,
    declared_len: Option<u64>,
    limit: usize,
    timeout: Duration,
) -> RawBody
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if declared_len.is_some_and(|len| len > limit as u64) {
        return RawBody::TooLarge { limit };
    }

    match tokio::time::timeout(timeout, Limited::new(body, limit).collect()).await {
        Ok(Ok(collected)) => RawBody::Bytes(collected.to_bytes()),
        Ok(Err(e)) if e.is::<LengthLimitError>() => RawBody::TooLarge { limit },
        Ok(Err(e)) => RawBody::Unreadable(e.to_string()),
        Err(_) => RawBody::Unreadable(format!(
            "request body not received within {} ms",
            timeout.as_millis()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Full;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// A body that never yields a frame.
    struct Stalled;

    impl Body for Stalled {
        type Data = Bytes;
        type Error = Infallible;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<hyper::body::Frame<Self::Data>, Self::Error>>> {
            Poll::Pending
        }
    }

    const SECOND: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_collects_body_within_limit() {
        let body = Full::new(Bytes::from_static(b"{\"a\":1}"));
        let raw = collect_body(body, Some(7), 16, SECOND).await;
        assert_eq!(raw.bytes().map(Bytes::as_ref), Some(&b"{\"a\":1}"[..]));
    }

    #[tokio::test]
    async fn test_declared_length_over_limit() {
        let body = Full::new(Bytes::from_static(b"small"));
        let raw = collect_body(body, Some(1_000), 16, SECOND).await;
        assert_eq!(raw, RawBody::TooLarge { limit: 16 });
    }

    #[tokio::test]
    async fn test_undeclared_body_over_limit() {
        let body = Full::new(Bytes::from(vec![b'x'; 64]));
        let raw = collect_body(body, None, 16, SECOND).await;
        assert_eq!(raw, RawBody::TooLarge { limit: 16 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_body_times_out() {
        let raw = collect_body(Stalled, None, 16, Duration::from_millis(50)).await;
        match raw {
            RawBody::Unreadable(reason) => assert!(reason.contains("50 ms")),
            other => panic!("expected Unreadable, got {other:?}"),
        }
    }

    #[test]
    fn test_declared_length_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(declared_length(&headers), None);
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("42"));
        assert_eq!(declared_length(&headers), Some(42));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("lots"));
        assert_eq!(declared_length(&headers), None);
    }

    #[tokio::test]
    async fn test_lost_task_is_answered_by_pipeline() {
        use stoa_middleware::identity::DisabledIdentityProvider;
        use stoa_router::RouteTable;

        let origin = "http://54.172.192.158";
        let service = RequestService {
            pipeline: Arc::new(Pipeline::standard(
                &StoaConfig::default(),
                Arc::new(RouteTable::new()),
                Arc::new(DisabledIdentityProvider),
            )),
            request_timeout: SECOND,
            max_body_bytes: 1024,
        };

        let (parts, ()) = Request::get("/api/items")
            .header("origin", origin)
            .body(())
            .unwrap()
            .into_parts();
        let error = tokio::spawn(async { panic!("stage exploded") }).await.unwrap_err();
        let request_id = RequestId::new();
        let remote: SocketAddr = "127.0.0.1:40000".parse().unwrap();

        let response = service.recover(RequestHead::of(&parts), request_id, remote, &error);

        assert_eq!(response.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(REQUEST_ID_HEADER).unwrap(),
            request_id.to_string().as_str()
        );
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            origin
        );

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["request_id"], request_id.to_string());
        assert!(!body.to_string().contains("stage exploded"));
    }
}
