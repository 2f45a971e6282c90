//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum Router with a single dispatch handler
//! - Split traffic between WebSocket upgrades and plain HTTP exchanges
//! - Serve plaintext or TLS on an already-bound listener
//! - Stop gracefully on the shutdown signal

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::{
        rejection::{BytesRejection, FailedToBufferBody},
        ConnectInfo, DefaultBodyLimit, FromRequest, FromRequestParts, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::http::handler::HandlerSet;
use crate::http::request::RawHttpRequest;
use crate::http::websocket::serve_socket;
use crate::net::registry::ConnectionRegistry;
use crate::observability::metrics;

/// Largest HTTP body buffered before the handler runs.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// How long in-flight connections get to finish after shutdown is signalled.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// State shared by every connection served by one reactor.
#[derive(Debug)]
pub struct ReactorContext {
    pub registry: Arc<ConnectionRegistry>,
    pub handlers: HandlerSet,
}

/// HTTP + WebSocket server for the gateway.
pub struct HttpServer {
    router: Router,
    tls: Option<Arc<rustls::ServerConfig>>,
}

impl HttpServer {
    /// Create a server dispatching into the given context.
    pub fn new(ctx: Arc<ReactorContext>, tls: Option<Arc<rustls::ServerConfig>>) -> Self {
        Self {
            router: Self::build_router(ctx),
            tls,
        }
    }

    /// Every path goes through one handler; upgrades and plain requests share the port.
    fn build_router(ctx: Arc<ReactorContext>) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(ctx)
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .layer(TraceLayer::new_for_http())
    }

    /// Serve on the listener until `shutdown` fires or a fatal socket error occurs.
    pub async fn run(
        self,
        listener: std::net::TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let handle = Handle::new();
        let signal = handle.clone();
        tokio::spawn(async move {
            // A dropped sender means nobody can ask us to stop: keep serving.
            if shutdown.recv().await.is_ok() {
                tracing::info!("Shutdown signal received");
                signal.graceful_shutdown(Some(DRAIN_TIMEOUT));
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        match self.tls {
            Some(config) => {
                tracing::info!(address = %addr, "Serving wss/https");
                axum_server::from_tcp_rustls(listener, RustlsConfig::from_config(config))
                    .handle(handle)
                    .serve(app)
                    .await?;
            }
            None => {
                tracing::info!(address = %addr, "Serving ws/http");
                axum_server::from_tcp(listener).handle(handle).serve(app).await?;
            }
        }

        tracing::info!(address = %addr, "HTTP server stopped");
        Ok(())
    }
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}

/// Route one request: upgrade to a WebSocket or run one HTTP exchange.
async fn dispatch(
    State(ctx): State<Arc<ReactorContext>>,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let (mut parts, body) = request.into_parts();

    if is_websocket_upgrade(&parts.headers) {
        return match WebSocketUpgrade::from_request_parts(&mut parts, &ctx).await {
            Ok(upgrade) => upgrade
                .on_failed_upgrade(move |e| {
                    tracing::warn!(peer_addr = %peer_addr, error = %e, "WebSocket upgrade failed");
                })
                .on_upgrade(move |socket| serve_socket(socket, peer_addr, ctx))
                .into_response(),
            Err(rejection) => {
                tracing::warn!(peer_addr = %peer_addr, error = %rejection, "Rejected upgrade request");
                rejection.into_response()
            }
        };
    }

    let start_time = Instant::now();
    let request_id = Uuid::new_v4();
    let mut raw = RawHttpRequest::from_parts(&parts, Bytes::new());
    raw.body = match buffer_body(Request::from_parts(parts, body)).await {
        Ok(bytes) => bytes,
        Err(status) => {
            tracing::warn!(request_id = %request_id, status = status.as_u16(), "Request body rejected");
            metrics::record_http(status.as_u16(), start_time);
            return status.into_response();
        }
    };

    tracing::debug!(
        request_id = %request_id,
        method = %raw.method,
        uri = %raw.uri,
        "HTTP request"
    );

    // Handlers are synchronous and run on the reactor thread.
    let reply = ctx.handlers.respond(raw);
    metrics::record_http(reply.status_code, start_time);
    reply.into_response()
}

/// Buffer the whole body. Over the limit is 413; a body that fails mid-read
/// (peer reset, malformed chunking) is 400.
async fn buffer_body(request: Request<Body>) -> Result<Bytes, StatusCode> {
    match Bytes::from_request(request, &()).await {
        Ok(bytes) => Ok(bytes),
        Err(BytesRejection::FailedToBufferBody(FailedToBufferBody::LengthLimitError(_))) => {
            Err(StatusCode::PAYLOAD_TOO_LARGE)
        }
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Failed to read request body");
            Err(StatusCode::BAD_REQUEST)
        }
    }
}
