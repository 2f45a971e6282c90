//! WebSocket connection handling.
//!
//! # Data Flow
//! ```text
//! Client ──frames──▶ reader ──▶ HandlerSet::deliver(id, payload)
//! Client ◀──binary── writer ◀── outbound queue ◀── Gateway::send(id, data)
//! ```
//!
//! # Design Decisions
//! - Reader and writer run in the same task, so frames of one connection are handled in wire order
//! - The `ConnectionGuard` lives for the whole task; its drop is the only unregistration path
//! - Ping/pong is answered by the WebSocket layer, close frames end the connection
//! - Every connection ends with a flushed close handshake before it is unregistered

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};

use crate::http::server::ReactorContext;
use crate::net::connection::ConnectionGuard;
use crate::observability::metrics;

/// Upper bound on flushing the closing handshake once a connection ends.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Drive one upgraded socket until either side closes it.
pub(crate) async fn serve_socket(socket: WebSocket, peer_addr: SocketAddr, ctx: Arc<ReactorContext>) {
    let (mut guard, mut outbound) = ConnectionGuard::accept(ctx.registry.clone());
    let id = guard.id();
    if let Err(e) = guard.open() {
        tracing::error!(connection_id = %id, error = %e, "Failed to register connection");
        return;
    }
    tracing::debug!(connection_id = %id, peer_addr = %peer_addr, "WebSocket upgraded");

    let (mut sink, mut stream) = socket.split();

    let writer = async {
        while let Some(frame) = outbound.recv().await {
            if let Err(e) = sink.send(Message::Binary(frame)).await {
                tracing::warn!(connection_id = %id, error = %e, "Write failed");
                break;
            }
        }
    };

    let reader = async {
        while let Some(result) = stream.next().await {
            let payload: Bytes = match result {
                Ok(Message::Binary(data)) => data,
                Ok(Message::Text(text)) => Bytes::from(text.as_str().to_owned()),
                Ok(Message::Close(frame)) => {
                    tracing::debug!(connection_id = %id, frame = ?frame, "Peer closed");
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Err(e) => {
                    tracing::warn!(connection_id = %id, error = %e, "Read failed");
                    break;
                }
            };
            metrics::record_frame("inbound");
            ctx.handlers.deliver(id, payload);
        }
    };

    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }

    // Flushes the queued reply to a peer's Close frame, or starts the handshake ourselves.
    match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(connection_id = %id, error = %e, "Close handshake failed"),
        Err(_) => tracing::debug!(connection_id = %id, "Close handshake timed out"),
    }

    guard.close();
}
