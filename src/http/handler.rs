//! User callbacks and the dispatch policy applied to them.
//!
//! Callbacks run on the reactor thread. A slow callback stalls every
//! connection, so handlers must return promptly.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use axum::body::Bytes;

use crate::http::request::{translate, RawHttpRequest, TranslateError};
use crate::http::response::{HttpResponse, RawHttpResponse};
use crate::net::connection::ConnectionId;

/// Called for every inbound WebSocket frame.
pub type MessageHandler = Arc<dyn Fn(ConnectionId, Bytes) + Send + Sync>;

/// Called with the JSON-serialized request; returns `{"code", "body"}` JSON.
pub type RawHttpHandler = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Called with the structured request; `None` means "no response".
pub type HttpHandler = Arc<dyn Fn(&crate::http::HttpRequest) -> Option<HttpResponse> + Send + Sync>;

/// The callbacks frozen at `connect` time.
#[derive(Clone, Default)]
pub struct HandlerSet {
    pub message: Option<MessageHandler>,
    pub raw_http: Option<RawHttpHandler>,
    pub http: Option<HttpHandler>,
}

impl std::fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerSet")
            .field("message", &self.message.is_some())
            .field("raw_http", &self.raw_http.is_some())
            .field("http", &self.http.is_some())
            .finish()
    }
}

impl HandlerSet {
    /// Hand an inbound frame to the message handler. Returns whether it was delivered.
    pub fn deliver(&self, id: ConnectionId, payload: Bytes) -> bool {
        let Some(handler) = self.message.as_ref() else {
            tracing::debug!(connection_id = %id, len = payload.len(), "No message handler, frame dropped");
            return false;
        };
        match catch_unwind(AssertUnwindSafe(|| handler(id, payload))) {
            Ok(()) => true,
            Err(_) => {
                tracing::error!(connection_id = %id, "Message handler panicked, frame dropped");
                false
            }
        }
    }

    /// Produce the reply for one HTTP exchange.
    ///
    /// The structured handler wins when both are registered. Any handler
    /// failure degrades to [`HttpResponse::default_reply`].
    pub fn respond(&self, raw: RawHttpRequest) -> HttpResponse {
        if let Some(handler) = self.http.as_ref() {
            let request = match translate(raw) {
                Ok(request) => request,
                Err(TranslateError::MalformedQuery(pair)) => {
                    tracing::warn!(pair = %pair, "Rejecting request with malformed query");
                    return HttpResponse::bad_request();
                }
            };
            return match catch_unwind(AssertUnwindSafe(|| handler(&request))) {
                Ok(Some(response)) => response,
                Ok(None) => {
                    tracing::debug!(uri = %request.uri, "HTTP handler returned no response");
                    HttpResponse::default_reply()
                }
                Err(_) => {
                    tracing::error!(uri = %request.uri, "HTTP handler panicked");
                    HttpResponse::default_reply()
                }
            };
        }

        if let Some(handler) = self.raw_http.as_ref() {
            let request = raw.to_json();
            return match catch_unwind(AssertUnwindSafe(|| handler(&request))) {
                Ok(reply) => RawHttpResponse::parse(&reply).unwrap_or_else(HttpResponse::default_reply),
                Err(_) => {
                    tracing::error!(uri = %raw.uri, "Raw HTTP handler panicked");
                    HttpResponse::default_reply()
                }
            };
        }

        tracing::debug!(method = %raw.method, uri = %raw.uri, "No HTTP handler registered");
        HttpResponse::default_reply()
    }
}
