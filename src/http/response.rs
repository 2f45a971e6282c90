//! Response handling.
//!
//! # Responsibilities
//! - Define the structured response returned by handlers
//! - Parse the `{"code", "body"}` form returned by raw handlers
//! - Map handler output onto the wire, degrading invalid output to the default reply

use axum::body::{Body, Bytes};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// Structured response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status_code: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status_code: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status_code,
            body: body.into(),
        }
    }

    /// Reply used whenever no handler produced a usable response.
    pub fn default_reply() -> Self {
        Self::new(StatusCode::OK.as_u16(), Bytes::new())
    }

    /// Reply for a request whose query string could not be parsed.
    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST.as_u16(), Bytes::new())
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::default_reply()
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        let status = match StatusCode::from_u16(self.status_code) {
            Ok(status) => status,
            Err(_) => {
                tracing::warn!(status = self.status_code, "Handler returned invalid status code");
                return HttpResponse::default_reply().into_response();
            }
        };
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;
        response
    }
}

/// Wire form used by raw-string handlers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawHttpResponse {
    #[serde(default = "default_code")]
    pub code: u16,
    #[serde(default)]
    pub body: String,
}

fn default_code() -> u16 {
    StatusCode::OK.as_u16()
}

impl RawHttpResponse {
    /// Parse a raw handler result. Empty or non-JSON input yields `None`.
    pub fn parse(raw: &str) -> Option<HttpResponse> {
        if raw.trim().is_empty() {
            return None;
        }
        match serde_json::from_str::<RawHttpResponse>(raw) {
            Ok(parsed) => Some(HttpResponse::new(parsed.code, parsed.body)),
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable raw HTTP response");
                None
            }
        }
    }
}

impl From<&HttpResponse> for RawHttpResponse {
    fn from(resp: &HttpResponse) -> Self {
        Self {
            code: resp.status_code,
            body: String::from_utf8_lossy(&resp.body).into_owned(),
        }
    }
}
