//! Request translation.
//!
//! # Responsibilities
//! - Capture the raw request (method, URI, headers, body) from the wire
//! - Decompose the URI into path and ordered query parameters
//! - Serialize the raw request for string-based handlers
//!
//! # Design Decisions
//! - Headers and parameters are ordered pairs, duplicates allowed
//! - A malformed query rejects the whole request, never a partial parse

use axum::body::Bytes;
use axum::http::request::Parts;
use thiserror::Error;

/// Translation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("malformed query parameter '{0}'")]
    MalformedQuery(String),
}

/// Request as read off the wire, before URI decomposition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawHttpRequest {
    pub uri: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl RawHttpRequest {
    /// Capture request parts and a buffered body.
    pub fn from_parts(parts: &Parts, body: Bytes) -> Self {
        let uri = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.to_string());
        let headers = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        Self {
            uri,
            method: parts.method.as_str().to_string(),
            headers,
            body,
        }
    }

    /// String form handed to raw handlers:
    /// `{"uri": .., "method": .., "header": {..}, "body": ..}`.
    ///
    /// Duplicate header names collapse to the last value in this form.
    pub fn to_json(&self) -> String {
        let header: serde_json::Map<String, serde_json::Value> = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        serde_json::json!({
            "uri": self.uri,
            "method": self.method,
            "header": header,
            "body": String::from_utf8_lossy(&self.body),
        })
        .to_string()
    }
}

/// Structured request handed to structured handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    pub uri: String,
    pub method: String,
    pub path: String,
    pub query_params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpRequest {
    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// First query parameter with the given key.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Build a structured request from a raw one.
pub fn translate(raw: RawHttpRequest) -> Result<HttpRequest, TranslateError> {
    let (path, query_params) = parse_resource(&raw.uri)?;
    Ok(HttpRequest {
        path,
        query_params,
        uri: raw.uri,
        method: raw.method,
        headers: raw.headers,
        body: raw.body,
    })
}

/// Split a request target into path and query parameters.
///
/// Every `&`-separated pair must be `key=value` with both sides non-empty.
/// An empty query string and a single trailing `&` yield no extra params.
pub fn parse_resource(uri: &str) -> Result<(String, Vec<(String, String)>), TranslateError> {
    let Some((path, query)) = uri.split_once('?') else {
        return Ok((uri.to_string(), Vec::new()));
    };

    let query = query.strip_suffix('&').unwrap_or(query);
    if query.is_empty() {
        return Ok((path.to_string(), Vec::new()));
    }

    let params = query
        .split('&')
        .map(|pair| {
            let mut parts = pair.split('=');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(k), Some(v), None) if !k.is_empty() && !v.is_empty() => {
                    Ok((k.to_string(), v.to_string()))
                }
                _ => {
                    tracing::warn!(pair = %pair, "Malformed query parameter");
                    Err(TranslateError::MalformedQuery(pair.to_string()))
                }
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((path.to_string(), params))
}
