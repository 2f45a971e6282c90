//! HTTP and WebSocket protocol handling.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, upgrade detection)
//!     ├─ websocket.rs (frames ⇄ message handler / outbound queue)
//!     └─ request.rs (raw request → HttpRequest)
//!         → handler.rs (structured or raw callback, default reply)
//!         → response.rs (HttpResponse → wire)
//! ```

pub mod handler;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use handler::{HandlerSet, HttpHandler, MessageHandler, RawHttpHandler};
pub use request::{parse_resource, translate, HttpRequest, RawHttpRequest, TranslateError};
pub use response::{HttpResponse, RawHttpResponse};
pub use server::HttpServer;
