//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! net / http / gateway
//!     → logging.rs (tracing events with connection_id, peer_addr, request_id)
//!     → metrics.rs (connection gauge, frame and HTTP counters, latency histogram)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint (when configured)
//! ```

pub mod logging;
pub mod metrics;
