//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → set options → bus endpoints → bridge handlers → connect (bind, spawn reactor)
//!
//! Shutdown (shutdown.rs):
//!     Gateway::shutdown → broadcast → reactor drains connections → thread exits
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → binary calls Gateway::shutdown
//! ```
//!
//! # Design Decisions
//! - Without an explicit shutdown the reactor runs until the process exits
//! - Draining has a deadline; remaining connections are dropped after it

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{start, Running};
