//! The reactor thread.
//!
//! One dedicated OS thread runs a current-thread Tokio runtime that owns the
//! listening socket and every connection. Callers of `connect` and `send`
//! never run on it.

use std::net::TcpListener;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::broadcast;

use crate::http::server::{HttpServer, ReactorContext};

/// Server-level lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerState {
    Unconfigured = 0,
    Configured = 1,
    Listening = 2,
    Stopped = 3,
}

impl ServerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ServerState::Unconfigured,
            1 => ServerState::Configured,
            2 => ServerState::Listening,
            _ => ServerState::Stopped,
        }
    }
}

/// Lock-free cell holding a [`ServerState`], shared with the reactor thread.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: ServerState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn get(&self) -> ServerState {
        ServerState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ServerState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Everything the reactor needs, assembled by `connect`.
pub struct EventLoop {
    pub listener: TcpListener,
    pub tls: Option<Arc<rustls::ServerConfig>>,
    pub ctx: Arc<ReactorContext>,
    pub shutdown: broadcast::Receiver<()>,
    pub state: Arc<StateCell>,
}

impl EventLoop {
    /// Start the reactor on its own thread. Returns once the thread exists.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("gateway-reactor".to_string())
            .spawn(move || self.run())
    }

    fn run(self) {
        let state = self.state.clone();
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build reactor runtime");
                state.set(ServerState::Stopped);
                return;
            }
        };

        let server = HttpServer::new(self.ctx, self.tls);
        if let Err(e) = runtime.block_on(server.run(self.listener, self.shutdown)) {
            tracing::error!(error = %e, "Reactor stopped on socket error");
        }
        // Cancels the remaining connection tasks, which unregisters them.
        drop(runtime);
        state.set(ServerState::Stopped);
        tracing::info!("Gateway reactor exited");
    }
}
