//! Gateway facade: the contract consumed by the host.
//!
//! # Data Flow
//! ```text
//! set_option / register_*   (any thread, before connect)
//!     → connect             (TLS + bind on the caller's thread, then spawn reactor)
//!     → reactor             (accept, frames, HTTP exchanges → handlers)
//! send(id, data)            (any thread, enqueue only)
//! ```
//!
//! # Design Decisions
//! - Options and handlers are frozen at `connect`; later writes are rejected
//! - `send` never touches the socket; it enqueues onto the connection's writer
//! - Handlers run on the reactor thread and must return promptly

pub mod error;
pub mod options;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::JoinHandle;

use axum::body::Bytes;

use crate::http::handler::{HandlerSet, HttpHandler, MessageHandler, RawHttpHandler};
use crate::http::server::ReactorContext;
use crate::http::{HttpRequest, HttpResponse};
use crate::lifecycle::Shutdown;
use crate::net::reactor::{EventLoop, StateCell};
use crate::net::{listener, tls, ConnectionId, ConnectionRegistry, RegistryError, ServerState};
use crate::observability::metrics;

pub use error::GatewayError;
pub use options::{NetOption, OptionsBuilder, ServerOptions};

/// Cloneable handle to one gateway instance.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<Inner>,
}

struct Inner {
    setup: Mutex<Setup>,
    registry: Arc<ConnectionRegistry>,
    state: Arc<StateCell>,
    shutdown: Shutdown,
    local_addr: OnceLock<SocketAddr>,
}

#[derive(Default)]
struct Setup {
    options: OptionsBuilder,
    handlers: HandlerSet,
    started: bool,
    reactor: Option<JoinHandle<()>>,
}

impl Inner {
    // Poisoning only means another caller panicked mid-setup; the data is still consistent.
    fn setup(&self) -> MutexGuard<'_, Setup> {
        self.setup.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Gateway {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                setup: Mutex::new(Setup::default()),
                registry: Arc::new(ConnectionRegistry::new()),
                state: Arc::new(StateCell::new(ServerState::Unconfigured)),
                shutdown: Shutdown::new(),
                local_addr: OnceLock::new(),
            }),
        }
    }

    /// Set one option. Each option may be written once, before `connect`.
    pub fn set_option(&self, opt: NetOption, value: &str) -> Result<(), GatewayError> {
        let mut setup = self.inner.setup();
        if setup.started {
            return Err(GatewayError::AlreadyStarted);
        }
        setup.options.set(opt, value)?;
        if self.inner.state.get() == ServerState::Unconfigured {
            self.inner.state.set(ServerState::Configured);
        }
        tracing::debug!(option = %opt, value = %value, "Option set");
        Ok(())
    }

    /// Set an option by its configuration key (`server_port`, `server_ca`, ...).
    pub fn set_option_by_key(&self, key: &str, value: &str) -> Result<(), GatewayError> {
        let opt = NetOption::from_key(key).inspect_err(|e| tracing::error!(error = %e, "Rejected option"))?;
        self.set_option(opt, value)
    }

    /// Register the callback for inbound WebSocket frames.
    pub fn register_message_handler<F>(&self, handler: F) -> Result<(), GatewayError>
    where
        F: Fn(ConnectionId, Bytes) + Send + Sync + 'static,
    {
        let handler: MessageHandler = Arc::new(handler);
        self.register("message", |handlers| set_once(&mut handlers.message, handler, "message"))
    }

    /// Register a handler that receives the request as JSON and returns
    /// `{"code", "body"}` JSON. Ignored when a structured handler is also set.
    pub fn register_raw_http_handler<F>(&self, handler: F) -> Result<(), GatewayError>
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        let handler: RawHttpHandler = Arc::new(handler);
        self.register("raw http", |handlers| set_once(&mut handlers.raw_http, handler, "raw http"))
    }

    /// Register the structured HTTP handler.
    pub fn register_http_handler<F>(&self, handler: F) -> Result<(), GatewayError>
    where
        F: Fn(&HttpRequest) -> Option<HttpResponse> + Send + Sync + 'static,
    {
        let handler: HttpHandler = Arc::new(handler);
        self.register("http", |handlers| set_once(&mut handlers.http, handler, "http"))
    }

    fn register(
        &self,
        kind: &'static str,
        apply: impl FnOnce(&mut HandlerSet) -> Result<(), GatewayError>,
    ) -> Result<(), GatewayError> {
        let mut setup = self.inner.setup();
        if setup.started {
            return Err(GatewayError::AlreadyStarted);
        }
        apply(&mut setup.handlers)?;
        tracing::debug!(handler = kind, "Handler registered");
        Ok(())
    }

    /// Build TLS (if configured), bind, and start the reactor thread.
    ///
    /// Returns the bound address once the socket is listening; never waits
    /// for connections.
    pub fn connect(&self) -> Result<SocketAddr, GatewayError> {
        let mut setup = self.inner.setup();
        if setup.started {
            return Err(GatewayError::AlreadyStarted);
        }
        if self.inner.shutdown.is_triggered() {
            return Err(GatewayError::Stopped);
        }

        let options = setup.options.build()?;
        let tls = match options.tls_paths()? {
            Some((cert, key)) => Some(tls::build_server_config(cert, key, options.tls_profile)?),
            None => None,
        };
        let secure = tls.is_some();
        let (listener, local_addr) = listener::bind(options.listen_port)?;

        let ctx = Arc::new(ReactorContext {
            registry: self.inner.registry.clone(),
            handlers: setup.handlers.clone(),
        });
        let event_loop = EventLoop {
            listener,
            tls,
            ctx,
            shutdown: self.inner.shutdown.subscribe(),
            state: self.inner.state.clone(),
        };

        let previous = self.inner.state.get();
        // Set before spawning so a reactor that dies immediately is not overwritten.
        self.inner.state.set(ServerState::Listening);
        let reactor = event_loop.spawn().map_err(|e| {
            self.inner.state.set(previous);
            GatewayError::Spawn(e)
        })?;

        setup.started = true;
        setup.reactor = Some(reactor);
        let _ = self.inner.local_addr.set(local_addr);
        tracing::info!(
            address = %local_addr,
            tls = secure,
            "Gateway listening"
        );
        Ok(local_addr)
    }

    /// Enqueue `data` as a binary frame for connection `id`.
    ///
    /// Fails without side effects when the connection is unknown or closed.
    pub fn send(&self, id: ConnectionId, data: impl Into<Bytes>) -> Result<(), GatewayError> {
        let failed = |reason: RegistryError| {
            metrics::record_send_failure();
            tracing::warn!(connection_id = %id, reason = %reason, "Send failed");
            GatewayError::SendFailed { id, reason }
        };
        let sender = self.inner.registry.resolve(id).map_err(|reason| failed(reason))?;
        sender
            .send(data.into())
            .map_err(|_| failed(RegistryError::ConnectionClosed(id)))?;
        metrics::record_frame("outbound");
        Ok(())
    }

    /// Stop the reactor and wait for it to drain. Returns `false` if the
    /// gateway was already shut down.
    pub fn shutdown(&self) -> bool {
        if !self.inner.shutdown.trigger() {
            return false;
        }
        let reactor = self.inner.setup().reactor.take();
        match reactor {
            // Joining from a handler would join the reactor thread on itself.
            Some(handle) if handle.thread().id() != std::thread::current().id() => {
                if handle.join().is_err() {
                    tracing::error!("Reactor thread panicked");
                }
            }
            Some(_) => {}
            None => self.inner.state.set(ServerState::Stopped),
        }
        true
    }

    pub fn state(&self) -> ServerState {
        self.inner.state.get()
    }

    /// Bound address, once `connect` succeeded.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr.get().copied()
    }

    /// Number of currently open connections.
    pub fn connection_count(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.inner.registry.contains(id)
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("state", &self.state())
            .field("local_addr", &self.local_addr())
            .field("connections", &self.connection_count())
            .finish()
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, kind: &'static str) -> Result<(), GatewayError> {
    if slot.is_some() {
        return Err(GatewayError::HandlerAlreadyRegistered(kind));
    }
    *slot = Some(value);
    Ok(())
}
