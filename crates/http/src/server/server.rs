use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::connection::ConnectionId;
use crate::handler::Handler;
use crate::server::acceptor::accept_loop;
use crate::server::{ListenError, ServerBuilder, ServerConfig, ServerBuildError};

/// An HTTP/1.1 server owning its own event loop.
///
/// Listeners are added with [`listen`](Server::listen) before or while the loop runs. The
/// loop is driven either by [`run`](Server::run), which blocks until the server is stopped,
/// or step by step with [`poll`](Server::poll) from a host that owns its own loop.
pub struct Server {
    runtime: Runtime,
    context: Arc<ServerContext>,
}

pub(crate) struct ServerContext {
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) config: ServerConfig,
    pub(crate) shutdown: CancellationToken,
    next_id: AtomicU64,
}

impl ServerContext {
    pub(crate) fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// A server with the default config.
    pub fn with_handler(handler: impl Handler) -> Result<Self, ServerBuildError> {
        Self::builder().handler(handler).build()
    }

    pub(crate) fn new(runtime: Runtime, handler: Arc<dyn Handler>, config: ServerConfig) -> Self {
        let context = ServerContext {
            handler,
            config,
            shutdown: CancellationToken::new(),
            next_id: AtomicU64::new(1),
        };
        Self { runtime, context: Arc::new(context) }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Starts accepting connections on `addr` and returns the bound address, which tells
    /// the actual port when `addr` asked for port `0`.
    pub fn listen(&self, addr: SocketAddr) -> Result<SocketAddr, ListenError> {
        let listener = std::net::TcpListener::bind(addr).map_err(|e| {
            error!(%addr, cause = %e, "bind server error");
            ListenError::bind(addr, e)
        })?;
        let io = |source| ListenError::Io { addr, source };
        listener.set_nonblocking(true).map_err(io)?;
        let local_addr = listener.local_addr().map_err(io)?;

        let listener = {
            let _guard = self.runtime.enter();
            TcpListener::from_std(listener).map_err(io)?
        };
        self.runtime.spawn(accept_loop(listener, Arc::clone(&self.context)));

        info!(addr = %local_addr, "start listening");
        Ok(local_addr)
    }

    /// Listens on `address`, an IP address or a host name, and `port`.
    pub fn listen_on(&self, address: &str, port: u16) -> Result<SocketAddr, ListenError> {
        let addr = match address.parse::<IpAddr>() {
            Ok(ip) => SocketAddr::new(ip, port),
            Err(_) => (address, port)
                .to_socket_addrs()
                .ok()
                .and_then(|mut addrs| addrs.next())
                .ok_or_else(|| ListenError::invalid_address(format!("{address}:{port}")))?,
        };
        self.listen(addr)
    }

    /// Listens on `port` on every IPv4 interface.
    pub fn listen_port(&self, port: u16) -> Result<SocketAddr, ListenError> {
        self.listen(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))
    }

    /// Drives the server until [`stop`](Server::stop) is called or the process receives
    /// `SIGINT` or `SIGTERM`.
    pub fn run(&self) {
        let shutdown = self.context.shutdown.clone();
        if shutdown.is_cancelled() {
            return;
        }

        info!(workers = self.context.config.workers, "server running");
        self.runtime.block_on(async {
            select! {
                () = shutdown.cancelled() => {}
                () = shutdown_signal() => {
                    info!("received shutdown signal");
                    shutdown.cancel();
                }
            }
        });
        info!("server stopped");
    }

    /// Advances whatever work is ready once and returns without waiting.
    ///
    /// With zero workers this is the only place connections make progress outside of
    /// [`run`](Server::run); with workers it merely yields to them.
    pub fn poll(&self) {
        self.runtime.block_on(tokio::task::yield_now());
    }

    /// Stops accepting and makes [`run`](Server::run) return.
    ///
    /// Connections already accepted keep being served while the runtime is driven, and are
    /// disconnected when the server is dropped.
    pub fn stop(&self) {
        self.context.shutdown.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.context.shutdown.is_cancelled()
    }

    /// A handle that stops the server from any thread.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle { shutdown: self.context.shutdown.clone() }
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.context.config)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct ServerHandle {
    shutdown: CancellationToken,
}

impl ServerHandle {
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(cause = %e, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(cause = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
