use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use http::Extensions;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::connection::message_writer::{Outbound, write_loop};
use crate::connection::reader::read_loop;
use crate::connection::ConnectionSink;
use crate::handler::Handler;
use crate::protocol::SendError;

/// Identifies a connection within the server that accepted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A handle to one client connection.
///
/// Handles are cheap to clone and all refer to the same connection. The read task and the
/// write task each hold one from [`run`](Connection::run) until the connection is
/// disconnected, so the connection lives at least that long, and is freed once the
/// application drops its own handles too.
///
/// Writes go through an ordered queue drained by a single write task: bytes reach the
/// peer in the order [`write`](Connection::write) was called, one write at a time.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    id: ConnectionId,
    peer_addr: Option<SocketAddr>,
    handler: Arc<dyn Handler>,
    read_buffer_size: usize,

    sender: mpsc::UnboundedSender<Outbound>,
    /// Taken by the write task when the connection starts.
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Outbound>>>,
    queued: AtomicUsize,

    cancel: CancellationToken,
    connected: AtomicBool,
    disconnected: AtomicBool,

    extensions: Mutex<Extensions>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("peer_addr", &self.inner.peer_addr)
            .field("queued_writes", &self.queued_writes())
            .field("disconnected", &self.is_disconnected())
            .finish_non_exhaustive()
    }
}

impl Connection {
    pub fn new(id: ConnectionId, peer_addr: Option<SocketAddr>, handler: Arc<dyn Handler>, read_buffer_size: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                id,
                peer_addr,
                handler,
                read_buffer_size: read_buffer_size.max(1),
                sender,
                receiver: Mutex::new(Some(receiver)),
                queued: AtomicUsize::new(0),
                cancel: CancellationToken::new(),
                connected: AtomicBool::new(false),
                disconnected: AtomicBool::new(false),
                extensions: Mutex::new(Extensions::new()),
            }),
        }
    }

    /// Serves the connection over `io` until it is disconnected.
    ///
    /// Spawns the write task, notifies [`Handler::on_connected`] and then reads requests on
    /// the current task. Must be called within a tokio runtime. Dropping the returned
    /// future, for example when the runtime shuts down, disconnects the connection.
    pub async fn run<IO>(self, io: IO)
    where
        IO: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(io);
        if !self.connected(writer) {
            return;
        }
        let _guard = DisconnectOnDrop(&self);
        read_loop(&self, reader).await;
    }

    /// Starts the write task; returns `false` when the connection was already started or
    /// disconnected.
    fn connected<W>(&self, writer: W) -> bool
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        if self.is_disconnected() || self.inner.connected.swap(true, Ordering::AcqRel) {
            warn!(connection_id = %self.id(), "connection started twice or after disconnect");
            return false;
        }

        let Some(receiver) = self.inner.receiver.lock().unwrap_or_else(PoisonError::into_inner).take() else {
            return false;
        };

        tokio::spawn(write_loop(self.clone(), writer, receiver));

        info!(connection_id = %self.id(), peer = ?self.peer_addr(), "connection established");
        self.inner.handler.on_connected(self);
        true
    }

    #[inline]
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    #[inline]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer_addr
    }

    /// Queues `data` behind every earlier write.
    ///
    /// # Errors
    ///
    /// [`SendError::ConnectionClosed`] once the connection is disconnected.
    pub fn write(&self, data: impl Into<Bytes>) -> Result<(), SendError> {
        if self.is_disconnected() {
            return Err(SendError::ConnectionClosed);
        }

        self.inner.queued.fetch_add(1, Ordering::AcqRel);
        self.inner.sender.send(Outbound::Data(data.into())).map_err(|_| {
            self.inner.queued.fetch_sub(1, Ordering::AcqRel);
            SendError::ConnectionClosed
        })
    }

    /// Disconnects once every write queued so far has reached the socket.
    pub fn close(&self) {
        if !self.is_disconnected() {
            // a failed send means the write task is gone and the connection with it
            let _ = self.inner.sender.send(Outbound::Close);
        }
    }

    /// Stops reading and writing right away and shuts the socket down.
    ///
    /// Queued writes that did not start yet are dropped. Only the first call has an
    /// effect; it notifies [`Handler::on_disconnected`].
    pub fn disconnect(&self) {
        if self.inner.disconnected.swap(true, Ordering::AcqRel) {
            return;
        }

        self.inner.cancel.cancel();
        info!(connection_id = %self.id(), peer = ?self.peer_addr(), "connection closed");
        self.inner.handler.on_disconnected(self);
    }

    pub fn is_disconnected(&self) -> bool {
        self.inner.disconnected.load(Ordering::Acquire)
    }

    /// Writes queued but not yet written to the socket.
    pub fn queued_writes(&self) -> usize {
        self.inner.queued.load(Ordering::Acquire)
    }

    /// A response sink writing into this connection; it closes the connection after the
    /// response unless `keep_alive`.
    pub fn sink(&self, keep_alive: bool) -> ConnectionSink {
        ConnectionSink::new(self.clone(), keep_alive)
    }

    /// The typed per-connection slot for application data.
    pub fn extensions(&self) -> MutexGuard<'_, Extensions> {
        self.inner.extensions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_extension<T: Clone + Send + Sync + 'static>(&self, value: T) -> Option<T> {
        self.extensions().insert(value)
    }

    pub fn extension<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.extensions().get::<T>().cloned()
    }

    pub(crate) fn handler(&self) -> &dyn Handler {
        self.inner.handler.as_ref()
    }

    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    pub(crate) fn read_buffer_size(&self) -> usize {
        self.inner.read_buffer_size
    }

    pub(crate) fn written(&self) {
        self.inner.queued.fetch_sub(1, Ordering::AcqRel);
    }
}

struct DisconnectOnDrop<'a>(&'a Connection);

impl Drop for DisconnectOnDrop<'_> {
    fn drop(&mut self) {
        self.0.disconnect();
    }
}
