use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

use crate::ensure;
use crate::handler::Handler;
use crate::server::{Server, ServerBuildError};

/// Default size of the per-connection read buffer.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Worker threads of the runtime. `0` runs everything on the thread calling
    /// [`Server::run`] or [`Server::poll`].
    pub workers: usize,
    /// Bytes read from a socket at a time.
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { workers: 0, read_buffer_size: DEFAULT_READ_BUFFER_SIZE }
    }
}

impl ServerConfig {
    pub(crate) fn runtime(&self) -> Result<Runtime, ServerBuildError> {
        let mut builder = if self.workers == 0 {
            Builder::new_current_thread()
        } else {
            let mut builder = Builder::new_multi_thread();
            builder.worker_threads(self.workers);
            builder
        };

        builder.enable_all().thread_name("embed-http-worker").build().map_err(|e| ServerBuildError::Runtime { source: e })
    }
}

pub struct ServerBuilder {
    config: ServerConfig,
    handler: Option<Arc<dyn Handler>>,
}

impl ServerBuilder {
    pub(crate) fn new() -> Self {
        Self { config: ServerConfig::default(), handler: None }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn read_buffer_size(mut self, read_buffer_size: usize) -> Self {
        self.config.read_buffer_size = read_buffer_size;
        self
    }

    pub fn handler(mut self, handler: impl Handler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let handler = self.handler.ok_or(ServerBuildError::MissingHandler)?;
        ensure!(self.config.read_buffer_size > 0, ServerBuildError::InvalidConfig { reason: "read buffer size must not be zero" });

        let runtime = self.config.runtime()?;
        Ok(Server::new(runtime, handler, self.config))
    }
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder").field("config", &self.config).field("has_handler", &self.handler.is_some()).finish()
    }
}
