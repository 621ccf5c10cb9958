//! The listening side: a tokio runtime, its TCP listeners and the connections they accept.

mod acceptor;
mod config;
mod error;
mod server;

pub use config::{DEFAULT_READ_BUFFER_SIZE, ServerBuilder, ServerConfig};
pub use error::{ListenError, ServerBuildError};
pub use server::{Server, ServerHandle};
