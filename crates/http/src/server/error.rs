use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Why [`Server::listen`](crate::server::Server::listen) could not start a listener.
#[derive(Error, Debug)]
pub enum ListenError {
    #[error("address {addr} is already in use")]
    AddrInUse { addr: SocketAddr, source: io::Error },

    #[error("permission denied to listen on {addr}")]
    PermissionDenied { addr: SocketAddr, source: io::Error },

    #[error("invalid listen address: {address}")]
    InvalidAddress { address: String },

    #[error("can't listen on {addr}: {source}")]
    Io { addr: SocketAddr, source: io::Error },
}

impl ListenError {
    pub(crate) fn bind(addr: SocketAddr, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::AddrInUse => Self::AddrInUse { addr, source: e },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { addr, source: e },
            io::ErrorKind::AddrNotAvailable | io::ErrorKind::InvalidInput => Self::InvalidAddress { address: addr.to_string() },
            _ => Self::Io { addr, source: e },
        }
    }

    pub(crate) fn invalid_address<S: ToString>(address: S) -> Self {
        Self::InvalidAddress { address: address.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("handler must be set")]
    MissingHandler,

    #[error("invalid server config: {reason}")]
    InvalidConfig { reason: &'static str },

    #[error("can't build the runtime: {source}")]
    Runtime { source: io::Error },
}
