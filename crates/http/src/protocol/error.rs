use std::io;
use thiserror::Error;

use crate::protocol::Phase;

/// Everything the engine reports through [`Handler::on_error`](crate::handler::Handler::on_error).
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },

    #[error("read error: {source}")]
    ReadError { source: io::Error },

    #[error("accept error: {source}")]
    AcceptError { source: io::Error },
}

impl HttpError {
    pub fn read(e: io::Error) -> Self {
        Self::ReadError { source: e }
    }

    pub fn accept(e: io::Error) -> Self {
        Self::AcceptError { source: e }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid transfer-encoding header: {reason}")]
    InvalidTransferEncoding { reason: String },

    #[error("invalid chunk: {reason}")]
    InvalidChunk { reason: &'static str },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("{unconsumed} bytes left unparsed without a complete message")]
    TrailingBytes { unconsumed: usize },

    #[error("stream ended before the message was complete")]
    Truncated,

    #[error("parser stopped by a previous error")]
    Stopped,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn invalid_transfer_encoding<S: ToString>(str: S) -> Self {
        Self::InvalidTransferEncoding { reason: str.to_string() }
    }

    pub fn invalid_chunk(reason: &'static str) -> Self {
        Self::InvalidChunk { reason }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("connection already closed")]
    ConnectionClosed,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// Caller-side contract violations of [`Response`](crate::protocol::Response) and
/// [`Chunk`](crate::protocol::Chunk), plus failures of the sink they emit into.
#[derive(Error, Debug)]
pub enum ResponseError {
    #[error("`{operation}` is not allowed while the response is {phase:?}")]
    InvalidPhase { operation: &'static str, phase: Phase },

    #[error("`{operation}` is not allowed after the response head was sent")]
    HeadersCommitted { operation: &'static str },

    #[error("`{operation}` needs a response sink, but none is wired")]
    MissingSink { operation: &'static str },

    #[error("invalid status code {0}")]
    InvalidStatus(u16),

    #[error("invalid response header: {reason}")]
    InvalidHeader { reason: String },

    #[error("send error: {source}")]
    Send {
        #[from]
        source: SendError,
    },
}

impl ResponseError {
    pub fn invalid_phase(operation: &'static str, phase: Phase) -> Self {
        Self::InvalidPhase { operation, phase }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }
}

/// A read that ended because the peer closed its side, not a transport failure.
pub(crate) fn is_end_of_stream(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::UnexpectedEof
}
