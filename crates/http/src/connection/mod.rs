//! Per-connection lifecycle.
//!
//! A [`Connection`] owns one socket split into a read task and a write task:
//!
//! - the read task reads into a fixed buffer, feeds each read to the connection's
//!   [`RequestBuilder`](crate::codec::RequestBuilder) and hands every completed request
//!   to the [`Handler`](crate::handler::Handler) together with a [`Response`](crate::protocol::Response)
//!   wired to a [`ConnectionSink`]
//! - the write task drains the connection's queue in order, one write at a time
//!
//! Both tasks stop when the connection is disconnected, by the peer, by a transport error
//! or by [`Connection::disconnect`].

mod connection;
mod message_writer;
mod reader;
mod sink;

pub use connection::{Connection, ConnectionId};
pub use sink::ConnectionSink;
