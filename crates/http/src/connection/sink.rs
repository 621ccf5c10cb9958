use bytes::Bytes;
use tracing::debug;

use crate::connection::Connection;
use crate::protocol::{ResponseSink, SendError};

/// Sends a [`Response`](crate::protocol::Response) through a connection's write queue.
///
/// When the request did not ask for a persistent connection, the connection is closed
/// once the response ended and everything before it was written. It is closed as well
/// when the sink is dropped before the response ended.
#[derive(Debug)]
pub struct ConnectionSink {
    connection: Connection,
    keep_alive: bool,
    ended: bool,
}

impl ConnectionSink {
    pub fn new(connection: Connection, keep_alive: bool) -> Self {
        Self { connection, keep_alive, ended: false }
    }
}

impl ResponseSink for ConnectionSink {
    fn on_head(&mut self, head: Bytes) -> Result<(), SendError> {
        self.connection.write(head)
    }

    fn on_body(&mut self, body: Bytes) -> Result<(), SendError> {
        self.connection.write(body)
    }

    fn on_chunk(&mut self, chunk: Bytes) -> Result<(), SendError> {
        self.connection.write(chunk)
    }

    fn on_end(&mut self) -> Result<(), SendError> {
        self.ended = true;
        if !self.keep_alive {
            self.connection.close();
        }
        Ok(())
    }
}

impl Drop for ConnectionSink {
    fn drop(&mut self) {
        if !self.ended && !self.keep_alive {
            debug!(connection_id = %self.connection.id(), "response dropped before it ended, closing connection");
            self.connection.close();
        }
    }
}
