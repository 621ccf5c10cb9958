//! The callbacks through which the engine hands connections and requests to the
//! application.
//!
//! Every callback runs on the connection's task, so it should return quickly; long work
//! can move the [`Response`] into a spawned task and end it from there.

use std::sync::Arc;

use crate::connection::Connection;
use crate::protocol::{HttpError, Request, Response, ResponseError};

pub trait Handler: Send + Sync + 'static {
    fn on_connected(&self, _connection: &Connection) {}

    /// A complete request arrived. `response` is wired to `connection`: whatever is
    /// written to it is queued on the connection in order.
    fn on_request(&self, connection: &Connection, request: Arc<Request>, response: Response) -> Result<(), ResponseError>;

    /// Raw bytes received after the connection switched protocols.
    fn on_data(&self, _connection: &Connection, _data: &[u8]) {}

    /// Called exactly once per connection, after it stopped reading and writing.
    fn on_disconnected(&self, _connection: &Connection) {}

    /// A transport or protocol failure. `connection` is `None` for failures of the
    /// listener itself.
    fn on_error(&self, _connection: Option<&Connection>, _error: &HttpError) {}
}

/// A [`Handler`] that only answers requests, built by [`make_handler`].
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&Connection, Arc<Request>, Response) -> Result<(), ResponseError> + Send + Sync + 'static,
{
    fn on_request(&self, connection: &Connection, request: Arc<Request>, response: Response) -> Result<(), ResponseError> {
        (self.f)(connection, request, response)
    }
}

pub fn make_handler<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&Connection, Arc<Request>, Response) -> Result<(), ResponseError> + Send + Sync + 'static,
{
    HandlerFn { f }
}
