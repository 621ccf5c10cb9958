use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::select;
use tracing::{debug, info, trace, warn};

use crate::codec::{Feed, RequestBuilder};
use crate::connection::Connection;
use crate::protocol::{HttpError, ParseError, Request, Response, ResponseError, is_end_of_stream};

const CONTINUE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// Whether the read loop keeps reading after the bytes it just processed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Reads from `reader` into a fixed buffer, one read at a time, and feeds every read to
/// the connection's request builder before reading again.
///
/// Returns once the connection is disconnected.
pub(crate) async fn read_loop<R>(connection: &Connection, mut reader: R)
where
    R: AsyncRead + Unpin,
{
    let cancel = connection.cancellation().clone();
    let mut builder = RequestBuilder::new();
    let mut buf = BytesMut::zeroed(connection.read_buffer_size());

    loop {
        let read = select! {
            biased;
            () = cancel.cancelled() => break,
            read = reader.read(&mut buf[..]) => read,
        };

        match read {
            Ok(0) => {
                debug!(connection_id = %connection.id(), "peer closed the connection");
                connection.disconnect();
                break;
            }
            Ok(n) => {
                trace!(connection_id = %connection.id(), bytes = n, "read from connection");
                if builder.is_upgraded() {
                    connection.handler().on_data(connection, &buf[..n]);
                    continue;
                }

                if process(connection, &mut builder, &buf[..n]) == Flow::Stop {
                    // the last response closes the connection once it is written
                    cancel.cancelled().await;
                    break;
                }
            }
            Err(e) if is_end_of_stream(&e) => {
                debug!(connection_id = %connection.id(), "connection reached end of stream");
                connection.disconnect();
                break;
            }
            Err(e) => {
                warn!(connection_id = %connection.id(), cause = %e, "failed to read");
                connection.handler().on_error(Some(connection), &HttpError::read(e));
                connection.disconnect();
                break;
            }
        }
    }
}

/// Feeds one read to the builder and dispatches every request it completes, including
/// pipelined requests that arrived in the same read.
fn process(connection: &Connection, builder: &mut RequestBuilder, data: &[u8]) -> Flow {
    let mut input = data;
    loop {
        let feed = match builder.feed(input) {
            Ok(feed) => feed,
            Err(e) => {
                reject(connection, e);
                return Flow::Stop;
            }
        };
        input = &[];

        match feed {
            Feed::NeedMore => {
                if builder.take_expect_continue() {
                    debug!(connection_id = %connection.id(), "receive expect request header, sent continue response");
                    if connection.write(CONTINUE).is_err() {
                        return Flow::Stop;
                    }
                }
                return Flow::Continue;
            }
            Feed::Complete => {
                let Some(request) = builder.take_request() else {
                    return Flow::Continue;
                };
                if !dispatch(connection, request) {
                    return Flow::Stop;
                }
                if !builder.has_pending() {
                    return Flow::Continue;
                }
            }
            Feed::UpgradeComplete => {
                let remainder = builder.take_upgrade_remainder();
                if let Some(request) = builder.take_request() {
                    info!(connection_id = %connection.id(), url = request.url(), "connection switches protocols");
                    dispatch(connection, request);
                }
                if let Some(remainder) = remainder.filter(|remainder| !remainder.is_empty()) {
                    connection.handler().on_data(connection, &remainder);
                }
                return Flow::Continue;
            }
        }
    }
}

/// Hands `request` to the handler with a response wired to the connection. Returns
/// whether the connection stays open for further requests; a failed handler closes it.
fn dispatch(connection: &Connection, request: Request) -> bool {
    let keep_alive = request.keep_alive();
    let request = Arc::new(request);
    let response = Response::for_request(Arc::clone(&request)).with_sink(connection.sink(keep_alive));

    if let Err(e) = connection.handler().on_request(connection, request, response) {
        // the response may be half sent, so the stream can't carry another one
        warn!(connection_id = %connection.id(), cause = %e, "request handler failed, closing connection");
        connection.close();
        return false;
    }
    keep_alive
}

/// Reports a malformed request and answers it with `400 Bad Request` before closing.
fn reject(connection: &Connection, e: ParseError) {
    warn!(connection_id = %connection.id(), cause = %e, "failed to parse request");
    connection.handler().on_error(Some(connection), &HttpError::from(e));

    if let Err(e) = bad_request(connection) {
        debug!(connection_id = %connection.id(), cause = %e, "can't send bad request response");
        connection.disconnect();
    }
}

fn bad_request(connection: &Connection) -> Result<(), ResponseError> {
    let mut response = Response::new().with_sink(connection.sink(false));
    response.begin(400)?.header("Content-Length", 0_u64)?.header("Connection", "close")?;
    response.end()
}
