use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, trace, warn};

use crate::connection::Connection;
use crate::protocol::{HttpError, SendError};

/// An entry of a connection's write queue.
#[derive(Debug)]
pub(crate) enum Outbound {
    Data(Bytes),
    /// Disconnect once everything queued before has been written.
    Close,
}

/// Drains the write queue of `connection` into `writer`, one entry at a time.
///
/// Runs until the connection is disconnected or a `Close` entry is reached, then shuts
/// the socket down. A failed write is reported to the handler and disconnects.
pub(crate) async fn write_loop<W>(connection: Connection, mut writer: W, mut receiver: UnboundedReceiver<Outbound>)
where
    W: AsyncWrite + Unpin,
{
    let cancel = connection.cancellation().clone();

    loop {
        let outbound = select! {
            biased;
            () = cancel.cancelled() => break,
            outbound = receiver.recv() => outbound,
        };

        let bytes = match outbound {
            Some(Outbound::Data(bytes)) => bytes,
            Some(Outbound::Close) => {
                debug!(connection_id = %connection.id(), "closing after queued writes");
                if let Err(e) = writer.flush().await {
                    trace!(cause = %e, "flush before close failed");
                }
                connection.disconnect();
                break;
            }
            None => break,
        };

        let result = select! {
            biased;
            () = cancel.cancelled() => {
                connection.written();
                break;
            }
            result = writer.write_all(&bytes) => result,
        };
        connection.written();

        if let Err(e) = result {
            warn!(connection_id = %connection.id(), cause = %e, "failed to write");
            connection.handler().on_error(Some(&connection), &HttpError::from(SendError::io(e)));
            connection.disconnect();
            break;
        }
        trace!(connection_id = %connection.id(), len = bytes.len(), "wrote queued bytes");
    }

    receiver.close();
    let mut dropped = 0_usize;
    while let Ok(outbound) = receiver.try_recv() {
        if matches!(outbound, Outbound::Data(_)) {
            connection.written();
            dropped += 1;
        }
    }
    if dropped > 0 {
        trace!(connection_id = %connection.id(), dropped, "dropped queued writes after disconnect");
    }

    if let Err(e) = writer.shutdown().await {
        trace!(connection_id = %connection.id(), cause = %e, "socket shutdown failed");
    }
}
