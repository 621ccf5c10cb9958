use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::select;
use tracing::{info, warn};

use crate::connection::Connection;
use crate::protocol::HttpError;
use crate::server::server::ServerContext;

/// Accepts connections on `listener` until the server is stopped, serving each one on
/// its own task. Connections already accepted outlive the loop.
pub(crate) async fn accept_loop(listener: TcpListener, context: Arc<ServerContext>) {
    let shutdown = context.shutdown.clone();
    let local_addr = listener.local_addr().ok();

    loop {
        let accepted = select! {
            biased;
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        let (stream, peer_addr) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                context.handler.on_error(None, &HttpError::accept(e));
                continue;
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!(cause = %e, "failed to set TCP_NODELAY");
        }

        let connection = Connection::new(
            context.next_connection_id(),
            Some(peer_addr),
            Arc::clone(&context.handler),
            context.config.read_buffer_size,
        );
        tokio::spawn(connection.run(stream));
    }

    info!(addr = ?local_addr, "stop accepting connections");
}
