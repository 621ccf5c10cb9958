//! Answers `/` with a greeting, `/stream` with a chunked body and echoes everything sent
//! after an `Upgrade: echo` request.

use std::sync::Arc;

use embed_http::connection::Connection;
use embed_http::handler::Handler;
use embed_http::protocol::{HttpError, Request, Response, ResponseError};
use embed_http::server::Server;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

struct Hello;

impl Handler for Hello {
    fn on_request(&self, _connection: &Connection, request: Arc<Request>, mut response: Response) -> Result<(), ResponseError> {
        info!(method = %request.method(), url = request.url(), "receiving request");

        if request.is_upgrade() {
            response.begin(101)?.header("Upgrade", "echo")?.header("Connection", "Upgrade")?;
            return response.end();
        }

        match request.url() {
            "/stream" => {
                response.begin(200)?.header("Content-Type", "text/plain")?.make_chunked()?;
                for i in 0..5 {
                    let mut chunk = response.begin_chunk()?;
                    chunk.write(format!("line {i}\n"));
                    chunk.end()?;
                }
                response.end()
            }
            "/" => {
                let body = "Hello World!\r\n";
                response.begin(200)?.header("Content-Length", body.len())?.write(body)?;
                response.end()
            }
            _ => {
                response.begin(404)?.header("Content-Length", 0_u64)?;
                response.end()
            }
        }
    }

    fn on_data(&self, connection: &Connection, data: &[u8]) {
        if let Err(e) = connection.write(data.to_vec()) {
            warn!(cause = %e, "echo failed");
        }
    }

    fn on_error(&self, _connection: Option<&Connection>, error: &HttpError) {
        warn!(cause = %error, "http error");
    }
}

fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let server = match Server::builder().workers(2).handler(Hello).build() {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "can't build server");
            return;
        }
    };

    if let Err(e) = server.listen_on("127.0.0.1", 8080) {
        error!(cause = %e, "bind server error");
        return;
    }

    server.run();
}
