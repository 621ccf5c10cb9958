//! An embeddable HTTP/1.1 server engine
//!
//! This crate accepts TCP connections, parses the HTTP/1.1 requests arriving on them
//! incrementally and hands each complete request to an application [`Handler`](handler::Handler)
//! together with a [`Response`](protocol::Response) the handler fills in and sends, either
//! in one piece or as a stream of chunks.
//!
//! # Features
//!
//! - Incremental request parsing: any partition of the input yields the same requests
//! - Pipelined requests and keep-alive connections
//! - Chunked request bodies and chunked (streamed) responses
//! - Expect-continue
//! - Protocol upgrades, after which raw bytes are handed to the application
//! - Strictly ordered writes per connection
//! - A server that drives itself with [`Server::run`](server::Server::run) or is stepped
//!   from a host loop with [`Server::poll`](server::Server::poll)
//!
//! # Example
//!
//! ```no_run
//! use embed_http::handler::make_handler;
//! use embed_http::server::Server;
//! use tracing::{Level, error, info};
//! use tracing_subscriber::FmtSubscriber;
//!
//! let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//! tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
//!
//! let handler = make_handler(|_connection, request, mut response| {
//!     info!(url = request.url(), "receiving request");
//!     let body = "Hello World!\r\n";
//!     response.begin(200)?.header("Content-Length", body.len())?.write(body)?;
//!     response.end()
//! });
//!
//! let server = Server::builder().workers(4).handler(handler).build().expect("can't build server");
//! if let Err(e) = server.listen_on("127.0.0.1", 8080) {
//!     error!(cause = %e, "bind server error");
//!     return;
//! }
//! server.run();
//! ```
//!
//! # Architecture
//!
//! - [`server`]: the runtime, the listeners and the accept loop
//! - [`connection`]: per-connection read and write tasks
//! - [`codec`]: the incremental parser, request assembly and response encoding
//! - [`protocol`]: requests, responses and errors
//! - [`handler`]: the application callbacks
//!
//! # Limitations
//!
//! - HTTP/1.1 and HTTP/1.0 only
//! - No TLS
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod server;

mod utils;
pub(crate) use utils::ensure;
