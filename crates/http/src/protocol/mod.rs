//! The data types of an HTTP exchange.
//!
//! - [`Request`]: an immutable, fully parsed request
//! - [`HeaderList`]: ordered header fields with case-insensitive lookup
//! - [`Response`] and [`Chunk`]: the phased response formatter, emitting through a
//!   [`ResponseSink`]
//! - [`PayloadSize`]: how a request body is framed
//! - Errors: [`HttpError`] for everything reported to handlers, [`ParseError`] for
//!   malformed requests, [`SendError`] for failed writes and [`ResponseError`] for misuse
//!   of a [`Response`]

mod message;
pub use message::PayloadSize;

mod headers;
pub use headers::HeaderList;

mod request;
pub use request::Request;

mod response;
pub use response::Chunk;
pub use response::Phase;
pub use response::Response;
pub use response::ResponseSink;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::ResponseError;
pub use error::SendError;
pub(crate) use error::is_end_of_stream;
