//! Wire formats: incremental request parsing and response framing.
//!
//! - [`ByteParser`] parses a byte stream into [`ParseHandler`] events, one message at a time
//! - [`RequestBuilder`] assembles those events into [`Request`](crate::protocol::Request)s,
//!   one builder per connection
//! - [`RequestDecoder`] adapts a builder to `tokio_util`'s [`Decoder`](tokio_util::codec::Decoder)
//! - [`encode_head`], [`encode_chunk`] and [`encode_last_chunk`] format responses

mod body;
mod header;
mod parser;
mod request_builder;
mod request_decoder;

pub use body::{LAST_CHUNK, PayloadDecoder, encode_chunk, encode_last_chunk};
pub use header::{MAX_HEADER_BYTES, MAX_HEADER_NUM, MessageHead, decode_head, encode_head};
pub use parser::{ByteParser, ParseHandler, ParseStatus, Progress};
pub use request_builder::{Feed, RequestBuilder};
pub use request_decoder::RequestDecoder;
