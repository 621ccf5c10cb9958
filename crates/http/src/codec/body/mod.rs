//! Request body framing.
//!
//! Decoders consume body bytes straight from the read buffer and report how far they got;
//! the encoder formats response chunks.
//!
//! - [`PayloadDecoder`] picks between `ChunkedDecoder`
//!   and `LengthDecoder` from the request head
//! - [`encode_chunk`] / [`encode_last_chunk`] produce `Transfer-Encoding: chunked` frames

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod payload_decoder;

pub use chunked_encoder::{LAST_CHUNK, encode_chunk, encode_last_chunk};
pub use payload_decoder::PayloadDecoder;
