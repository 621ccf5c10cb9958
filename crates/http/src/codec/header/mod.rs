//! Request head decoding and response head encoding.

mod header_decoder;
mod header_encoder;

pub(crate) use header_decoder::header_value;
pub use header_decoder::{MAX_HEADER_BYTES, MAX_HEADER_NUM, MessageHead, decode_head};
pub(crate) use header_encoder::FastWrite;
pub use header_encoder::encode_head;
