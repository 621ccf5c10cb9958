use std::io::Write;

use bytes::{BufMut, BytesMut};

use crate::codec::header::FastWrite;

/// The frame that terminates a chunked body.
pub const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

/// Appends one `<hex-len>\r\n<payload>\r\n` frame to `dst`.
///
/// An empty payload would be read by the peer as the last chunk, so nothing is written
/// for it; use [`encode_last_chunk`] to end the body.
pub fn encode_chunk(payload: &[u8], dst: &mut BytesMut) {
    if payload.is_empty() {
        return;
    }

    dst.reserve(payload.len() + 20);
    let _ = write!(FastWrite(dst), "{:x}\r\n", payload.len());
    dst.put_slice(payload);
    dst.put_slice(b"\r\n");
}

pub fn encode_last_chunk(dst: &mut BytesMut) {
    dst.put_slice(LAST_CHUNK);
}
