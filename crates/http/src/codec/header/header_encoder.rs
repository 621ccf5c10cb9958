//! Serializes the head of a response: status line, header fields and the blank line.
//!
//! The encoder writes the fields exactly as the [`HeaderList`] holds them. Framing
//! headers (`Content-Length`, `Transfer-Encoding`) are the caller's business; the
//! [`Response`](crate::protocol::Response) injects `Transfer-Encoding: chunked` itself
//! when it switches to chunked mode.

use std::io;
use std::io::Write;

use bytes::{BufMut, BytesMut};
use http::StatusCode;

use crate::protocol::HeaderList;

/// Initial reservation for a head without many fields.
const INIT_HEADER_SIZE: usize = 256;

/// Appends `HTTP/1.1 <code> <reason>\r\n`, one `Name: value\r\n` line per field and the
/// terminating `\r\n` to `dst`.
pub fn encode_head(status: StatusCode, reason: &str, headers: &HeaderList, dst: &mut BytesMut) {
    let fields_len = headers.iter().map(|(name, value)| name.len() + value.len() + 4).sum::<usize>();
    dst.reserve(INIT_HEADER_SIZE.max(fields_len + reason.len() + 16));

    // writing into a BytesMut never fails
    let _ = write!(FastWrite(dst), "HTTP/1.1 {} {}\r\n", status.as_str(), reason);

    for (name, value) in headers.iter() {
        dst.put_slice(name.as_bytes());
        dst.put_slice(b": ");
        dst.put_slice(value.as_bytes());
        dst.put_slice(b"\r\n");
    }
    dst.put_slice(b"\r\n");
}

/// `io::Write` over a `BytesMut` so `write!` can format straight into the buffer.
pub(crate) struct FastWrite<'a>(pub(crate) &'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use indoc::indoc;

    #[test]
    fn head_keeps_field_order_and_case() {
        let mut headers = HeaderList::new();
        headers.insert("Content-Type", HeaderValue::from_static("text/plain"));
        headers.insert("x-request-id", HeaderValue::from_static("42"));

        let mut dst = BytesMut::new();
        encode_head(StatusCode::OK, "OK", &headers, &mut dst);

        let expected = indoc! {"
        HTTP/1.1 200 OK\r
        Content-Type: text/plain\r
        x-request-id: 42\r
        \r
        "};
        assert_eq!(&dst[..], expected.as_bytes());
    }

    #[test]
    fn custom_reason_without_fields() {
        let mut dst = BytesMut::new();
        encode_head(StatusCode::from_u16(599).unwrap(), "Unknown", &HeaderList::new(), &mut dst);

        assert_eq!(&dst[..], b"HTTP/1.1 599 Unknown\r\n\r\n");
    }
}
