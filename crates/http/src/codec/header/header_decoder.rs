//! Request head parsing.
//!
//! The request line and header fields are parsed with `httparse` once the whole head is
//! buffered. Each piece is then reported to a [`ParseHandler`] and the body framing is
//! resolved from `Content-Length` / `Transfer-Encoding`.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum head size: 8KB
//! - Only HTTP/1.0 and HTTP/1.1

use http::{HeaderValue, Method, Version};
use httparse::{Error, Status};
use tracing::trace;

use crate::codec::ParseHandler;
use crate::ensure;
use crate::protocol::{ParseError, PayloadSize};

/// Maximum number of headers allowed in a request
pub const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the request line plus header section
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// What the rest of the parser needs to know about a request once its head is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHead {
    pub method: Method,
    pub version: Version,
    pub payload: PayloadSize,
    /// `Upgrade` together with `Connection: upgrade`, or a `CONNECT` request.
    pub upgrade: bool,
    pub expect_continue: bool,
}

/// Parses a buffered request head.
///
/// Returns `Ok(None)` while the head is incomplete. Once complete, the url and every
/// header field/value pair are reported to `handler` in wire order and the head length is
/// returned with its [`MessageHead`]; bytes past that length belong to the body.
pub fn decode_head<H: ParseHandler>(src: &[u8], handler: &mut H) -> Result<Option<(usize, MessageHead)>, ParseError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
    let mut req = httparse::Request::new(&mut headers);

    let status = req.parse(src).map_err(|e| match e {
        Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
        Error::Version => ParseError::InvalidVersion(None),
        e => ParseError::invalid_header(e.to_string()),
    })?;

    let head_len = match status {
        Status::Complete(head_len) => head_len,
        Status::Partial => {
            ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
            return Ok(None);
        }
    };

    trace!(head_len, "parsed request head");
    ensure!(head_len <= MAX_HEADER_BYTES, ParseError::too_large_header(head_len, MAX_HEADER_BYTES));

    let version = match req.version {
        Some(0) => Version::HTTP_10,
        Some(1) => Version::HTTP_11,
        v => return Err(ParseError::InvalidVersion(v)),
    };

    let method = req.method.ok_or(ParseError::InvalidMethod)?;
    let method = Method::from_bytes(method.as_bytes()).map_err(|_| ParseError::InvalidMethod)?;
    let path = req.path.ok_or(ParseError::InvalidUri)?;

    handler.on_url(path.as_bytes())?;

    let mut framing = Framing::default();
    for header in req.headers.iter() {
        handler.on_header_field(header.name.as_bytes())?;
        handler.on_header_value(header.value)?;
        framing.observe(header.name, header.value)?;
    }

    let upgrade = method == Method::CONNECT || (framing.upgrade && framing.connection_upgrade);
    let expect_continue = version == Version::HTTP_11 && framing.expect_continue;
    let payload = framing.payload_size()?;

    Ok(Some((head_len, MessageHead { method, version, payload, upgrade, expect_continue })))
}

/// The header fields that decide how the message continues after its head.
#[derive(Debug, Default)]
struct Framing {
    content_length: Option<u64>,
    /// The last coding of the last `Transfer-Encoding` field is `chunked`
    chunked: bool,
    transfer_encoding: bool,
    upgrade: bool,
    connection_upgrade: bool,
    expect_continue: bool,
}

impl Framing {
    fn observe(&mut self, name: &str, value: &[u8]) -> Result<(), ParseError> {
        if name.eq_ignore_ascii_case("content-length") {
            let length = parse_content_length(value)?;
            match self.content_length {
                Some(previous) if previous != length => {
                    return Err(ParseError::invalid_content_length(format!("conflicting values {previous} and {length}")));
                }
                _ => self.content_length = Some(length),
            }
        } else if name.eq_ignore_ascii_case("transfer-encoding") {
            self.transfer_encoding = true;
            self.chunked = is_chunked(value);
        } else if name.eq_ignore_ascii_case("upgrade") {
            self.upgrade = true;
        } else if name.eq_ignore_ascii_case("connection") {
            self.connection_upgrade |= value.split(|b| *b == b',').any(|token| token.trim_ascii().eq_ignore_ascii_case(b"upgrade"));
        } else if name.eq_ignore_ascii_case("expect") {
            self.expect_continue = value.trim_ascii().eq_ignore_ascii_case(b"100-continue");
        }
        Ok(())
    }

    // refer: https://www.rfc-editor.org/rfc/rfc9112.html#name-transfer-encoding
    fn payload_size(&self) -> Result<PayloadSize, ParseError> {
        match (self.transfer_encoding, self.content_length) {
            (false, None) => Ok(PayloadSize::Empty),
            (false, Some(length)) => Ok(PayloadSize::Length(length)),
            (true, None) if self.chunked => Ok(PayloadSize::Chunked),
            (true, None) => Err(ParseError::invalid_transfer_encoding("the final coding is not chunked")),
            (true, Some(_)) => Err(ParseError::invalid_content_length("transfer_encoding and content_length both present in headers")),
        }
    }
}

fn parse_content_length(value: &[u8]) -> Result<u64, ParseError> {
    let value = value.trim_ascii();
    ensure!(!value.is_empty() && value.iter().all(u8::is_ascii_digit), ParseError::invalid_content_length("value is not a number"));

    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| ParseError::invalid_content_length("value is not u64"))
}

/// Checks if a Transfer-Encoding value ends with the chunked coding.
fn is_chunked(value: &[u8]) -> bool {
    value.rsplit(|b| *b == b',').next().is_some_and(|coding| coding.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}

/// Converts a raw header value, rejecting the bytes `http` does not allow.
pub(crate) fn header_value(value: &[u8]) -> Result<HeaderValue, ParseError> {
    HeaderValue::from_bytes(value).map_err(|e| ParseError::invalid_header(e.to_string()))
}
