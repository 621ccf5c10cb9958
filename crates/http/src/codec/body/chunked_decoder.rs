//! Incremental decoder for `Transfer-Encoding: chunked` bodies.
//!
//! The decoder walks the wire format one byte at a time except inside chunk data, which
//! is handed out as whole slices. It never buffers: every call consumes as much of the
//! input as it can and reports how far it got, so a body split across any number of
//! reads decodes to the same bytes.

use std::cmp;

use tracing::trace;

use crate::ensure;
use crate::protocol::ParseError;
use ChunkedState::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    remaining_size: u64,
    seen_digit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Read the chunk size in hex
    Size,
    /// Whitespace after the size
    SizeLws,
    /// Skip chunk extensions
    Extension,
    SizeLf,
    Body,
    BodyCr,
    BodyLf,
    /// Inside a trailer field line
    Trailer,
    TrailerLf,
    /// Start of a line after the last chunk: a trailer field or the final CRLF
    EndCr,
    EndLf,
    End,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: Size, remaining_size: 0, seen_digit: false }
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.state == End
    }

    /// Decodes as much of `src` as possible, passing chunk data to `on_data`.
    ///
    /// Returns the number of bytes consumed and whether the terminating chunk and its
    /// trailer section were fully read. Bytes after the end of the body are left
    /// unconsumed.
    pub fn decode(&mut self, src: &[u8], mut on_data: impl FnMut(&[u8])) -> Result<(usize, bool), ParseError> {
        let mut pos = 0;
        loop {
            if self.state == End {
                trace!("finished reading chunked data");
                return Ok((pos, true));
            }

            if pos == src.len() {
                return Ok((pos, false));
            }

            if self.state == Body {
                let len = cmp::min(self.remaining_size, (src.len() - pos) as u64) as usize;
                trace!(len, "read chunked bytes");
                on_data(&src[pos..pos + len]);
                pos += len;
                self.remaining_size -= len as u64;
                if self.remaining_size == 0 {
                    self.state = BodyCr;
                }
                continue;
            }

            let byte = src[pos];
            pos += 1;
            self.state = self.step(byte)?;
        }
    }

    fn step(&mut self, byte: u8) -> Result<ChunkedState, ParseError> {
        match self.state {
            Size => self.read_size(byte),
            SizeLws => match byte {
                b'\t' | b' ' => Ok(SizeLws),
                b';' => Ok(Extension),
                b'\r' => Ok(SizeLf),
                _ => Err(ParseError::invalid_chunk("invalid chunk size linear white space")),
            },
            Extension => match byte {
                b'\r' => Ok(SizeLf),
                b'\n' => Err(ParseError::invalid_chunk("chunk extension contains a bare newline")),
                _ => Ok(Extension),
            },
            SizeLf => {
                ensure!(byte == b'\n', ParseError::invalid_chunk("invalid chunk size line: missing LF"));
                self.seen_digit = false;
                if self.remaining_size == 0 { Ok(EndCr) } else { Ok(Body) }
            }
            BodyCr => {
                ensure!(byte == b'\r', ParseError::invalid_chunk("invalid chunk body CR"));
                Ok(BodyLf)
            }
            BodyLf => {
                ensure!(byte == b'\n', ParseError::invalid_chunk("invalid chunk body LF"));
                Ok(Size)
            }
            Trailer => match byte {
                b'\r' => Ok(TrailerLf),
                _ => Ok(Trailer),
            },
            TrailerLf => {
                ensure!(byte == b'\n', ParseError::invalid_chunk("invalid trailer end LF"));
                Ok(EndCr)
            }
            EndCr => match byte {
                b'\r' => Ok(EndLf),
                _ => Ok(Trailer),
            },
            EndLf => {
                ensure!(byte == b'\n', ParseError::invalid_chunk("invalid chunk end LF"));
                Ok(End)
            }
            Body | End => Ok(self.state),
        }
    }

    fn read_size(&mut self, byte: u8) -> Result<ChunkedState, ParseError> {
        let digit = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte + 10 - b'a',
            b'A'..=b'F' => byte + 10 - b'A',
            b'\t' | b' ' | b';' | b'\r' => {
                ensure!(self.seen_digit, ParseError::invalid_chunk("chunk size line without digits"));
                return Ok(match byte {
                    b';' => Extension,
                    b'\r' => SizeLf,
                    _ => SizeLws,
                });
            }
            _ => return Err(ParseError::invalid_chunk("invalid chunk size line: Invalid Size")),
        };

        self.remaining_size = self
            .remaining_size
            .checked_mul(16)
            .and_then(|size| size.checked_add(u64::from(digit)))
            .ok_or(ParseError::invalid_chunk("invalid overflow chunked length"))?;
        self.seen_digit = true;
        Ok(Size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(decoder: &mut ChunkedDecoder, src: &[u8]) -> (Vec<u8>, usize, bool) {
        let mut body = Vec::new();
        let (consumed, finished) = decoder.decode(src, |data| body.extend_from_slice(data)).unwrap();
        (body, consumed, finished)
    }

    #[test]
    fn test_basic() {
        let src = b"10\r\n1234567890abcdef\r\n5\r\nhello\r\n0\r\n\r\nGET";
        let mut decoder = ChunkedDecoder::new();

        let (body, consumed, finished) = decode_all(&mut decoder, src);

        assert!(finished);
        assert_eq!(&body[..], b"1234567890abcdefhello");
        assert_eq!(&src[consumed..], b"GET");
    }

    #[test]
    fn byte_by_byte() {
        let src = b"3;name=value\r\nfoo\r\nA \r\n0123456789\r\n0\r\n\r\n";
        let mut decoder = ChunkedDecoder::new();
        let mut body = Vec::new();

        for (index, byte) in src.iter().enumerate() {
            let (consumed, finished) = decoder.decode(std::slice::from_ref(byte), |data| body.extend_from_slice(data)).unwrap();
            assert_eq!(consumed, 1);
            assert_eq!(finished, index == src.len() - 1);
        }

        assert_eq!(&body[..], b"foo0123456789");
    }

    #[test]
    fn trailers_are_skipped() {
        let src = b"2\r\nok\r\n0\r\nExpires: never\r\nX-Sum: 1\r\n\r\n";
        let mut decoder = ChunkedDecoder::new();
        let (body, consumed, finished) = decode_all(&mut decoder, src);

        assert!(finished);
        assert_eq!(&body[..], b"ok");
        assert_eq!(consumed, src.len());
    }

    #[test]
    fn partial_input_needs_more() {
        let mut decoder = ChunkedDecoder::new();
        let (body, consumed, finished) = decode_all(&mut decoder, b"5\r\nhel");

        assert!(!finished);
        assert_eq!(consumed, 6);
        assert_eq!(&body[..], b"hel");
        assert!(!decoder.is_finished());
    }

    #[test]
    fn invalid_size() {
        let mut decoder = ChunkedDecoder::new();
        let result = decoder.decode(b"xyz\r\n", |_| {});
        assert!(matches!(result, Err(ParseError::InvalidChunk { .. })));

        let mut decoder = ChunkedDecoder::new();
        let result = decoder.decode(b"\r\n", |_| {});
        assert!(matches!(result, Err(ParseError::InvalidChunk { .. })));
    }

    #[test]
    fn size_overflow() {
        let mut decoder = ChunkedDecoder::new();
        let result = decoder.decode(b"fffffffffffffffff\r\n", |_| {});
        assert!(matches!(result, Err(ParseError::InvalidChunk { reason }) if reason.contains("overflow")));
    }

    #[test]
    fn missing_crlf_after_data() {
        let mut decoder = ChunkedDecoder::new();
        let result = decoder.decode(b"3\r\nfooX\r\n", |_| {});
        assert!(matches!(result, Err(ParseError::InvalidChunk { .. })));
    }
}
