use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::codec::body::length_decoder::LengthDecoder;
use crate::protocol::{ParseError, PayloadSize};

/// Decodes a request body with the framing announced in its head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDecoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Length(LengthDecoder),

    Chunked(ChunkedDecoder),

    NoBody,
}

impl PayloadDecoder {
    pub fn empty() -> Self {
        Self { kind: Kind::NoBody }
    }

    pub fn chunked() -> Self {
        Self { kind: Kind::Chunked(ChunkedDecoder::new()) }
    }

    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthDecoder::new(size)) }
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self.kind, Kind::Chunked(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, Kind::NoBody)
    }

    /// Consumes body bytes from `src`, returning how many were used and whether the body
    /// is complete. Whatever follows the body stays in `src` for the next message.
    pub fn decode(&mut self, src: &[u8], on_data: impl FnMut(&[u8])) -> Result<(usize, bool), ParseError> {
        match &mut self.kind {
            Kind::Length(length_decoder) => Ok(length_decoder.decode(src, on_data)),
            Kind::Chunked(chunked_decoder) => chunked_decoder.decode(src, on_data),
            Kind::NoBody => Ok((0, true)),
        }
    }
}

impl From<PayloadSize> for PayloadDecoder {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(0) | PayloadSize::Empty => PayloadDecoder::empty(),
            PayloadSize::Length(n) => PayloadDecoder::fix_length(n),
            PayloadSize::Chunked => PayloadDecoder::chunked(),
        }
    }
}
