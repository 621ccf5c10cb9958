//! [`RequestBuilder`] behind `tokio_util`'s [`Decoder`] trait, for driving the parser
//! through a `FramedRead`.
//!
//! # Example
//!
//! ```no_run
//! use embed_http::codec::RequestDecoder;
//! use futures::StreamExt;
//! use tokio::net::TcpStream;
//! use tokio_util::codec::FramedRead;
//!
//! # async fn run(stream: TcpStream) {
//! let mut requests = FramedRead::new(stream, RequestDecoder::new());
//! while let Some(Ok(request)) = requests.next().await {
//!     println!("{} {}", request.method(), request.url());
//! }
//! # }
//! ```

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::{Feed, RequestBuilder};
use crate::ensure;
use crate::protocol::{ParseError, Request};

/// Yields one [`Request`] per complete message.
///
/// After a request that switches protocols the decoder yields nothing more: the bytes
/// that followed it are put back into the read buffer and every later read accumulates
/// there, for the new protocol to pick up.
#[derive(Debug, Default)]
pub struct RequestDecoder {
    builder: RequestBuilder,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Whether an upgrade request was decoded.
    pub fn is_upgraded(&self) -> bool {
        self.builder.is_upgraded()
    }
}

impl Decoder for RequestDecoder {
    type Item = Request;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.builder.is_upgraded() || (src.is_empty() && !self.builder.has_pending()) {
            return Ok(None);
        }

        let data = src.split();
        match self.builder.feed(&data)? {
            Feed::NeedMore => Ok(None),
            Feed::Complete => Ok(self.builder.take_request()),
            Feed::UpgradeComplete => {
                if let Some(remainder) = self.builder.take_upgrade_remainder() {
                    trace!(len = remainder.len(), "returning bytes after upgrade to the read buffer");
                    src.extend_from_slice(&remainder);
                }
                Ok(self.builder.take_request())
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(request) = self.decode(src)? {
            return Ok(Some(request));
        }

        if !self.builder.is_upgraded() {
            ensure!(!self.builder.is_partial() && src.is_empty(), ParseError::Truncated);
        }
        Ok(None)
    }
}
