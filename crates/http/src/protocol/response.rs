//! The response side of an exchange.
//!
//! A [`Response`] is a small state machine that formats HTTP bytes and hands them to a
//! [`ResponseSink`]. It goes through three phases:
//!
//! ```text
//! NotStarted --begin--> Open --end--> Ended
//! ```
//!
//! While `Open` the body is either buffered and sent in one piece by [`Response::end`], or,
//! once the response is made chunked, streamed as `Transfer-Encoding: chunked` frames.
//! Formatting is kept apart from emission: [`Response::head_bytes`] and [`Chunk::to_http`]
//! only build bytes, the sink decides where they go.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::{HeaderName, HeaderValue, StatusCode};

use crate::codec::{LAST_CHUNK, encode_chunk, encode_head};
use crate::ensure;
use crate::protocol::{HeaderList, Request, ResponseError, SendError};

/// Where a [`Response`] sends the bytes it produced.
///
/// `on_head` receives the status line and header block, `on_body` the buffered body of a
/// non-chunked response, `on_chunk` complete chunk frames (including the final
/// `0\r\n\r\n`). `on_end` is called once after the last bytes.
pub trait ResponseSink: Send {
    fn on_head(&mut self, head: Bytes) -> Result<(), SendError>;

    fn on_body(&mut self, body: Bytes) -> Result<(), SendError>;

    fn on_chunk(&mut self, chunk: Bytes) -> Result<(), SendError>;

    fn on_end(&mut self) -> Result<(), SendError> {
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    Open,
    Ended,
}

pub struct Response {
    status: StatusCode,
    reason: Cow<'static, str>,
    headers: HeaderList,
    body: BytesMut,
    phase: Phase,
    chunked: bool,
    sink: Option<Box<dyn ResponseSink>>,
    request: Option<Arc<Request>>,
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("reason", &self.reason)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("phase", &self.phase)
            .field("chunked", &self.chunked)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// A response that is not wired to any sink yet.
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            reason: Cow::Borrowed("OK"),
            headers: HeaderList::new(),
            body: BytesMut::new(),
            phase: Phase::NotStarted,
            chunked: false,
            sink: None,
            request: None,
        }
    }

    /// A response answering `request`.
    pub fn for_request(request: Arc<Request>) -> Self {
        Self { request: Some(request), ..Self::new() }
    }

    pub fn with_sink(mut self, sink: impl ResponseSink + 'static) -> Self {
        self.set_sink(sink);
        self
    }

    pub fn set_sink(&mut self, sink: impl ResponseSink + 'static) {
        self.sink = Some(Box::new(sink));
    }

    pub fn request(&self) -> Option<&Arc<Request>> {
        self.request.as_ref()
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    #[inline]
    pub fn headers(&self) -> &HeaderList {
        &self.headers
    }

    /// The buffered body of a response that is not chunked.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn is_chunked(&self) -> bool {
        self.chunked
    }

    /// Starts the response with the standard reason phrase of `code`, or `Unknown`.
    pub fn begin(&mut self, code: u16) -> Result<&mut Self, ResponseError> {
        let status = StatusCode::from_u16(code).map_err(|_| ResponseError::InvalidStatus(code))?;
        let reason = status.canonical_reason().unwrap_or("Unknown");
        self.start(status, Cow::Borrowed(reason))
    }

    pub fn begin_with_reason(&mut self, code: u16, reason: impl Into<Cow<'static, str>>) -> Result<&mut Self, ResponseError> {
        let status = StatusCode::from_u16(code).map_err(|_| ResponseError::InvalidStatus(code))?;
        let reason = reason.into();
        ensure!(!reason.contains(['\r', '\n']), ResponseError::invalid_header("reason phrase contains a line break"));
        self.start(status, reason)
    }

    fn start(&mut self, status: StatusCode, reason: Cow<'static, str>) -> Result<&mut Self, ResponseError> {
        self.expect_phase("begin", Phase::NotStarted)?;
        self.status = status;
        self.reason = reason;
        self.phase = Phase::Open;
        Ok(self)
    }

    /// Sets a header, replacing any earlier value with the same name.
    pub fn header<V>(&mut self, name: &str, value: V) -> Result<&mut Self, ResponseError>
    where
        V: TryInto<HeaderValue>,
        V::Error: fmt::Display,
    {
        self.expect_phase("header", Phase::Open)?;
        ensure!(!self.chunked, ResponseError::HeadersCommitted { operation: "header" });

        HeaderName::from_bytes(name.as_bytes()).map_err(ResponseError::invalid_header)?;
        let value = value.try_into().map_err(ResponseError::invalid_header)?;

        self.headers.insert(name, value);
        Ok(self)
    }

    /// Buffers `data` as body, or sends it as one chunk when the response is chunked.
    pub fn write(&mut self, data: impl AsRef<[u8]>) -> Result<&mut Self, ResponseError> {
        self.expect_phase("write", Phase::Open)?;
        let data = data.as_ref();

        if self.chunked {
            if !data.is_empty() {
                let mut frame = BytesMut::new();
                encode_chunk(data, &mut frame);
                self.sink("write")?.on_chunk(frame.freeze())?;
            }
        } else {
            self.body.extend_from_slice(data);
        }
        Ok(self)
    }

    /// Switches to chunked transfer: sends the head with `Transfer-Encoding: chunked`
    /// and flushes the buffered body as the first chunk.
    pub fn make_chunked(&mut self) -> Result<&mut Self, ResponseError> {
        self.expect_phase("make_chunked", Phase::Open)?;
        if self.chunked {
            return Ok(self);
        }
        self.sink("make_chunked")?;

        let mut headers = self.headers.clone();
        headers.remove("content-length");
        headers.insert("Transfer-Encoding", HeaderValue::from_static("chunked"));

        let mut head = BytesMut::new();
        encode_head(self.status, &self.reason, &headers, &mut head);
        // nothing changes until the head is out, so a failed send leaves the response plain
        self.sink("make_chunked")?.on_head(head.freeze())?;
        self.headers = headers;
        self.chunked = true;

        if !self.body.is_empty() {
            let mut frame = BytesMut::with_capacity(self.body.len() + 20);
            encode_chunk(&self.body, &mut frame);
            self.sink("make_chunked")?.on_chunk(frame.freeze())?;
            self.body.clear();
        }
        Ok(self)
    }

    /// Opens a named chunk, making the response chunked first if needed.
    pub fn begin_chunk(&mut self) -> Result<Chunk<'_>, ResponseError> {
        self.expect_phase("begin_chunk", Phase::Open)?;
        self.make_chunked()?;
        Ok(Chunk { response: self, body: BytesMut::new() })
    }

    /// Finishes the response.
    ///
    /// A plain response sends its head and then its body (when not empty); a chunked one
    /// sends the terminating chunk. Framing is not computed here: set `Content-Length`
    /// before ending a plain response on a persistent connection.
    pub fn end(&mut self) -> Result<(), ResponseError> {
        self.expect_phase("end", Phase::Open)?;
        self.sink("end")?;

        let head = (!self.chunked).then(|| self.head_bytes());
        let body = self.body.split().freeze();
        self.phase = Phase::Ended;

        let sink = self.sink("end")?;
        match head {
            Some(head) => {
                sink.on_head(head)?;
                if !body.is_empty() {
                    sink.on_body(body)?;
                }
            }
            None => sink.on_chunk(Bytes::from_static(LAST_CHUNK))?,
        }
        sink.on_end()?;
        Ok(())
    }

    /// The status line and header block as they would be sent now.
    pub fn head_bytes(&self) -> Bytes {
        let mut dst = BytesMut::new();
        encode_head(self.status, &self.reason, &self.headers, &mut dst);
        dst.freeze()
    }

    /// The whole response as it would be sent by `end`. Only the head for a chunked
    /// response; its chunks format themselves.
    pub fn to_http(&self) -> Bytes {
        let mut dst = BytesMut::new();
        encode_head(self.status, &self.reason, &self.headers, &mut dst);
        if !self.chunked {
            dst.extend_from_slice(&self.body);
        }
        dst.freeze()
    }

    fn expect_phase(&self, operation: &'static str, expected: Phase) -> Result<(), ResponseError> {
        ensure!(self.phase == expected, ResponseError::invalid_phase(operation, self.phase));
        Ok(())
    }

    fn sink(&mut self, operation: &'static str) -> Result<&mut (dyn ResponseSink + 'static), ResponseError> {
        self.sink.as_deref_mut().ok_or(ResponseError::MissingSink { operation })
    }
}

/// One frame of a chunked response, buffered until [`end`](Chunk::end).
///
/// A chunk borrows its response, so the response cannot be ended while a chunk is open.
/// Dropping a chunk without ending it sends nothing.
#[derive(Debug)]
pub struct Chunk<'r> {
    response: &'r mut Response,
    body: BytesMut,
}

impl Chunk<'_> {
    pub fn write(&mut self, data: impl AsRef<[u8]>) -> &mut Self {
        self.body.extend_from_slice(data.as_ref());
        self
    }

    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// `<hex-len>\r\n<payload>\r\n`, or nothing for an empty chunk.
    pub fn to_http(&self) -> Bytes {
        let mut dst = BytesMut::new();
        encode_chunk(&self.body, &mut dst);
        dst.freeze()
    }

    /// Sends the chunk. An empty chunk is skipped, since the peer would read it as the
    /// end of the body.
    pub fn end(self) -> Result<(), ResponseError> {
        if self.body.is_empty() {
            return Ok(());
        }

        let frame = self.to_http();
        self.response.sink("chunk end")?.on_chunk(frame)?;
        Ok(())
    }
}
