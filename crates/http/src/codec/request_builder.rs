//! Turns a connection's byte stream into [`Request`]s.
//!
//! A [`RequestBuilder`] lives as long as its connection. Each [`feed`](RequestBuilder::feed)
//! runs the [`ByteParser`] over the new bytes and assembles the parse events into the
//! request in progress. Bytes past the end of a completed message are kept and parsed by
//! the next `feed`, so pipelined requests come out one at a time.

use std::mem;

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::codec::header::header_value;
use crate::codec::{ByteParser, MessageHead, ParseHandler, ParseStatus};
use crate::ensure;
use crate::protocol::{ParseError, Request};

/// The outcome of one [`RequestBuilder::feed`] call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Feed {
    /// The bytes were consumed but no message is complete yet.
    NeedMore,
    /// A request is complete and available through [`RequestBuilder::take_request`].
    Complete,
    /// A request asking to switch protocols is complete; the bytes after it are
    /// available through [`RequestBuilder::take_upgrade_remainder`].
    UpgradeComplete,
}

#[derive(Debug)]
pub struct RequestBuilder {
    parser: ByteParser,
    context: ParseContext,
    pending: BytesMut,
    upgrade_remainder: Option<Bytes>,
    upgraded: bool,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            parser: ByteParser::new(),
            context: ParseContext::default(),
            pending: BytesMut::new(),
            upgrade_remainder: None,
            upgraded: false,
        }
    }

    /// Parses `data` after any bytes left over from the previous call.
    ///
    /// Stops at the end of the first complete message. Calling `feed` again after
    /// [`Feed::Complete`] drops the completed request and starts on the next one, so take
    /// it first. Once a message failed to parse or switched protocols, every call returns
    /// [`ParseError::Stopped`].
    pub fn feed(&mut self, data: &[u8]) -> Result<Feed, ParseError> {
        ensure!(!self.upgraded, ParseError::Stopped);

        if self.context.done {
            self.context.reset();
        }

        let buffered;
        let input: &[u8] = if self.pending.is_empty() {
            data
        } else {
            self.pending.extend_from_slice(data);
            buffered = self.pending.split();
            &buffered
        };

        let progress = self.parser.execute(input, &mut self.context)?;
        let rest = &input[progress.consumed..];

        match progress.status {
            ParseStatus::NeedMore => {
                ensure!(rest.is_empty(), ParseError::TrailingBytes { unconsumed: rest.len() });
                Ok(Feed::NeedMore)
            }
            ParseStatus::MessageComplete => {
                if !rest.is_empty() {
                    trace!(pending = rest.len(), "keeping bytes of the next message");
                    self.pending.extend_from_slice(rest);
                }
                Ok(Feed::Complete)
            }
            ParseStatus::Upgrade => {
                trace!(remainder = rest.len(), "request switches protocols");
                self.upgraded = true;
                self.upgrade_remainder = Some(Bytes::copy_from_slice(rest));
                Ok(Feed::UpgradeComplete)
            }
        }
    }

    /// Whether bytes of a following message are waiting to be parsed by `feed(&[])`.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// The request completed by the last `feed`, if it was not taken yet.
    pub fn request(&self) -> Option<&Request> {
        self.context.complete.as_ref()
    }

    pub fn take_request(&mut self) -> Option<Request> {
        self.context.complete.take()
    }

    /// The bytes that followed an upgrade request in the same `feed`.
    pub fn take_upgrade_remainder(&mut self) -> Option<Bytes> {
        self.upgrade_remainder.take()
    }

    /// Returns `true` once when the head of a message with a pending body asked for
    /// `100 Continue`.
    pub fn take_expect_continue(&mut self) -> bool {
        mem::take(&mut self.context.expect_continue)
    }

    pub fn is_upgraded(&self) -> bool {
        self.upgraded
    }

    /// Whether a message has started but is not complete yet.
    pub fn is_partial(&self) -> bool {
        !self.parser.is_idle() && !self.parser.is_failed()
    }
}

/// Per-connection accumulator driven by the parser's events.
#[derive(Debug, Default)]
struct ParseContext {
    request: Request,
    url: Vec<u8>,
    field: Vec<u8>,
    value: Vec<u8>,
    reading_value: bool,
    body: BytesMut,
    expect_continue: bool,
    done: bool,
    complete: Option<Request>,
}

impl ParseContext {
    fn reset(&mut self) {
        self.request = Request::default();
        self.url.clear();
        self.field.clear();
        self.value.clear();
        self.reading_value = false;
        self.body.clear();
        self.expect_continue = false;
        self.done = false;
        self.complete = None;
    }

    fn commit_header(&mut self) -> Result<(), ParseError> {
        let name = String::from_utf8(mem::take(&mut self.field)).map_err(|_| ParseError::invalid_header("header name is not utf-8"))?;
        let value = header_value(&self.value)?;
        self.request.headers.append(name, value);

        self.value.clear();
        self.reading_value = false;
        Ok(())
    }
}

impl ParseHandler for ParseContext {
    fn on_message_begin(&mut self) {
        self.reset();
    }

    fn on_url(&mut self, url: &[u8]) -> Result<(), ParseError> {
        self.url.extend_from_slice(url);
        Ok(())
    }

    fn on_header_field(&mut self, name: &[u8]) -> Result<(), ParseError> {
        if self.reading_value {
            self.commit_header()?;
        }
        self.field.extend_from_slice(name);
        Ok(())
    }

    fn on_header_value(&mut self, value: &[u8]) -> Result<(), ParseError> {
        self.value.extend_from_slice(value);
        self.reading_value = true;
        Ok(())
    }

    fn on_headers_complete(&mut self, head: &MessageHead) -> Result<(), ParseError> {
        if self.reading_value || !self.field.is_empty() {
            self.commit_header()?;
        }

        self.request.url = String::from_utf8(mem::take(&mut self.url)).map_err(|_| ParseError::InvalidUri)?;
        self.request.version = head.version;
        self.expect_continue = head.expect_continue && !head.payload.is_empty() && !head.upgrade;
        Ok(())
    }

    fn on_body(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }

    fn on_message_complete(&mut self, head: &MessageHead) {
        let mut request = mem::take(&mut self.request);
        request.method = head.method.clone();
        request.upgrade = head.upgrade;
        request.body = self.body.split().freeze();

        self.expect_continue = false;
        self.complete = Some(request);
        self.done = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, Version};
    use indoc::indoc;

    const CURL_POST: &str = indoc! {"
    POST /submit?x=1 HTTP/1.1\r
    Host: 127.0.0.1:8080\r
    User-Agent: curl/7.79.1\r
    Accept: */*\r
    Cookie: a=1\r
    Cookie: b=2\r
    Content-Length: 11\r
    \r
    hello world"};

    fn feed_all(builder: &mut RequestBuilder, parts: &[&[u8]]) -> Vec<Feed> {
        parts.iter().map(|part| builder.feed(part).unwrap()).collect()
    }

    #[test]
    fn byte_by_byte_completes_once() {
        let src = b"GET /x HTTP/1.1\r\nHost: a\r\n\r\n";
        let mut builder = RequestBuilder::new();

        for (index, byte) in src.iter().enumerate() {
            let feed = builder.feed(std::slice::from_ref(byte)).unwrap();
            if index == src.len() - 1 {
                assert_eq!(feed, Feed::Complete);
            } else {
                assert_eq!(feed, Feed::NeedMore, "byte {index}");
            }
        }

        let request = builder.take_request().unwrap();
        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.url(), "/x");
        assert_eq!(request.version(), Version::HTTP_11);
        assert_eq!(request.header("host").unwrap(), "a");
        assert!(request.body().is_empty());
    }

    #[test]
    fn partitions_build_identical_requests() {
        let src = CURL_POST.as_bytes();

        let mut builder = RequestBuilder::new();
        assert_eq!(builder.feed(src).unwrap(), Feed::Complete);
        let whole = builder.take_request().unwrap();

        assert_eq!(whole.url(), "/submit?x=1");
        assert_eq!(whole.headers_all("cookie").count(), 2);
        assert_eq!(&whole.body()[..], b"hello world");

        for split in [1, 7, 30, 60, src.len() - 11, src.len() - 1] {
            let mut builder = RequestBuilder::new();
            let feeds = feed_all(&mut builder, &[&src[..split], &src[split..]]);
            assert_eq!(feeds, vec![Feed::NeedMore, Feed::Complete], "split at {split}");
            assert_eq!(builder.take_request().unwrap(), whole, "split at {split}");
        }

        let mut builder = RequestBuilder::new();
        let parts = src.chunks(3).collect::<Vec<_>>();
        let feeds = feed_all(&mut builder, &parts);
        assert_eq!(feeds.last(), Some(&Feed::Complete));
        assert_eq!(feeds.iter().filter(|feed| **feed == Feed::Complete).count(), 1);
        assert_eq!(builder.take_request().unwrap(), whole);
    }

    #[test]
    fn pipelined_requests_are_isolated() {
        let src = b"GET /a HTTP/1.1\r\nX-A: 1\r\n\r\nPOST /b HTTP/1.1\r\nContent-Length: 2\r\n\r\nhi";
        let mut builder = RequestBuilder::new();

        assert_eq!(builder.feed(src).unwrap(), Feed::Complete);
        assert!(builder.has_pending());
        let first = builder.take_request().unwrap();

        assert_eq!(builder.feed(&[]).unwrap(), Feed::Complete);
        assert!(!builder.has_pending());
        let second = builder.take_request().unwrap();

        assert_eq!(first.url(), "/a");
        assert_eq!(first.header("x-a").unwrap(), "1");
        assert!(first.body().is_empty());

        assert_eq!(second.method(), &Method::POST);
        assert_eq!(second.url(), "/b");
        assert!(second.header("x-a").is_none());
        assert_eq!(&second.body()[..], b"hi");
    }

    #[test]
    fn feed_after_complete_starts_over() {
        let mut builder = RequestBuilder::new();

        assert_eq!(builder.feed(b"GET /a HTTP/1.1\r\n\r\n").unwrap(), Feed::Complete);
        assert!(builder.request().is_some());

        assert_eq!(builder.feed(b"GET /b HTTP/1.1\r\n").unwrap(), Feed::NeedMore);
        assert!(builder.request().is_none());
        assert!(builder.is_partial());

        assert_eq!(builder.feed(b"\r\n").unwrap(), Feed::Complete);
        assert_eq!(builder.request().unwrap().url(), "/b");
    }

    #[test]
    fn malformed_request_line() {
        let mut builder = RequestBuilder::new();

        assert!(builder.feed(b"NOT A VALID REQUEST\r\n\r\n").is_err());
        assert!(builder.request().is_none());
        assert!(matches!(builder.feed(b"GET / HTTP/1.1\r\n\r\n"), Err(ParseError::Stopped)));
    }

    #[test]
    fn upgrade_hands_off_remainder() {
        let src = indoc! {"
        GET /chat HTTP/1.1\r
        Host: server.example.com\r
        Upgrade: websocket\r
        Connection: Upgrade\r
        \r
        raw frames"};
        let mut builder = RequestBuilder::new();

        assert_eq!(builder.feed(src.as_bytes()).unwrap(), Feed::UpgradeComplete);
        assert!(builder.request().unwrap().is_upgrade());
        assert_eq!(builder.take_upgrade_remainder().unwrap(), Bytes::from_static(b"raw frames"));
        assert!(builder.is_upgraded());
        assert!(matches!(builder.feed(b"GET / HTTP/1.1\r\n\r\n"), Err(ParseError::Stopped)));
    }

    #[test]
    fn chunked_body_is_assembled() {
        let src = indoc! {"
        POST /upload HTTP/1.1\r
        Transfer-Encoding: chunked\r
        \r
        4\r
        Wiki\r
        5\r
        pedia\r
        0\r
        \r
        "};
        let mut builder = RequestBuilder::new();

        let feeds = feed_all(&mut builder, &src.as_bytes().chunks(5).collect::<Vec<_>>());

        assert_eq!(feeds.last(), Some(&Feed::Complete));
        assert_eq!(&builder.take_request().unwrap().body()[..], b"Wikipedia");
    }

    #[test]
    fn expect_continue_is_reported_once() {
        let mut builder = RequestBuilder::new();

        let head = b"PUT /file HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 4\r\n\r\n";
        assert_eq!(builder.feed(head).unwrap(), Feed::NeedMore);
        assert!(builder.take_expect_continue());
        assert!(!builder.take_expect_continue());

        assert_eq!(builder.feed(b"data").unwrap(), Feed::Complete);
        assert!(builder.request().unwrap().expects_continue());
    }

    #[test]
    fn invalid_header_value() {
        let mut builder = RequestBuilder::new();
        let result = builder.feed(b"GET / HTTP/1.1\r\nX-Bin: \x7f\r\n\r\n");
        assert!(result.is_err());
    }
}
