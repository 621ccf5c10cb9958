use bytes::Bytes;
use http::{HeaderValue, Method, Version};

use crate::protocol::HeaderList;

/// A fully parsed HTTP request.
///
/// A `Request` is assembled field by field by the [`RequestBuilder`](crate::codec::RequestBuilder)
/// and never changes after the parser reports the message complete. Handlers receive it
/// behind an `Arc`, so it can be kept around after the response was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) version: Version,
    pub(crate) headers: HeaderList,
    pub(crate) body: Bytes,
    pub(crate) upgrade: bool,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            method: Method::GET,
            url: String::new(),
            version: Version::HTTP_11,
            headers: HeaderList::new(),
            body: Bytes::new(),
            upgrade: false,
        }
    }
}

impl Request {
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request target exactly as it appeared on the request line.
    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    #[inline]
    pub fn headers(&self) -> &HeaderList {
        &self.headers
    }

    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Whether the request asked to switch protocols (`Upgrade` or `CONNECT`).
    #[inline]
    pub fn is_upgrade(&self) -> bool {
        self.upgrade
    }

    /// The first value of `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    pub fn header_last(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get_last(name)
    }

    pub fn headers_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a HeaderValue> + 'a {
        self.headers.get_all(name)
    }

    /// Whether the connection stays open after this request is answered.
    ///
    /// HTTP/1.1 is persistent unless the client sent `Connection: close`; HTTP/1.0 only
    /// when it sent `Connection: keep-alive`.
    pub fn keep_alive(&self) -> bool {
        match self.version {
            Version::HTTP_10 => self.headers.contains_token("connection", "keep-alive"),
            _ => !self.headers.contains_token("connection", "close"),
        }
    }

    /// Whether the client waits for `100 Continue` before sending the body.
    pub fn expects_continue(&self) -> bool {
        self.version >= Version::HTTP_11
            && self.headers.get("expect").is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"100-continue"))
    }
}
