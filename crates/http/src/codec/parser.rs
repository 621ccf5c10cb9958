//! The incremental request parser.
//!
//! [`ByteParser`] is fed arbitrary slices of a connection's byte stream and reports what
//! it recognized to a [`ParseHandler`]. It keeps only the state needed to resume: the
//! unfinished head and the body decoder. Parsing stops after each complete message so
//! the caller can hand the request off before the next one starts.

use bytes::BytesMut;
use tracing::trace;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::{MAX_HEADER_BYTES, MessageHead, decode_head};
use crate::protocol::ParseError;

/// Receives the pieces of a request as the parser recognizes them.
///
/// Fragment callbacks may be called several times for one logical value; implementations
/// concatenate them. Returning an error stops the parser.
pub trait ParseHandler {
    fn on_message_begin(&mut self);

    fn on_url(&mut self, url: &[u8]) -> Result<(), ParseError>;

    fn on_header_field(&mut self, name: &[u8]) -> Result<(), ParseError>;

    fn on_header_value(&mut self, value: &[u8]) -> Result<(), ParseError>;

    fn on_headers_complete(&mut self, head: &MessageHead) -> Result<(), ParseError>;

    fn on_body(&mut self, data: &[u8]);

    fn on_message_complete(&mut self, head: &MessageHead);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParseStatus {
    /// Every byte was consumed and the current message is still incomplete.
    NeedMore,
    /// One message completed; bytes after `consumed` belong to the next one.
    MessageComplete,
    /// A protocol switch was requested; bytes after `consumed` are not HTTP.
    Upgrade,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Progress {
    pub consumed: usize,
    pub status: ParseStatus,
}

impl Progress {
    fn new(consumed: usize, status: ParseStatus) -> Self {
        Self { consumed, status }
    }
}

#[derive(Debug)]
enum State {
    /// Between messages; empty lines are skipped here.
    Idle,
    Head,
    Body { head: MessageHead, decoder: PayloadDecoder },
    Failed,
}

#[derive(Debug)]
pub struct ByteParser {
    state: State,
    head_buf: BytesMut,
    #[cfg(test)]
    head_decodes: usize,
}

impl Default for ByteParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteParser {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            head_buf: BytesMut::new(),
            #[cfg(test)]
            head_decodes: 0,
        }
    }

    /// Whether the parser is between two messages.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, State::Failed)
    }

    /// Forgets a partially parsed message and any previous failure.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.head_buf.clear();
    }

    /// Parses `data`, stopping at the end of the first message that completes.
    ///
    /// After an error the parser stays failed and every further call returns
    /// [`ParseError::Stopped`] until [`reset`](Self::reset).
    pub fn execute<H: ParseHandler>(&mut self, data: &[u8], handler: &mut H) -> Result<Progress, ParseError> {
        match self.execute_inner(data, handler) {
            Ok(progress) => Ok(progress),
            Err(e) => {
                if !matches!(e, ParseError::Stopped) {
                    trace!(cause = %e, "parser stopped");
                }
                self.state = State::Failed;
                self.head_buf.clear();
                Err(e)
            }
        }
    }

    fn execute_inner<H: ParseHandler>(&mut self, data: &[u8], handler: &mut H) -> Result<Progress, ParseError> {
        let mut offset = 0;
        loop {
            match &mut self.state {
                State::Failed => return Err(ParseError::Stopped),

                State::Idle => {
                    while offset < data.len() && matches!(data[offset], b'\r' | b'\n') {
                        offset += 1;
                    }
                    if offset == data.len() {
                        return Ok(Progress::new(offset, ParseStatus::NeedMore));
                    }

                    handler.on_message_begin();
                    self.head_buf.clear();
                    self.state = State::Head;
                }

                State::Head => {
                    let before = self.head_buf.len();
                    // one byte over the limit is enough to tell an oversized head apart
                    let take = (data.len() - offset).min((MAX_HEADER_BYTES + 1).saturating_sub(before));
                    let appended = &data[offset..offset + take];
                    self.head_buf.extend_from_slice(appended);

                    // a head only ends on a line feed, and only an oversized one fails without it
                    if !appended.contains(&b'\n') && self.head_buf.len() <= MAX_HEADER_BYTES {
                        offset += take;
                        return Ok(Progress::new(offset, ParseStatus::NeedMore));
                    }

                    #[cfg(test)]
                    {
                        self.head_decodes += 1;
                    }
                    let Some((head_len, head)) = decode_head(&self.head_buf, handler)? else {
                        offset += take;
                        return Ok(Progress::new(offset, ParseStatus::NeedMore));
                    };

                    offset += head_len - before;
                    self.head_buf.clear();
                    handler.on_headers_complete(&head)?;

                    if head.upgrade {
                        handler.on_message_complete(&head);
                        self.state = State::Idle;
                        return Ok(Progress::new(offset, ParseStatus::Upgrade));
                    }

                    if head.payload.is_empty() {
                        handler.on_message_complete(&head);
                        self.state = State::Idle;
                        return Ok(Progress::new(offset, ParseStatus::MessageComplete));
                    }

                    let decoder = PayloadDecoder::from(head.payload);
                    self.state = State::Body { head, decoder };
                }

                State::Body { head, decoder } => {
                    let (consumed, finished) = decoder.decode(&data[offset..], |chunk| handler.on_body(chunk))?;
                    offset += consumed;

                    if !finished {
                        return Ok(Progress::new(offset, ParseStatus::NeedMore));
                    }

                    handler.on_message_complete(head);
                    self.state = State::Idle;
                    return Ok(Progress::new(offset, ParseStatus::MessageComplete));
                }
            }
        }
    }
}
