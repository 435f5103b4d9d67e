//! Event assembly: turns a sequence of byte chunks into [`Event`]s.
//!
//! [`generic::EventStream`] drives this from an async [`Stream`][futures_core::Stream] of chunks, and with the `std` feature
//! [`blocking::EventReader`] drives it from a [`std::io::Read`].

use alloc::string::String;
use core::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use bytes_utils::Str;

use crate::{
    constants::{BOM, CR, EMPTY_STR, LF},
    event::Event,
    parser::{FieldName, RawEventLineOwned, read_line_owned},
};

#[cfg(feature = "std")]
pub mod blocking;
pub mod generic;

/// Accumulated `data` lines.
///
/// Most events carry a single `data:` line, so the first value is kept as shared [`Bytes`] and only copied into a
/// mutable buffer once a second non-empty line shows up.
#[derive(Debug, Default, Clone)]
enum DataBuffer {
    #[default]
    Empty,
    Shared(Bytes),
    Owned(BytesMut),
}

impl DataBuffer {
    fn push(&mut self, value: Bytes) {
        match self {
            Self::Empty => {
                if !value.is_empty() {
                    *self = Self::Shared(value)
                }
            }
            Self::Shared(first) => {
                let mut buf = BytesMut::with_capacity(first.len() + 1 + value.len());
                buf.extend_from_slice(first);
                buf.put_u8(LF);
                buf.extend_from_slice(&value);
                *self = Self::Owned(buf);
            }
            Self::Owned(buf) => {
                buf.put_u8(LF);
                buf.extend_from_slice(&value);
            }
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    fn freeze(self) -> Bytes {
        match self {
            Self::Empty => Bytes::new(),
            Self::Shared(bytes) => bytes,
            Self::Owned(buf) => buf.freeze(),
        }
    }
}

/// Decodes a field value into a [`Str`], replacing invalid UTF-8 rather than failing the stream
fn lossy_str(bytes: Bytes) -> Str {
    match core::str::from_utf8(&bytes) {
        // Safety: we just checked the bytes are valid utf8
        Ok(_) => unsafe { Str::from_inner_unchecked(bytes) },
        Err(_) => Str::from(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

fn parse_retry(value: &[u8]) -> Option<Duration> {
    core::str::from_utf8(value)
        .ok()?
        .parse()
        .ok()
        .map(Duration::from_millis)
}

/// The one in-flight event
#[derive(Debug, Clone)]
pub(crate) struct EventBuilder {
    event: Str,
    id: Option<Str>,
    data: DataBuffer,
    retry: Option<Duration>,
}

impl Default for EventBuilder {
    fn default() -> Self {
        Self {
            event: EMPTY_STR,
            id: None,
            data: DataBuffer::Empty,
            retry: None,
        }
    }
}

impl EventBuilder {
    /// Feeds one line in, returns the finished event when `line` was the blank line ending a block with data
    pub(crate) fn add(&mut self, line: RawEventLineOwned) -> Option<Event> {
        let (field_name, field_value) = match line {
            RawEventLineOwned::Empty => return self.dispatch(),
            RawEventLineOwned::Comment => return None,
            RawEventLineOwned::Field {
                field_name,
                field_value,
            } => (field_name, field_value.unwrap_or_default()),
        };

        match FieldName::classify(&field_name) {
            FieldName::Event => self.event = lossy_str(field_value),
            FieldName::Data => self.data.push(field_value),
            FieldName::Id => self.id = Some(lossy_str(field_value)),
            FieldName::Retry => {
                // a malformed retry is skipped, the rest of the event survives. Zero means no retry.
                if let Some(retry) = parse_retry(&field_value) {
                    self.retry = Some(retry).filter(|retry| !retry.is_zero());
                }
            }
            FieldName::Ignored => (),
        }
        None
    }

    /// Ends the current block. The builder is always reset, blocks without data produce nothing.
    fn dispatch(&mut self) -> Option<Event> {
        let EventBuilder {
            event,
            id,
            data,
            retry,
        } = core::mem::take(self);

        if data.is_empty() {
            return None;
        }

        Some(Event {
            id,
            event,
            retry,
            data: data.freeze(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) enum EventStreamState {
    #[default]
    NotStarted,
    Started,
    Terminated,
}

impl EventStreamState {
    fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }

    fn is_not_started(&self) -> bool {
        matches!(self, Self::NotStarted)
    }
}

/// [None] while `buffer` is too short to tell
fn starts_with_bom(buffer: &[u8]) -> Option<bool> {
    if buffer.len() >= BOM.len() {
        Some(buffer.starts_with(BOM))
    } else if BOM.starts_with(buffer) {
        None
    } else {
        Some(false)
    }
}

/// Incremental tokenizer + event assembler, holds at most one unterminated line and one in-flight event.
#[derive(Debug, Default)]
pub(crate) struct Decoder {
    buffer: BytesMut,
    builder: EventBuilder,
    state: EventStreamState,
    // last chunk ended in CR, a leading LF on the next chunk belongs to that CR
    skip_lf: bool,
}

impl Decoder {
    pub(crate) fn push(&mut self, mut bytes: &[u8]) {
        if bytes.is_empty() || self.state.is_terminated() {
            return;
        }

        if self.skip_lf {
            self.skip_lf = false;
            if bytes[0] == LF {
                bytes = &bytes[1..];
            }
        }

        self.buffer.extend_from_slice(bytes);

        if self.state.is_not_started() {
            match starts_with_bom(&self.buffer) {
                Some(true) => {
                    self.state = EventStreamState::Started;
                    self.buffer.advance(BOM.len());
                }
                Some(false) => self.state = EventStreamState::Started,
                None => (),
            }
        }
    }

    /// Splits the next complete line off the buffer. A CR at the very end of the buffer is taken as a terminator
    /// straight away instead of waiting to see whether an LF follows.
    fn next_line(&mut self) -> Option<Bytes> {
        let line_end = memchr::memchr2(CR, LF, &self.buffer)?;
        let line = self.buffer.split_to(line_end).freeze();

        let terminator_len = match (self.buffer[0], self.buffer.get(1)) {
            (CR, Some(&LF)) => 2,
            (CR, None) => {
                self.skip_lf = true;
                1
            }
            _ => 1,
        };
        self.buffer.advance(terminator_len);

        Some(line)
    }

    /// Next finished event from what has been pushed so far
    pub(crate) fn next_event(&mut self) -> Option<Event> {
        if self.state.is_not_started() {
            return None;
        }

        while let Some(line) = self.next_line() {
            if let Some(event) = self.builder.add(read_line_owned(line)) {
                return Some(event);
            }
        }
        None
    }

    /// Marks the end of input. Complete events still buffered stay available from [`Decoder::next_event`], the trailing
    /// unterminated line is processed but a block that never saw its blank line is dropped.
    pub(crate) fn finish(&mut self) -> Option<Event> {
        if self.state.is_terminated() {
            return None;
        }
        // anything shorter than a BOM at end of input can't be one
        if self.state.is_not_started() {
            self.state = EventStreamState::Started;
        }
        if let Some(event) = self.next_event() {
            return Some(event);
        }

        let rest = self.buffer.split().freeze();
        if !rest.is_empty() {
            // can't be blank so never dispatches
            self.builder.add(read_line_owned(rest));
        }
        self.builder = EventBuilder::default();
        self.state = EventStreamState::Terminated;
        None
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.state.is_terminated()
    }

    pub(crate) fn take_buffer(self) -> BytesMut {
        self.buffer
    }
}
