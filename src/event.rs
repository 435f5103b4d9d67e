//! Representation of SSE events based primarily off <https://html.spec.whatwg.org/multipage/server-sent-events.html>

use core::{fmt, str::Utf8Error, time::Duration};

use bytes::{BufMut, Bytes, BytesMut};
use bytes_utils::Str;

use crate::constants::{
    CR, EMPTY_STR, FIELD_DATA, FIELD_EVENT, FIELD_ID, FIELD_RETRY, LF, MESSAGE, SPACE,
};

/// A single dispatched event.
///
/// Every field holds exactly what the server sent inside one event block, nothing is carried over from earlier blocks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    /// `id` field, [None] if the block had no `id` line. `Some("")` is a literal empty id.
    pub id: Option<Str>,
    /// `event` field exactly as sent, empty if the block had none
    pub event: Str,
    /// Server requested reconnection delay
    pub retry: Option<Duration>,
    /// `data` lines joined with a single LF. Encoding splits lines on LF only, a bare CR is written as is and a reader
    /// will take it as a line break.
    pub data: Bytes,
}

impl Default for Event {
    fn default() -> Self {
        Self {
            id: None,
            event: EMPTY_STR,
            retry: None,
            data: Bytes::new(),
        }
    }
}

impl Event {
    /// Plain `message` event carrying `data`
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<Str>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_event(mut self, event: impl Into<Str>) -> Self {
        self.event = event.into();
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = Some(retry);
        self
    }

    /// The logical event type, `"message"` when no `event` field was sent
    pub fn event_type(&self) -> &str {
        if self.event.is_empty() {
            MESSAGE
        } else {
            &self.event
        }
    }

    /// View the payload as UTF-8
    pub fn data_str(&self) -> Result<&str, Utf8Error> {
        core::str::from_utf8(&self.data)
    }

    /// Number of bytes [Event::encode] will write
    pub fn encoded_len(&self) -> usize {
        let mut len = 0;
        if let Some(id) = self.encoded_id() {
            len += field_len(FIELD_ID, single_line_len(id));
        }
        if let Some(event) = self.encoded_event() {
            len += field_len(FIELD_EVENT, single_line_len(event));
        }
        if let Some(retry) = self.encoded_retry() {
            len += field_len(FIELD_RETRY, decimal_len(retry));
        }
        for line in self.data.split(|&b| b == LF) {
            len += field_len(FIELD_DATA, line.len());
        }
        len + 1
    }

    /// Serialise into wire format: `id`, `event`, `retry` (each only when meaningful), one `data` line per payload line, then a blank line.
    ///
    /// CR and LF are dropped from `id` and `event`, they can't be represented inside a single field line.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        if let Some(id) = self.encoded_id() {
            put_single_line_field(buf, FIELD_ID, id.as_bytes());
        }
        if let Some(event) = self.encoded_event() {
            put_single_line_field(buf, FIELD_EVENT, event.as_bytes());
        }
        if let Some(retry) = self.encoded_retry() {
            let mut digits = [0u8; 20];
            put_field(buf, FIELD_RETRY, format_decimal(retry, &mut digits));
        }
        for line in self.data.split(|&b| b == LF) {
            put_field(buf, FIELD_DATA, line);
        }
        buf.put_u8(LF);
    }

    /// [Event::encode] into a fresh buffer
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    fn encoded_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| single_line_len(id) > 0)
    }

    fn encoded_event(&self) -> Option<&str> {
        let event: &str = &self.event;
        let is_message = single_line_bytes(event).eq(MESSAGE.bytes());
        (single_line_len(event) > 0 && !is_message).then_some(event)
    }

    fn encoded_retry(&self) -> Option<u64> {
        self.retry
            .map(|retry| u64::try_from(retry.as_millis()).unwrap_or(u64::MAX))
            .filter(|&millis| millis > 0)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.to_bytes();
        for chunk in bytes.utf8_chunks() {
            f.write_str(chunk.valid())?;
            if !chunk.invalid().is_empty() {
                f.write_str("\u{FFFD}")?;
            }
        }
        Ok(())
    }
}

// "name: value\n"
fn field_len(name: &[u8], value_len: usize) -> usize {
    name.len() + 2 + value_len + 1
}

fn put_field<B: BufMut>(buf: &mut B, name: &[u8], value: &[u8]) {
    buf.put_slice(name);
    buf.put_u8(b':');
    buf.put_u8(SPACE);
    buf.put_slice(value);
    buf.put_u8(LF);
}

fn is_line_break(byte: &u8) -> bool {
    matches!(*byte, CR | LF)
}

fn single_line_bytes(value: &str) -> impl Iterator<Item = u8> + '_ {
    value.bytes().filter(|byte| !is_line_break(byte))
}

fn single_line_len(value: &str) -> usize {
    value.len() - value.bytes().filter(is_line_break).count()
}

// same as put_field with CR and LF left out
fn put_single_line_field<B: BufMut>(buf: &mut B, name: &[u8], value: &[u8]) {
    buf.put_slice(name);
    buf.put_u8(b':');
    buf.put_u8(SPACE);
    for segment in value.split(is_line_break) {
        buf.put_slice(segment);
    }
    buf.put_u8(LF);
}

fn format_decimal(mut value: u64, digits: &mut [u8; 20]) -> &[u8] {
    let mut start = digits.len();
    loop {
        start -= 1;
        digits[start] = b'0' + (value % 10) as u8;
        value /= 10;
        if value == 0 {
            break;
        }
    }
    &digits[start..]
}

fn decimal_len(value: u64) -> usize {
    value.checked_ilog10().map_or(1, |log| log as usize + 1)
}
