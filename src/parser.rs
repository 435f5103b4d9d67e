//! Line level parser for SSE, works on raw bytes and never fails

use bytes::Bytes;

use crate::constants::{COLON, CR, FIELD_DATA, FIELD_EVENT, FIELD_ID, FIELD_RETRY, LF, SPACE};

/// A full line from an SSE stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventLine<'a> {
    Comment,
    Field {
        field_name: &'a [u8],
        /// [None] when the line had no colon at all
        field_value: Option<&'a [u8]>,
    },
    Empty,
}

/// Full line from an SSE stream, owned version of [RawEventLine]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEventLineOwned {
    Comment,
    Empty,
    Field {
        field_name: Bytes,
        field_value: Option<Bytes>,
    },
}

/// Field names that mean something to the event assembler, everything else lands in [FieldName::Ignored]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldName {
    Event,
    Data,
    Id,
    Retry,
    Ignored,
}

impl FieldName {
    pub fn classify(name: &[u8]) -> Self {
        match name {
            FIELD_EVENT => FieldName::Event,
            FIELD_DATA => FieldName::Data,
            FIELD_ID => FieldName::Id,
            FIELD_RETRY => FieldName::Retry,
            _ => FieldName::Ignored,
        }
    }
}

impl RawEventLine<'_> {
    pub fn field_name(&self) -> Option<FieldName> {
        match self {
            RawEventLine::Field { field_name, .. } => Some(FieldName::classify(field_name)),
            _ => None,
        }
    }
}

/// Splits a slice at the next EOL bytes, returns a tuple where the first value is the non-inclusive end of the line and the second value is the inclusive start of the remainder.
/// Returns [None] if no EOL byte is found, or the slice ends in a CR that may still turn out to be a CRLF.
fn find_eol(bytes: &[u8]) -> Option<(usize, usize)> {
    let first_match = memchr::memchr2(CR, LF, bytes)?;

    match bytes.get(first_match + 1) {
        _ if bytes[first_match] == LF => Some((first_match, first_match + 1)),
        Some(&LF) => Some((first_match, first_match + 2)),
        Some(_) => Some((first_match, first_match + 1)),
        None => None,
    }
}

/// Offset of the value within a line that has a colon at `colon_pos`, skips one optional space
fn value_start(line: &[u8], colon_pos: usize) -> usize {
    match line.get(colon_pos + 1) {
        Some(&SPACE) => colon_pos + 2,
        _ => colon_pos + 1,
    }
}

/// Interprets a single line with its terminator already removed
pub fn read_line(bytes: &[u8]) -> RawEventLine<'_> {
    if bytes.is_empty() {
        return RawEventLine::Empty;
    }

    match memchr::memchr(COLON, bytes) {
        Some(0) => RawEventLine::Comment,
        Some(colon_pos) => RawEventLine::Field {
            field_name: &bytes[..colon_pos],
            field_value: Some(&bytes[value_start(bytes, colon_pos)..]),
        },
        None => RawEventLine::Field {
            field_name: bytes,
            field_value: None,
        },
    }
}

/// Owned variant of [read_line], slices `line` instead of copying
pub fn read_line_owned(line: Bytes) -> RawEventLineOwned {
    if line.is_empty() {
        return RawEventLineOwned::Empty;
    }

    match memchr::memchr(COLON, &line) {
        Some(0) => RawEventLineOwned::Comment,
        Some(colon_pos) => RawEventLineOwned::Field {
            field_name: line.slice(..colon_pos),
            field_value: Some(line.slice(value_start(&line, colon_pos)..)),
        },
        None => RawEventLineOwned::Field {
            field_name: line,
            field_value: None,
        },
    }
}

/// Tries to read the next [RawEventLine] from `bytes`. Returns [None] if `bytes` contains no complete EOL, this includes a slice ending in just cr as we are not yet sure if it's crlf or just a lone cr.
pub fn parse_line(bytes: &[u8]) -> Option<(RawEventLine<'_>, &[u8])> {
    let (line_end, rem_start) = find_eol(bytes)?;
    Some((read_line(&bytes[..line_end]), &bytes[rem_start..]))
}

/// Iterator over the lines of a complete, in-memory SSE body.
///
/// Unlike [parse_line] this knows there is no more data coming, so a trailing lone CR terminates its line and a final unterminated fragment is still yielded.
pub fn lines(bytes: &[u8]) -> Lines<'_> {
    Lines {
        rest: Some(bytes).filter(|bytes| !bytes.is_empty()),
    }
}

#[derive(Debug, Clone)]
pub struct Lines<'a> {
    rest: Option<&'a [u8]>,
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest?;
        match memchr::memchr2(CR, LF, rest) {
            Some(pos) => {
                let skip = if rest[pos] == CR && rest.get(pos + 1) == Some(&LF) {
                    2
                } else {
                    1
                };
                self.rest = Some(&rest[pos + skip..]).filter(|r| !r.is_empty());
                Some(&rest[..pos])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}
