use bytes_utils::Str;

pub(crate) const LF: u8 = b'\n';
pub(crate) const CR: u8 = b'\r';
pub(crate) const COLON: u8 = b':';
pub(crate) const SPACE: u8 = b' ';

const BOM_CHAR: char = '\u{FEFF}';
const BOM_LEN: usize = BOM_CHAR.len_utf8();
// bom           = %xFEFF ; U+FEFF BYTE ORDER MARK
pub(crate) const BOM: &[u8; BOM_LEN] = &{
    let mut buf = [0u8; BOM_LEN];
    BOM_CHAR.encode_utf8(&mut buf);
    buf
};

pub(crate) const EMPTY_STR: Str = Str::from_static("");
pub(crate) const MESSAGE: &str = "message";

// field names, both for parsing and encoding
pub(crate) const FIELD_EVENT: &[u8] = b"event";
pub(crate) const FIELD_DATA: &[u8] = b"data";
pub(crate) const FIELD_ID: &[u8] = b"id";
pub(crate) const FIELD_RETRY: &[u8] = b"retry";

/// Media type every SSE response has to declare
pub const TEXT_EVENT_STREAM: &str = "text/event-stream";

/// Name of the resume header as the SSE standard spells it. Note this is not the canonical HTTP casing ("Last-Event-Id").
pub const LAST_EVENT_ID: &str = "Last-Event-ID";
