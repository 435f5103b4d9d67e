//! Emitting events onto an open response body

use std::io::{self, Write};

use bytes::BytesMut;

use crate::{constants::LF, event::Event};

/// Writes events in wire format to `W`, flushing after each one so the peer sees it straight away.
///
/// Servers using this should send the response with a `Content-Type` of [`TEXT_EVENT_STREAM`][crate::TEXT_EVENT_STREAM].
/// Flushing goes through [`Write::flush`], which is a no-op for sinks that don't buffer.
#[derive(Debug)]
pub struct EventWriter<W> {
    inner: W,
    buf: BytesMut,
}

impl<W: Write> EventWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: BytesMut::new(),
        }
    }

    /// Serialises `event` and writes it out. Errors from the sink are returned as is, a partially written event is
    /// not retried.
    pub fn write(&mut self, event: &Event) -> io::Result<()> {
        self.buf.clear();
        self.buf.reserve(event.encoded_len());
        event.encode(&mut self.buf);
        self.inner.write_all(&self.buf)?;
        self.inner.flush()
    }

    /// Writes a comment line, handy as a keep-alive. Line breaks in `comment` start a new comment line.
    pub fn write_comment(&mut self, comment: &str) -> io::Result<()> {
        self.buf.clear();
        for line in crate::parser::lines(comment.as_bytes()) {
            self.buf.extend_from_slice(b": ");
            self.buf.extend_from_slice(line);
            self.buf.extend_from_slice(&[LF]);
        }
        if self.buf.is_empty() {
            self.buf.extend_from_slice(b":\n");
        }
        self.inner.write_all(&self.buf)?;
        self.inner.flush()
    }
}

impl<W> EventWriter<W> {
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
