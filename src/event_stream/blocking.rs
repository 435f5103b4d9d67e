//! Blocking parsing over [`std::io::Read`].
//!
//! Reading is driven by the consumer: nothing is read from the source until the previous event has been handed over,
//! so a slow callback slows down the reads instead of piling up events.

use std::io::{self, ErrorKind, Read};

use crate::{event::Event, event_stream::Decoder};

const CHUNK_SIZE: usize = 8 * 1024;

/// [`Iterator`] over the events read from `R`. Ends after end of input or the first read error.
#[derive(Debug)]
pub struct EventReader<R> {
    reader: R,
    decoder: Decoder,
    chunk: Box<[u8]>,
}

impl<R> EventReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            decoder: Decoder::default(),
            chunk: vec![0; CHUNK_SIZE].into_boxed_slice(),
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Iterator for EventReader<R> {
    type Item = io::Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.decoder.next_event() {
                return Some(Ok(event));
            }
            if self.decoder.is_terminated() {
                return None;
            }

            match self.reader.read(&mut self.chunk) {
                Ok(0) => {
                    if let Some(event) = self.decoder.finish() {
                        return Some(Ok(event));
                    }
                }
                Ok(read) => self.decoder.push(&self.chunk[..read]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    // whatever is half parsed can never complete now
                    self.decoder = Decoder::default();
                    self.decoder.finish();
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Reads `reader` to the end, calling `on_event` for every complete event in arrival order.
///
/// Returns once the reader is exhausted; a block that is cut off by the end of input is dropped. The only error is a
/// read error from `reader`, events dispatched before it have already been handed to `on_event`.
pub fn parse<R: Read>(reader: R, mut on_event: impl FnMut(Event)) -> io::Result<()> {
    for event in EventReader::new(reader) {
        on_event(event?);
    }
    Ok(())
}
