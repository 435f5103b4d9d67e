use core::{
    pin::Pin,
    task::{Context, Poll, ready},
};

use ::bytes::BytesMut;
use bytes_utils::Str;
use futures_core::Stream;

use crate::{
    constants::EMPTY_STR, errors::EventStreamError, event::Event, event_stream::Decoder,
};

pin_project_lite::pin_project! {
    /// [`Stream`][futures_core::Stream] that converts a stream of byte chunks into [`Event`][crate::event::Event]s
    #[project = EventStreamProjection]
    #[derive(Debug)]
    pub struct EventStream<S> {
        #[pin]
        stream: S,
        decoder: Decoder,
        last_event_id: Str,
    }
}

impl<S> EventStream<S> {
    /// Create a new [`EventStream`] from a stream of [`AsRef<[u8]>`][AsRef]
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: Decoder::default(),
            last_event_id: EMPTY_STR,
        }
    }

    /// Set the last event id, useful for resumability
    pub fn set_last_event_id(&mut self, id: impl Into<Str>) {
        self.last_event_id = id.into()
    }

    /// Last non-empty id given out by this stream, or whatever was set with [EventStream::set_last_event_id]
    pub fn last_event_id(&self) -> &Str {
        &self.last_event_id
    }

    /// Take the current buffer from the [EventStream], useful if you want to check for leftovers
    pub fn take_buffer(self) -> BytesMut {
        self.decoder.take_buffer()
    }
}

impl<S, E, B> Stream for EventStream<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    type Item = Result<Event, EventStreamError<E>>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<<Self as Stream>::Item>> {
        let mut this = self.project();

        loop {
            // drain what we already have before touching the underlying stream, one event per poll
            let event = match this.decoder.next_event() {
                Some(event) => event,
                None if this.decoder.is_terminated() => return Poll::Ready(None),
                None => match ready!(this.stream.as_mut().poll_next(cx)) {
                    Some(Ok(bytes)) => {
                        this.decoder.push(bytes.as_ref());
                        continue;
                    }
                    Some(Err(e)) => return Poll::Ready(Some(Err(EventStreamError::Transport(e)))),
                    None => match this.decoder.finish() {
                        Some(event) => event,
                        None => continue,
                    },
                },
            };

            if let Some(id) = event.id.as_ref().filter(|id| !id.is_empty()) {
                *this.last_event_id = id.clone();
            }
            return Poll::Ready(Some(Ok(event)));
        }
    }
}
