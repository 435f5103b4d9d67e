//! `no_std`-compatible tools for reading and writing
//! [Server-Sent Events](https://html.spec.whatwg.org/multipage/server-sent-events.html) (SSE).
//!
//! `ssewire` is layered:
//!
//! - [`EventStream`] - a generic [`Stream`][futures_core::Stream] adapter that turns any
//!   `Stream<Item = Result<impl AsRef<[u8]>, E>>` into a stream of parsed [`Event`]s.
//! - [`parse`] and [`EventReader`] (requires `std` feature) - the same parser over a blocking
//!   [`std::io::Read`].
//! - [`EventSource`] and [`subscribe`] (requires `reqwest` feature) - an HTTP client on top of
//!   [`reqwest`] that reconnects after the server closes the stream and resumes with the
//!   `Last-Event-ID` header.
//! - [`EventWriter`] (requires `std` feature) - serialises events onto any [`std::io::Write`],
//!   flushing after each one.
//! - Low-level line parsing via [`parser::parse_line`] for custom integrations.
//!
//! # Subscribing with `reqwest`
//!
//! ```ignore
//! use std::time::Duration;
//!
//! use ssewire::reqwest::{SubscribeOptions, subscribe};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let request = reqwest::Client::new().get("https://example.com/events");
//! let options = SubscribeOptions::new()
//!     .auto_retry(true)
//!     .retry(Duration::from_secs(1));
//!
//! let err = subscribe(request, options, |event, state| {
//!     println!("{} ({}): {}", event.event_type(), state.last_event_id, event);
//! })
//! .await
//! .unwrap_err();
//! eprintln!("subscription ended: {err}");
//! # Ok(())
//! # }
//! ```
//!
//! [`EventSource`] is the same thing as a [`Stream`][futures_core::Stream], it also tells you when a
//! (re)connection has been accepted:
//!
//! ```ignore
//! use futures::StreamExt;
//! use ssewire::{EventSource, reqwest::{StreamEvent, SubscribeOptions}};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let request = reqwest::Client::new().get("https://example.com/events");
//! let mut source = Box::pin(EventSource::new(request, SubscribeOptions::new().auto_retry(true))?);
//!
//! while let Some(result) = source.next().await {
//!     match result {
//!         Ok(StreamEvent::Open) => println!("connected"),
//!         Ok(StreamEvent::Event(evt)) => println!("{}: {:?}", evt.event_type(), evt.data_str()),
//!         Err(e) => {
//!             eprintln!("error: {e}");
//!             break;
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Without reconnecting
//!
//! If a dropped stream can't be picked up again (or you don't want the request sent twice), skip
//! [`EventSource`] and use [`response_to_stream`] to convert a [`::reqwest::Response`] directly
//! into an [`EventStream`].
//!
//! # Using `EventStream` directly
//!
//! If you already have a byte stream (from any HTTP client, a file, a socket, etc.)
//! you can use [`EventStream`] without the `reqwest` feature:
//!
//! ```rust
//! use bytes::Bytes;
//! use futures::StreamExt;
//! use ssewire::EventStream;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let chunks = vec![
//!     Ok::<_, std::io::Error>(Bytes::from("data: hello\n\ndata: world\n\n")),
//! ];
//! let mut stream = EventStream::new(futures::stream::iter(chunks));
//!
//! while let Some(Ok(event)) = stream.next().await {
//!     println!("{}", event.data_str().unwrap());
//! }
//! # }
//! ```
//!
//! # Feature flags
//!
//! | Feature | Default | Description | no std? |
//! | --- | --- | --- | --- |
//! | `serde` | off | Derives [`Serialize`][::serde::Serialize] and [`Deserialize`][::serde::Deserialize] on [`Event`] and enables `serde` support in [`bytes-utils`][bytes_utils]. | false |
//! | `std` | off | Enables standard library support in core dependencies (`bytes`, `memchr`, `futures-core`, etc.), the blocking parser and [`EventWriter`]. Turned on automatically by `reqwest` and `json`. | false |
//! | `reqwest` | off | Provides [`EventSource`] and [`subscribe`] for HTTP-based SSE with reconnection and `Last-Event-ID` resume. | false |
//! | `json` | off | Adds [`Event::json`] and [`Event::json_with_path`] for deserialising event data into typed values via [`serde_json`], optionally with [`serde_path_to_error`] for richer errors. | false |
//!
//! Without any features enabled, the crate is fully `no_std` compatible and provides
//! [`EventStream`], [`Event`] encoding and the low-level parser.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub(crate) mod constants;
pub mod errors;
pub mod event;
pub mod event_stream;
#[cfg(feature = "json")]
mod json;
pub mod parser;
#[cfg(feature = "reqwest")]
pub mod reqwest;
#[cfg(feature = "std")]
pub mod writer;

pub use constants::{LAST_EVENT_ID, TEXT_EVENT_STREAM};
pub use event::Event;
pub use event_stream::generic::EventStream;
#[cfg(feature = "std")]
pub use event_stream::blocking::{EventReader, parse};
// if the reqwest feature is enabled, this is what someone wants
#[cfg(feature = "reqwest")]
pub use self::reqwest::{EventSource, response_to_stream, subscribe};
#[cfg(feature = "std")]
pub use writer::EventWriter;
