//! Reconnecting SSE client on top of [`reqwest`].
//!
//! [`EventSource`] is the stream based API, [`subscribe`] drives one to completion with a callback.
//!
//! Reconnection only ever happens after the server closed a response cleanly (and only with
//! [`SubscribeOptions::auto_retry`]). Failing to connect, a rejected response, or (unless
//! [`SubscribeOptions::reconnect_on_read_error`] is set) a body that breaks off all end the stream with that error,
//! whether it happens on the first attempt or on a reconnect.

use std::{
    fmt,
    future::{Future, poll_fn},
    pin::{Pin, pin},
    task::{Context, Poll},
    time::Duration,
};

use futures_core::{Stream, future::BoxFuture, ready};
use futures_timer::Delay;
use http_body_util::BodyDataStream;
use pin_project_lite::pin_project;
use reqwest::{
    Body, RequestBuilder, Response,
    header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE, HeaderName, HeaderValue},
};
use tracing::{debug, trace, warn};

use crate::{
    constants::TEXT_EVENT_STREAM,
    errors::{CantCloneError, Error},
    event::Event,
    event_stream::generic::EventStream,
};

/// Reconnect delay used until the server sends a `retry` field
pub const DEFAULT_RETRY: Duration = Duration::from_secs(3);

// `http` only stores lower case header names, servers match them case-insensitively
const LAST_EVENT_ID_HEADER: &str = "last-event-id";

/// Item of an [`EventSource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A response was accepted and its body is being read, sent once per (re)connection
    Open,
    Event(Event),
}

/// What the client remembers between connections.
///
/// Updated from every event before that event is handed out, so looking at it while handling an event already
/// reflects that event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeState {
    /// Last non-empty id seen, sent back as `Last-Event-ID` on reconnect
    pub last_event_id: String,
    /// Delay before reconnecting, the latest positive `retry` the server sent
    pub retry: Duration,
}

impl Default for ResumeState {
    fn default() -> Self {
        Self {
            last_event_id: String::new(),
            retry: DEFAULT_RETRY,
        }
    }
}

impl ResumeState {
    fn observe(&mut self, event: &Event) {
        if let Some(retry) = event.retry.filter(|retry| !retry.is_zero()) {
            trace!(retry_ms = millis(retry), "SSE retry updated");
            self.retry = retry;
        }
        if let Some(id) = event.id.as_deref().filter(|id| !id.is_empty()) {
            trace!(id, "SSE last event id updated");
            self.last_event_id.clear();
            self.last_event_id.push_str(id);
        }
    }
}

/// Options for [`EventSource::new`] and [`subscribe`]
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    auto_retry: bool,
    reconnect_on_read_error: bool,
    allow_content_type_parameters: bool,
    state: ResumeState,
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconnect whenever the server closes the stream cleanly, defaults to `false`
    #[must_use]
    pub fn auto_retry(mut self, auto_retry: bool) -> Self {
        self.auto_retry = auto_retry;
        self
    }

    /// Treat a body that fails part way through like a clean close, so [`SubscribeOptions::auto_retry`] reconnects
    /// instead of giving up. Some servers or proxies drop idle streams with an error rather than closing them, this
    /// lets you decide whether that counts as a disconnect. Defaults to `false`.
    #[must_use]
    pub fn reconnect_on_read_error(mut self, reconnect: bool) -> Self {
        self.reconnect_on_read_error = reconnect;
        self
    }

    /// Also accept responses whose `Content-Type` carries parameters, like `text/event-stream; charset=utf-8`.
    /// Defaults to `false`: anything but exactly `text/event-stream` is rejected.
    #[must_use]
    pub fn allow_content_type_parameters(mut self, allow: bool) -> Self {
        self.allow_content_type_parameters = allow;
        self
    }

    /// Resume from `id`, sent as `Last-Event-ID` on the first request
    #[must_use]
    pub fn last_event_id(mut self, id: impl Into<String>) -> Self {
        self.state.last_event_id = id.into();
        self
    }

    /// Reconnect delay until the server says otherwise, defaults to [`DEFAULT_RETRY`]
    #[must_use]
    pub fn retry(mut self, retry: Duration) -> Self {
        self.state.retry = retry;
        self
    }

    /// Pick up where an earlier subscription left off
    #[must_use]
    pub fn resume(mut self, state: ResumeState) -> Self {
        self.state = state;
        self
    }
}

type ResponseFuture = BoxFuture<'static, Result<Response, reqwest::Error>>;
type BodyEventStream = EventStream<BodyDataStream<Body>>;

pin_project! {
    #[project = ConnectionStateProjection]
    enum ConnectionState {
        Connecting {
            #[pin]
            future: ResponseFuture,
        },
        Retrying {
            #[pin]
            delay: Delay,
        },
        Open {
            #[pin]
            stream: BodyEventStream,
        },
        Closed,
    }
}

impl ConnectionState {
    fn name(&self) -> &'static str {
        match self {
            ConnectionState::Connecting { .. } => "connecting",
            ConnectionState::Retrying { .. } => "retrying",
            ConnectionState::Open { .. } => "open",
            ConnectionState::Closed => "closed",
        }
    }
}

pin_project! {
    /// [`Stream`] of events from an SSE endpoint, reconnecting with `Last-Event-ID` when configured to.
    ///
    /// Nothing more is read from the response until the current item has been taken, so a slow consumer holds the
    /// connection back rather than buffering. Drop it to disconnect.
    pub struct EventSource {
        builder: RequestBuilder,
        #[pin]
        connection_state: ConnectionState,
        state: ResumeState,
        auto_retry: bool,
        reconnect_on_read_error: bool,
        allow_content_type_parameters: bool,
        attempt: usize,
    }
}

/// Convert a [`Response`] into an [`EventStream`] via a similar mechanism to [`Response::bytes_stream`], without any
/// checks or retry logic.
pub fn response_to_stream(response: Response) -> BodyEventStream {
    EventStream::new(BodyDataStream::new(Body::from(response)))
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn is_event_stream(content_type: &str, allow_parameters: bool) -> bool {
    if !allow_parameters {
        return content_type == TEXT_EVENT_STREAM;
    }
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    essence == TEXT_EVENT_STREAM
}

fn validate_response(response: Response, allow_parameters: bool) -> Result<Response, Error> {
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Status(status));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());
    match content_type.as_deref() {
        Some(content_type) if is_event_stream(content_type, allow_parameters) => Ok(response),
        _ => Err(Error::ContentType(content_type)),
    }
}

/// Builds one attempt from `builder`. Headers are set rather than appended so a reconnect never doubles them up.
fn connect(builder: &RequestBuilder, last_event_id: &str) -> Result<ResponseFuture, Error> {
    let (client, request) = builder.try_clone().ok_or(CantCloneError)?.build_split();
    let mut request = request.map_err(Error::Request)?;

    let headers = request.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(ACCEPT, HeaderValue::from_static(TEXT_EVENT_STREAM));
    if !last_event_id.is_empty() {
        let value = HeaderValue::from_str(last_event_id)
            .map_err(|_| Error::InvalidLastEventId(last_event_id.to_owned()))?;
        headers.insert(HeaderName::from_static(LAST_EVENT_ID_HEADER), value);
    }

    Ok(Box::pin(client.execute(request)))
}

impl EventSource {
    /// Starts the first request straight away.
    ///
    /// # Errors
    ///
    /// Fails if `request` can't be cloned (streaming bodies), can't be built, or the seeded last event id is not a
    /// valid header value.
    pub fn new(request: RequestBuilder, options: SubscribeOptions) -> Result<Self, Error> {
        let SubscribeOptions {
            auto_retry,
            reconnect_on_read_error,
            allow_content_type_parameters,
            state,
        } = options;

        debug!(last_event_id = %state.last_event_id, auto_retry, "SSE connecting");
        let future = connect(&request, &state.last_event_id)?;

        Ok(Self {
            builder: request,
            connection_state: ConnectionState::Connecting { future },
            state,
            auto_retry,
            reconnect_on_read_error,
            allow_content_type_parameters,
            attempt: 0,
        })
    }

    pub fn resume_state(&self) -> &ResumeState {
        &self.state
    }

    pub fn last_event_id(&self) -> &str {
        &self.state.last_event_id
    }

    pub fn retry(&self) -> Duration {
        self.state.retry
    }

    /// Number of reconnects so far, 0 while on the first connection
    pub fn reconnects(&self) -> usize {
        self.attempt
    }

    pub fn into_resume_state(self) -> ResumeState {
        self.state
    }
}

impl fmt::Debug for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("builder", &self.builder)
            .field("connection_state", &self.connection_state.name())
            .field("state", &self.state)
            .field("auto_retry", &self.auto_retry)
            .field("reconnect_on_read_error", &self.reconnect_on_read_error)
            .field(
                "allow_content_type_parameters",
                &self.allow_content_type_parameters,
            )
            .field("attempt", &self.attempt)
            .finish()
    }
}

impl Stream for EventSource {
    type Item = Result<StreamEvent, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        let allow_parameters = *this.allow_content_type_parameters;

        loop {
            match this.connection_state.as_mut().project() {
                ConnectionStateProjection::Connecting { future } => {
                    let response = ready!(future.poll(cx))
                        .map_err(Error::Request)
                        .and_then(|response| validate_response(response, allow_parameters));
                    match response {
                        Ok(response) => {
                            debug!(url = %response.url(), attempt = *this.attempt, "SSE connection open");
                            this.connection_state.set(ConnectionState::Open {
                                stream: response_to_stream(response),
                            });
                            return Poll::Ready(Some(Ok(StreamEvent::Open)));
                        }
                        Err(e) => {
                            warn!(error = %e, attempt = *this.attempt, "SSE connection failed");
                            this.connection_state.set(ConnectionState::Closed);
                            return Poll::Ready(Some(Err(e)));
                        }
                    }
                }
                ConnectionStateProjection::Retrying { delay } => {
                    ready!(delay.poll(cx));
                    *this.attempt += 1;
                    debug!(
                        last_event_id = %this.state.last_event_id,
                        attempt = *this.attempt,
                        "SSE reconnecting"
                    );
                    match connect(this.builder, &this.state.last_event_id) {
                        Ok(future) => this
                            .connection_state
                            .set(ConnectionState::Connecting { future }),
                        Err(e) => {
                            warn!(error = %e, "SSE could not build reconnect request");
                            this.connection_state.set(ConnectionState::Closed);
                            return Poll::Ready(Some(Err(e)));
                        }
                    }
                }
                ConnectionStateProjection::Open { stream } => match ready!(stream.poll_next(cx)) {
                    Some(Ok(event)) => {
                        this.state.observe(&event);
                        return Poll::Ready(Some(Ok(StreamEvent::Event(event))));
                    }
                    Some(Err(e)) => {
                        let e = e.into_inner();
                        if *this.auto_retry && *this.reconnect_on_read_error {
                            warn!(error = %e, retry_ms = millis(this.state.retry), "SSE body failed, scheduling reconnect");
                            this.connection_state.set(ConnectionState::Retrying {
                                delay: Delay::new(this.state.retry),
                            });
                            continue;
                        }
                        warn!(error = %e, "SSE body failed");
                        this.connection_state.set(ConnectionState::Closed);
                        return Poll::Ready(Some(Err(Error::Body(e))));
                    }
                    None => {
                        if *this.auto_retry {
                            debug!(retry_ms = millis(this.state.retry), "SSE stream ended, scheduling reconnect");
                            this.connection_state.set(ConnectionState::Retrying {
                                delay: Delay::new(this.state.retry),
                            });
                            continue;
                        }
                        debug!("SSE stream ended");
                        this.connection_state.set(ConnectionState::Closed);
                        return Poll::Ready(None);
                    }
                },
                ConnectionStateProjection::Closed => return Poll::Ready(None),
            }
        }
    }
}

/// Runs `request` as an SSE subscription, calling `on_event` for every event in order.
///
/// `on_event` also gets the [`ResumeState`] as it is right after that event was taken into account. Returns the final
/// state once the stream ends cleanly without [`SubscribeOptions::auto_retry`]; with auto retry this only returns on an
/// error.
///
/// # Errors
///
/// See [`Error`], the first error ends the subscription.
pub async fn subscribe<F>(
    request: RequestBuilder,
    options: SubscribeOptions,
    mut on_event: F,
) -> Result<ResumeState, Error>
where
    F: FnMut(Event, &ResumeState),
{
    let mut source = pin!(EventSource::new(request, options)?);

    while let Some(item) = poll_fn(|cx| source.as_mut().poll_next(cx)).await {
        match item? {
            StreamEvent::Open => (),
            StreamEvent::Event(event) => on_event(event, source.resume_state()),
        }
    }

    Ok(source.resume_state().clone())
}
