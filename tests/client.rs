//! Integration tests for the reqwest client.
//!
//! A mock server on a raw TCP socket answers one scripted reply per connection, so the tests
//! control exactly when a stream ends or breaks and can look at every request that was sent.

#![cfg(feature = "reqwest")]

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::StreamExt;
use ssewire::{
    Event, EventSource,
    errors::Error,
    reqwest::{ResumeState, StreamEvent, SubscribeOptions, subscribe},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    time::timeout,
};

// ---------------------------------------------------------------------------
// Mock SSE server helpers
// ---------------------------------------------------------------------------

enum Reply {
    /// 200 with the given content type (if any) and a body that ends when the connection closes
    Body {
        content_type: Option<&'static str>,
        body: &'static str,
    },
    /// Arbitrary status with an event stream content type and no body
    Status(u16),
    /// Chunked event stream that is cut off after the given data, without the final chunk
    Truncated(&'static str),
    /// Reads the request and closes the socket without answering
    Hangup,
}

fn sse(body: &'static str) -> Reply {
    Reply::Body {
        content_type: Some("text/event-stream"),
        body,
    }
}

/// Request heads as received, lower cased
type Requests = Arc<Mutex<Vec<String>>>;

/// Serve `replies` to consecutive connections, then stop listening
async fn start_server(replies: Vec<Reply>) -> (SocketAddr, Requests) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("local addr");
    let requests = Requests::default();

    let seen = requests.clone();
    tokio::spawn(async move {
        for reply in replies {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };

            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|window| window == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => head.extend_from_slice(&buf[..n]),
                }
            }
            seen.lock()
                .unwrap()
                .push(String::from_utf8_lossy(&head).to_lowercase());

            let response = match reply {
                Reply::Body { content_type, body } => {
                    let content_type = content_type
                        .map(|ct| format!("Content-Type: {ct}\r\n"))
                        .unwrap_or_default();
                    format!("HTTP/1.1 200 OK\r\n{content_type}Connection: close\r\n\r\n{body}")
                }
                Reply::Status(status) => format!(
                    "HTTP/1.1 {status} Nope\r\nContent-Type: text/event-stream\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                ),
                Reply::Truncated(body) => format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n{:x}\r\n{body}\r\n",
                    body.len()
                ),
                Reply::Hangup => String::new(),
            };
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (addr, requests)
}

fn request(addr: SocketAddr) -> reqwest::RequestBuilder {
    reqwest::Client::new().get(format!("http://{addr}/events"))
}

fn fast_retry() -> SubscribeOptions {
    SubscribeOptions::new().retry(Duration::from_millis(10))
}

/// Run a subscription to the end, collecting the events and the state each one was delivered with
async fn collect(
    addr: SocketAddr,
    options: SubscribeOptions,
) -> (Vec<(Event, ResumeState)>, Result<ResumeState, Error>) {
    let mut seen = Vec::new();
    let result = timeout(
        Duration::from_secs(10),
        subscribe(request(addr), options, |event, state| {
            seen.push((event, state.clone()));
        }),
    )
    .await
    .expect("subscription timed out");
    (seen, result)
}

fn data(events: &[(Event, ResumeState)]) -> Vec<&str> {
    events
        .iter()
        .map(|(event, _)| event.data_str().expect("utf-8 data"))
        .collect()
}

// ---------------------------------------------------------------------------
// Single connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn just_data() {
    let (addr, requests) = start_server(vec![sse("data: foo\n\ndata: bar\nevent: baz\n\n")]).await;

    let (events, result) = collect(addr, SubscribeOptions::new()).await;

    let state = result.expect("clean end");
    assert_eq!(state, ResumeState::default());
    assert_eq!(data(&events), vec!["foo", "bar"]);
    assert_eq!(events[0].0.event_type(), "message");
    assert_eq!(events[1].0.event_type(), "baz");

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].contains("\r\ncache-control: no-cache\r\n"));
    assert!(requests[0].contains("\r\naccept: text/event-stream\r\n"));
    assert!(!requests[0].contains("last-event-id"));
}

#[tokio::test]
async fn sends_seeded_last_event_id() {
    let (addr, requests) = start_server(vec![sse("data: foo\n\n")]).await;

    let (events, result) = collect(addr, SubscribeOptions::new().last_event_id("foo")).await;

    assert_eq!(data(&events), vec!["foo"]);
    assert_eq!(result.unwrap().last_event_id, "foo");
    assert!(requests.lock().unwrap()[0].contains("\r\nlast-event-id: foo\r\n"));
}

#[tokio::test]
async fn caller_headers_are_not_doubled() {
    let (addr, requests) = start_server(vec![sse("data: foo\n\n")]).await;

    let request = request(addr)
        .header("cache-control", "max-age=60")
        .header("x-token", "abc");
    let result = subscribe(request, SubscribeOptions::new(), |_, _| ()).await;

    assert!(result.is_ok());
    let requests = requests.lock().unwrap();
    assert_eq!(requests[0].matches("cache-control:").count(), 1);
    assert!(requests[0].contains("\r\ncache-control: no-cache\r\n"));
    assert!(requests[0].contains("\r\nx-token: abc\r\n"));
}

#[tokio::test]
async fn bad_content_type() {
    let (addr, _) = start_server(vec![Reply::Body {
        content_type: Some("foo/foo"),
        body: "data: foo\n\n",
    }])
    .await;

    let (events, result) = collect(addr, SubscribeOptions::new()).await;

    assert!(events.is_empty());
    let err = result.unwrap_err();
    assert_eq!(
        err.to_string(),
        "response does not have text/event-stream Content-Type"
    );
    assert!(matches!(&err, Error::ContentType(Some(ct)) if ct == "foo/foo"));
    assert!(err.is_response_err());
}

#[tokio::test]
async fn missing_content_type() {
    let (addr, _) = start_server(vec![Reply::Body {
        content_type: None,
        body: "data: foo\n\n",
    }])
    .await;

    let (events, result) = collect(addr, SubscribeOptions::new()).await;

    assert!(events.is_empty());
    assert!(matches!(result, Err(Error::ContentType(None))));
}

#[tokio::test]
async fn content_type_parameters_are_rejected_by_default() {
    let (addr, _) = start_server(vec![Reply::Body {
        content_type: Some("text/event-stream; charset=utf-8"),
        body: "data: foo\n\n",
    }])
    .await;

    let (events, result) = collect(addr, SubscribeOptions::new().auto_retry(true)).await;

    assert!(events.is_empty());
    assert!(
        matches!(result, Err(Error::ContentType(Some(ct))) if ct == "text/event-stream; charset=utf-8")
    );
}

#[tokio::test]
async fn content_type_parameters_when_allowed() {
    let (addr, _) = start_server(vec![Reply::Body {
        content_type: Some("text/event-stream; charset=utf-8"),
        body: "data: foo\n\n",
    }])
    .await;

    let options = SubscribeOptions::new().allow_content_type_parameters(true);
    let (events, result) = collect(addr, options).await;

    assert!(result.is_ok());
    assert_eq!(data(&events), vec!["foo"]);
}

#[tokio::test]
async fn error_status() {
    let (addr, _) = start_server(vec![Reply::Status(503)]).await;

    let (events, result) = collect(addr, SubscribeOptions::new().auto_retry(true)).await;

    assert!(events.is_empty());
    let err = result.unwrap_err();
    assert_eq!(err.status(), Some(reqwest::StatusCode::SERVICE_UNAVAILABLE));
    assert!(err.is_response_err());
}

#[tokio::test]
async fn ids() {
    let (addr, _) = start_server(vec![sse(
        "id: foo\ndata: foo\n\nid: bar\ndata: bar\n\ndata: no id\n\n",
    )])
    .await;

    let (events, result) = collect(addr, SubscribeOptions::new()).await;

    let ids: Vec<&str> = events
        .iter()
        .map(|(_, state)| state.last_event_id.as_str())
        .collect();
    assert_eq!(ids, vec!["foo", "bar", "bar"]);
    assert_eq!(events[2].0.id, None);
    assert_eq!(result.unwrap().last_event_id, "bar");
}

#[tokio::test]
async fn retries() {
    let (addr, _) = start_server(vec![sse(
        "retry: 1200\ndata: foo\n\nretry: nope\ndata: bar\n\nretry: 0\ndata: baz\n\n",
    )])
    .await;

    let (events, result) = collect(addr, SubscribeOptions::new()).await;

    assert_eq!(events[0].1.retry, Duration::from_millis(1200));
    assert_eq!(events[0].0.retry, Some(Duration::from_millis(1200)));
    assert_eq!(events[1].0.retry, None);
    assert_eq!(events[2].0.retry, None);
    assert_eq!(result.unwrap().retry, Duration::from_millis(1200));
}

#[tokio::test]
async fn transport_error_on_first_request() {
    let (addr, _) = start_server(vec![Reply::Hangup]).await;

    let (events, result) = collect(addr, fast_retry().auto_retry(true)).await;

    assert!(events.is_empty());
    let err = result.unwrap_err();
    assert!(matches!(err, Error::Request(_)), "{err:?}");
    assert!(err.is_transport_err());
}

#[tokio::test]
async fn clean_end_without_auto_retry() {
    let (addr, requests) = start_server(vec![sse("id: 1\ndata: a\n\n"), sse("data: b\n\n")]).await;

    let (events, result) = collect(addr, fast_retry()).await;

    assert_eq!(data(&events), vec!["a"]);
    assert_eq!(result.unwrap().last_event_id, "1");
    assert_eq!(requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn unfinished_event_is_dropped_at_end_of_body() {
    let (addr, _) = start_server(vec![sse("data: a\n\ndata: b\n")]).await;

    let (events, result) = collect(addr, SubscribeOptions::new()).await;

    assert!(result.is_ok());
    assert_eq!(data(&events), vec!["a"]);
}

// ---------------------------------------------------------------------------
// Reconnecting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconnects_with_last_event_id() {
    let (addr, requests) = start_server(vec![
        sse("id: 1\nretry: 20\ndata: first\n\n"),
        sse(": nothing new\n"),
        sse("id: 2\ndata: second\n\n"),
        Reply::Hangup,
    ])
    .await;

    let (events, result) = collect(addr, fast_retry().auto_retry(true)).await;

    assert_eq!(data(&events), vec!["first", "second"]);
    // the error on a reconnect ends the subscription, just like on the first request
    assert!(matches!(result, Err(Error::Request(_))));

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 4);
    assert!(!requests[0].contains("last-event-id"));
    assert!(requests[1].contains("\r\nlast-event-id: 1\r\n"));
    assert!(requests[2].contains("\r\nlast-event-id: 1\r\n"));
    assert!(requests[3].contains("\r\nlast-event-id: 2\r\n"));
    assert_eq!(requests[1].matches("last-event-id:").count(), 1);
}

#[tokio::test]
async fn reconnect_rejected_by_content_type() {
    let (addr, _) = start_server(vec![
        sse("data: first\n\n"),
        Reply::Body {
            content_type: Some("text/html"),
            body: "<html></html>",
        },
    ])
    .await;

    let (events, result) = collect(addr, fast_retry().auto_retry(true)).await;

    assert_eq!(data(&events), vec!["first"]);
    assert!(matches!(result, Err(Error::ContentType(Some(ct))) if ct == "text/html"));
}

#[tokio::test]
async fn body_error_ends_stream_by_default() {
    let (addr, requests) = start_server(vec![
        Reply::Truncated("data: a\n\n"),
        sse("data: b\n\n"),
    ])
    .await;

    let (events, result) = collect(addr, fast_retry().auto_retry(true)).await;

    assert_eq!(data(&events), vec!["a"]);
    let err = result.unwrap_err();
    assert!(matches!(err, Error::Body(_)), "{err:?}");
    assert_eq!(requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn body_error_reconnects_when_asked_to() {
    let (addr, requests) = start_server(vec![
        Reply::Truncated("id: 7\ndata: a\n\n"),
        sse("data: b\n\n"),
    ])
    .await;

    let options = fast_retry()
        .auto_retry(true)
        .reconnect_on_read_error(true);
    let (events, result) = collect(addr, options).await;

    assert_eq!(data(&events), vec!["a", "b"]);
    // third attempt finds nobody listening
    assert!(matches!(result, Err(Error::Request(_))));
    assert!(requests.lock().unwrap()[1].contains("\r\nlast-event-id: 7\r\n"));
}

// ---------------------------------------------------------------------------
// EventSource
// ---------------------------------------------------------------------------

#[tokio::test]
async fn event_source_reports_each_connection() {
    let (addr, _) = start_server(vec![sse("id: a\ndata: 1\n\n"), sse("data: 2\n\n")]).await;

    let source = EventSource::new(request(addr), fast_retry().auto_retry(true)).unwrap();
    let mut source = Box::pin(source);

    let mut items = Vec::new();
    while let Some(item) = timeout(Duration::from_secs(10), source.next())
        .await
        .expect("stream timed out")
    {
        match item {
            Ok(item) => items.push(item),
            Err(_) => break,
        }
    }

    assert_eq!(
        items,
        vec![
            StreamEvent::Open,
            StreamEvent::Event(Event::new("1").with_id("a")),
            StreamEvent::Open,
            StreamEvent::Event(Event::new("2")),
        ]
    );
    assert_eq!(source.last_event_id(), "a");
    assert_eq!(source.reconnects(), 2);
    // closed for good after the error
    assert!(source.next().await.is_none());
}

#[tokio::test]
async fn invalid_last_event_id_is_rejected_up_front() {
    let err = EventSource::new(
        reqwest::Client::new().get("http://127.0.0.1:1/events"),
        SubscribeOptions::new().last_event_id("line\nbreak"),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidLastEventId(id) if id == "line\nbreak"));
}

#[tokio::test]
async fn streaming_bodies_cant_be_retried() {
    let body = reqwest::Body::wrap_stream(futures::stream::iter(vec![Ok::<_, std::io::Error>(
        bytes::Bytes::from_static(b"payload"),
    )]));
    let request = reqwest::Client::new()
        .post("http://127.0.0.1:1/events")
        .body(body);

    let err = EventSource::new(request, SubscribeOptions::new()).unwrap_err();
    assert!(matches!(err, Error::CantClone(_)));
}
