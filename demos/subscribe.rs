//! Follow an SSE endpoint, reconnecting and resuming from the last event id
//!
//! Run with: cargo run --example subscribe --features reqwest -- <url> [last-event-id]

use std::time::Duration;

use futures::StreamExt;
use ssewire::{
    EventSource,
    reqwest::{StreamEvent, SubscribeOptions},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .unwrap_or_else(|| "http://127.0.0.1:8080/events".to_owned());

    let mut options = SubscribeOptions::new()
        .auto_retry(true)
        .retry(Duration::from_secs(1));
    if let Some(id) = args.next() {
        options = options.last_event_id(id);
    }

    let request = reqwest::Client::new().get(&url);
    let mut source = Box::pin(EventSource::new(request, options)?);

    println!("Connecting to {url}...");

    while let Some(result) = source.next().await {
        match result {
            Ok(StreamEvent::Open) => {
                println!("Connection opened (reconnects so far: {})", source.reconnects());
            }
            Ok(StreamEvent::Event(evt)) => {
                println!("Event type: {}", evt.event_type());
                match evt.data_str() {
                    Ok(data) => println!("Data: {data}"),
                    Err(_) => println!("Data: {} bytes of binary", evt.data.len()),
                }
                if let Some(id) = &evt.id {
                    println!("ID: {id}");
                }
                if let Some(retry) = evt.retry {
                    println!("Retry: {retry:?}");
                }
                println!("---");
            }
            Err(e) => {
                eprintln!("Error: {e}");
                break;
            }
        }
    }

    let state = source.resume_state();
    println!(
        "Stream ended, resume with last id {:?} after {:?}",
        state.last_event_id, state.retry
    );
    Ok(())
}
