//! Write a few events to stdout in wire format, pipe it into anything that speaks SSE
//!
//! Run with: cargo run --example emit --features std

use std::{io, thread, time::Duration};

use ssewire::{Event, EventWriter};

fn main() -> io::Result<()> {
    let mut writer = EventWriter::new(io::stdout().lock());

    writer.write(&Event::new("hello").with_retry(Duration::from_secs(2)))?;
    for id in ["1", "2", "3", "4", "5"] {
        let event = Event::new(format!("tick {id}\nof 5"))
            .with_id(id)
            .with_event("tick");
        writer.write(&event)?;
        writer.write_comment("keep-alive")?;
        thread::sleep(Duration::from_millis(200));
    }
    Ok(())
}
