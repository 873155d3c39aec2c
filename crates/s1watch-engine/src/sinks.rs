//! Event sinks.
//!
//! A sink consumes events exactly once and never retains them. Emit
//! failures are the caller's to count and log; the pipeline continues
//! regardless.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::model::Event;

/// An event output.
pub trait Sink: Send {
    fn emit(&mut self, event: &Event) -> Result<()>;

    /// Emit a batch in input order. The default stops at the first failure.
    fn emit_batch(&mut self, events: &[Event]) -> Result<()> {
        for event in events {
            self.emit(event)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// JSON lines on stdout.
#[derive(Default)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn new() -> Self {
        StdoutSink
    }
}

impl Sink for StdoutSink {
    fn emit(&mut self, event: &Event) -> Result<()> {
        println!("{}", serde_json::to_string(event)?);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        std::io::stdout().flush()?;
        Ok(())
    }
}

/// Line-delimited JSON appended to a file.
pub struct JsonlSink {
    writer: BufWriter<File>,
}

impl JsonlSink {
    pub fn new(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(JsonlSink {
            writer: BufWriter::new(file),
        })
    }
}

impl Sink for JsonlSink {
    fn emit(&mut self, event: &Event) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
