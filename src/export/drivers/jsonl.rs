//! JSON Lines format driver
//!
//! Each row becomes one JSON array on its own line, which keeps the values'
//! types intact and makes every chunk trivially streamable.

use std::io::Write;

use tracing::trace;

use crate::error::{Result, SerializationError};
use crate::export::value::Value;

use super::{CountingWriter, FormatDriver, RowWriter};

/// Driver for JSON Lines
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLDriver;

impl FormatDriver for JsonLDriver {
    fn new_writer(&self) -> Box<dyn RowWriter> {
        Box::new(JsonLRowWriter::default())
    }

    fn suffix(&self) -> &str {
        ".jsonl"
    }
}

/// Writer buffering JSON Lines in memory
#[derive(Default)]
pub struct JsonLRowWriter {
    buffer: Vec<u8>,
    rows: u64,
}

impl RowWriter for JsonLRowWriter {
    fn write_row(&mut self, row: &[Value]) -> Result<()> {
        let values: Vec<serde_json::Value> = row.iter().map(serde_json::Value::from).collect();
        serde_json::to_writer(&mut self.buffer, &values).map_err(|e| {
            SerializationError::WriteRow {
                format: "jsonl".to_string(),
                message: e.to_string(),
            }
        })?;
        self.buffer.push(b'\n');
        self.rows += 1;
        Ok(())
    }

    fn flush_to(self: Box<Self>, sink: &mut dyn Write) -> Result<u64> {
        let mut counter = CountingWriter::new(sink);
        counter
            .write_all(&self.buffer)
            .map_err(|e| SerializationError::Flush {
                format: "jsonl".to_string(),
                message: e.to_string(),
            })?;
        trace!("Flushed {} JSON lines", self.rows);
        Ok(counter.written())
    }

    fn rows(&self) -> u64 {
        self.rows
    }
}
