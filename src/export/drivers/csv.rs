//! CSV format driver
//!
//! Rows are encoded with the `csv` crate, so values containing commas, quotes
//! or newlines are quoted correctly. Values are rendered with their
//! [`Display`](std::fmt::Display) form; no header row is written.
//!
//! A row with no values has no CSV form distinct from a single empty field,
//! so empty rows are rejected instead of being written as `""`.

use std::io::Write;

use csv::WriterBuilder;

use crate::error::{Result, SerializationError};
use crate::export::value::Value;

use super::{CountingWriter, FormatDriver, RowWriter};

/// Driver for comma-separated values
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvDriver;

impl FormatDriver for CsvDriver {
    fn new_writer(&self) -> Box<dyn RowWriter> {
        Box::new(CsvRowWriter::new())
    }

    fn suffix(&self) -> &str {
        ".csv"
    }
}

/// Writer buffering CSV records in memory
pub struct CsvRowWriter {
    writer: csv::Writer<Vec<u8>>,
    rows: u64,
}

impl CsvRowWriter {
    pub fn new() -> Self {
        let writer = WriterBuilder::new()
            .has_headers(false)
            // Rows are heterogeneous sequences, not records of a fixed schema
            .flexible(true)
            .from_writer(Vec::new());
        Self { writer, rows: 0 }
    }
}

impl Default for CsvRowWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn serialization_error(e: impl std::fmt::Display) -> SerializationError {
    SerializationError::WriteRow {
        format: "csv".to_string(),
        message: e.to_string(),
    }
}

impl RowWriter for CsvRowWriter {
    fn write_row(&mut self, row: &[Value]) -> Result<()> {
        if row.is_empty() {
            return Err(serialization_error("empty row").into());
        }
        let fields: Vec<String> = row.iter().map(Value::to_string).collect();
        self.writer
            .write_record(&fields)
            .map_err(serialization_error)?;
        self.rows += 1;
        Ok(())
    }

    fn flush_to(self: Box<Self>, sink: &mut dyn Write) -> Result<u64> {
        let buffer = self.writer.into_inner().map_err(|e| SerializationError::Flush {
            format: "csv".to_string(),
            message: e.error().to_string(),
        })?;

        let mut counter = CountingWriter::new(sink);
        counter.write_all(&buffer).map_err(|e| SerializationError::Flush {
            format: "csv".to_string(),
            message: e.to_string(),
        })?;
        Ok(counter.written())
    }

    fn rows(&self) -> u64 {
        self.rows
    }
}
