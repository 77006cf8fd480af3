//! Excel (.xlsx) format driver
//!
//! Rows are collected in a single worksheet named `Sheet1` and the workbook
//! is assembled when the chunk is flushed. Numbers and booleans keep their
//! cell types; nulls leave the cell blank.

use std::io::Write;

use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use tracing::debug;

use crate::error::{Result, SerializationError};
use crate::export::value::Value;

use super::{CountingWriter, FormatDriver, RowWriter};

/// Maximum number of rows in an Excel worksheet
pub const XLSX_MAX_ROWS: u64 = 1_048_576;

/// Largest integer an Excel number cell represents exactly
const XLSX_MAX_EXACT_INT: u64 = 1 << 53;

/// Driver for Excel workbooks
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxDriver;

impl FormatDriver for XlsxDriver {
    fn new_writer(&self) -> Box<dyn RowWriter> {
        Box::new(XlsxRowWriter::new())
    }

    fn suffix(&self) -> &str {
        ".xlsx"
    }
}

/// Writer holding one worksheet in memory
pub struct XlsxRowWriter {
    worksheet: Worksheet,
    rows: u64,
}

impl XlsxRowWriter {
    pub fn new() -> Self {
        Self {
            worksheet: Worksheet::new(),
            rows: 0,
        }
    }

    fn write_cell(&mut self, row: u32, col: u16, value: &Value) -> std::result::Result<(), XlsxError> {
        match value {
            Value::Null => {}
            Value::Bool(b) => {
                self.worksheet.write_boolean(row, col, *b)?;
            }
            Value::Int(i) if i.unsigned_abs() <= XLSX_MAX_EXACT_INT => {
                self.worksheet.write_number(row, col, *i as f64)?;
            }
            Value::Float(x) if x.is_finite() => {
                self.worksheet.write_number(row, col, *x)?;
            }
            other => {
                self.worksheet.write_string(row, col, &other.to_string())?;
            }
        }
        Ok(())
    }
}

impl Default for XlsxRowWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl RowWriter for XlsxRowWriter {
    fn write_row(&mut self, row: &[Value]) -> Result<()> {
        if self.rows >= XLSX_MAX_ROWS {
            return Err(SerializationError::RowLimit {
                format: "xlsx".to_string(),
                limit: XLSX_MAX_ROWS,
            }
            .into());
        }

        let row_num = self.rows as u32;
        for (col, value) in row.iter().enumerate() {
            let col = u16::try_from(col).map_err(|_| SerializationError::WriteRow {
                format: "xlsx".to_string(),
                message: format!("too many columns: {}", row.len()),
            })?;
            self.write_cell(row_num, col, value)
                .map_err(|e| SerializationError::WriteRow {
                    format: "xlsx".to_string(),
                    message: e.to_string(),
                })?;
        }

        self.rows += 1;
        Ok(())
    }

    fn flush_to(self: Box<Self>, sink: &mut dyn Write) -> Result<u64> {
        let flush_error = |message: String| SerializationError::Flush {
            format: "xlsx".to_string(),
            message,
        };

        let rows = self.rows;
        let mut workbook = Workbook::new();
        workbook.push_worksheet(self.worksheet);
        let buffer = workbook
            .save_to_buffer()
            .map_err(|e| flush_error(e.to_string()))?;

        let mut counter = CountingWriter::new(sink);
        counter
            .write_all(&buffer)
            .map_err(|e| flush_error(e.to_string()))?;

        debug!("Assembled xlsx workbook: {} rows, {} bytes", rows, counter.written());
        Ok(counter.written())
    }

    fn rows(&self) -> u64 {
        self.rows
    }
}
