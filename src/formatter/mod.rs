//! Output formatting for export summaries
//!
//! Summaries are printed either as a table of the produced chunks or as
//! JSON for scripting.

use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

use crate::error::{PagezipError, Result};
use crate::export::ExportSummary;

/// Output format for summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Chunk table followed by a totals line
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
}

/// Formatter for [`ExportSummary`] values
pub struct SummaryFormatter {
    format: OutputFormat,
}

impl SummaryFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render a summary
    ///
    /// # Arguments
    /// * `summary` - Statistics of a finished export
    ///
    /// # Returns
    /// * `Result<String>` - Text ready to print
    pub fn format(&self, summary: &ExportSummary) -> Result<String> {
        match self.format {
            OutputFormat::Table => Ok(self.format_table(summary)),
            OutputFormat::Json => serde_json::to_string_pretty(summary)
                .map_err(|e| PagezipError::InvalidState(format!("Failed to encode summary: {e}"))),
        }
    }

    fn format_table(&self, summary: &ExportSummary) -> String {
        let mut output = String::new();

        if !summary.chunks.is_empty() {
            let mut builder = Builder::default();
            builder.push_record(["#", "entry", "rows", "bytes"]);
            for chunk in &summary.chunks {
                builder.push_record([
                    chunk.index.to_string(),
                    chunk.name.clone(),
                    chunk.rows.to_string(),
                    chunk.bytes.to_string(),
                ]);
            }

            let mut table = builder.build();
            table.with(Style::rounded());
            table.with(Modify::new(Rows::first()).with(Alignment::center()));
            output.push_str(&table.to_string());
            output.push('\n');
        }

        output.push_str(&format!(
            "{} rows in {} {} file(s), {} page(s), {} ms",
            summary.rows,
            summary.chunks.len(),
            summary.format,
            summary.pages,
            summary.elapsed_ms
        ));
        if let Some(bytes) = summary.archive_bytes {
            output.push_str(&format!(", archive {} bytes", bytes));
        }
        output
    }
}
