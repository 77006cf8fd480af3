//! Chunk rotation
//!
//! The [`Rotator`] owns the writer of the chunk being filled. Rotation is
//! lazy: a full chunk is only finalized when the next row arrives, or at the
//! end of the stream. A chunk never holds more than `threshold` rows.

use std::io::{Seek, Write};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::{ArchiveError, Result};

use super::archive::{ArchiveAggregator, EntrySink};
use super::drivers::{FormatDriver, RowWriter};
use super::value::Value;

/// A chunk that has been written into the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkInfo {
    /// 1-based chunk index
    pub index: u64,
    /// Archive entry name
    pub name: String,
    /// Rows in the chunk
    pub rows: u64,
    /// Encoded size before compression
    pub bytes: u64,
}

/// Tracks rows per chunk and rotates writers at the threshold
pub struct Rotator {
    driver: Arc<dyn FormatDriver>,
    writer: Box<dyn RowWriter>,
    base_name: String,
    threshold: u64,
    /// Index of the last finalized chunk
    chunk_index: u64,
    chunks: Vec<ChunkInfo>,
}

impl Rotator {
    pub fn new(driver: Arc<dyn FormatDriver>, base_name: impl Into<String>, threshold: u64) -> Self {
        let writer = driver.new_writer();
        Self {
            driver,
            writer,
            base_name: base_name.into(),
            threshold,
            chunk_index: 0,
            chunks: Vec::new(),
        }
    }

    /// Write one row, finalizing the current chunk first if it is full
    pub fn accept<W: Write + Seek>(
        &mut self,
        row: &[Value],
        archive: &mut ArchiveAggregator<W>,
    ) -> Result<()> {
        if self.writer.rows() == self.threshold {
            self.finalize(archive)?;
        }

        self.writer.write_row(row)
    }

    /// Finalize the current chunk if it holds any rows
    pub fn finalize_if_non_empty<W: Write + Seek>(
        &mut self,
        archive: &mut ArchiveAggregator<W>,
    ) -> Result<()> {
        if self.writer.rows() == 0 {
            return Ok(());
        }
        self.finalize(archive)
    }

    fn finalize<W: Write + Seek>(&mut self, archive: &mut ArchiveAggregator<W>) -> Result<()> {
        let index = self.chunk_index + 1;
        let name = self.entry_name(index);

        let writer = std::mem::replace(&mut self.writer, self.driver.new_writer());
        let rows = writer.rows();

        let mut sink = EntrySink::new(archive.create_entry(&name)?);
        let bytes = match writer.flush_to(&mut sink) {
            Ok(bytes) => bytes,
            Err(err) => {
                return Err(match sink.take_error() {
                    Some(message) => ArchiveError::Write { name, message }.into(),
                    None => err,
                });
            }
        };

        debug!("Finalized chunk {}: {} rows, {} bytes", name, rows, bytes);
        self.chunk_index = index;
        self.chunks.push(ChunkInfo {
            index,
            name,
            rows,
            bytes,
        });
        Ok(())
    }

    /// Entry name of chunk `index`: `<base_name>_<index><suffix>`
    pub fn entry_name(&self, index: u64) -> String {
        format!("{}_{}{}", self.base_name, index, self.driver.suffix())
    }

    /// Rows written to the chunk currently being filled
    pub fn rows_in_chunk(&self) -> u64 {
        self.writer.rows()
    }

    /// Chunks finalized so far, in index order
    pub fn chunks(&self) -> &[ChunkInfo] {
        &self.chunks
    }
}
