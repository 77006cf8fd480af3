//! Zip archive receiving finalized chunks
//!
//! The aggregator is write-once: entries are appended with unique names, the
//! archive is sealed exactly once with [`ArchiveAggregator::finish`], and only
//! then can its bytes be streamed out.

use std::collections::HashSet;
use std::io::{self, Cursor, Seek, Write};

use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{ArchiveError, Result};

/// Write-once zip container
///
/// The archive is built over `W`, an in-memory buffer unless another
/// seekable stream is supplied through [`ArchiveAggregator::with_writer`].
pub struct ArchiveAggregator<W: Write + Seek = Cursor<Vec<u8>>> {
    /// Open writer; `None` once the archive is sealed
    writer: Option<ZipWriter<W>>,
    /// Underlying stream after a successful seal
    sealed: Option<W>,
    names: HashSet<String>,
    options: SimpleFileOptions,
}

impl ArchiveAggregator {
    /// Create an empty in-memory archive using deflate compression
    pub fn new() -> Self {
        Self::with_writer(Cursor::new(Vec::new()), CompressionMethod::Deflated)
    }

    /// Stream the sealed archive into `dest`
    ///
    /// # Returns
    /// * `Result<u64>` - Number of bytes written
    pub fn write_to(&self, dest: &mut dyn Write) -> Result<u64> {
        let bytes = self.bytes().ok_or(ArchiveError::NotFinished)?;
        dest.write_all(bytes)?;
        dest.flush()?;
        Ok(bytes.len() as u64)
    }

    /// Sealed archive bytes, if the archive was closed successfully
    pub fn bytes(&self) -> Option<&[u8]> {
        self.sealed.as_ref().map(|cursor| cursor.get_ref().as_slice())
    }
}

impl<W: Write + Seek> ArchiveAggregator<W> {
    /// Create an empty archive over `inner`
    ///
    /// # Arguments
    /// * `inner` - Stream the zip container is written to
    /// * `method` - Compression applied to every entry
    pub fn with_writer(inner: W, method: CompressionMethod) -> Self {
        Self {
            writer: Some(ZipWriter::new(inner)),
            sealed: None,
            names: HashSet::new(),
            options: SimpleFileOptions::default().compression_method(method),
        }
    }

    /// Start a new entry and return the stream its bytes go to
    ///
    /// The returned sink stays valid until the next call on the archive;
    /// callers must finish writing one entry before creating the next.
    ///
    /// # Arguments
    /// * `name` - Entry name, unique within the archive
    ///
    /// # Returns
    /// * `Result<&mut dyn Write>` - Sink for the entry contents
    pub fn create_entry(&mut self, name: &str) -> Result<&mut dyn Write> {
        let writer = self.writer.as_mut().ok_or(ArchiveError::Sealed)?;

        if self.names.contains(name) {
            return Err(ArchiveError::DuplicateEntry(name.to_string()).into());
        }

        writer
            .start_file(name, self.options)
            .map_err(|e| ArchiveError::CreateEntry {
                name: name.to_string(),
                message: e.to_string(),
            })?;

        self.names.insert(name.to_string());
        debug!("Created archive entry: {}", name);

        Ok(writer)
    }

    /// Flush and seal the archive
    ///
    /// Only the first call does any work; later calls return `Ok(())`.
    pub fn finish(&mut self) -> Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };

        writer
            .flush()
            .map_err(|e| ArchiveError::Finish(e.to_string()))?;
        let inner = writer
            .finish()
            .map_err(|e| ArchiveError::Finish(e.to_string()))?;

        debug!("Sealed archive: {} entries", self.names.len());
        self.sealed = Some(inner);
        Ok(())
    }

    /// Whether `finish` has been called
    pub fn is_finished(&self) -> bool {
        self.writer.is_none()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for ArchiveAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry sink that remembers the first I/O error it passed on
///
/// Drivers report sink failures as their own serialization errors; the
/// recorded error lets the caller tell an archive write failure apart.
pub(crate) struct EntrySink<'a> {
    inner: &'a mut dyn Write,
    error: Option<String>,
}

impl<'a> EntrySink<'a> {
    pub(crate) fn new(inner: &'a mut dyn Write) -> Self {
        Self { inner, error: None }
    }

    /// First error raised by the underlying entry stream
    pub(crate) fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }

    fn record<T>(&mut self, result: io::Result<T>) -> io::Result<T> {
        if let Err(e) = &result {
            if self.error.is_none() {
                self.error = Some(e.to_string());
            }
        }
        result
    }
}

impl Write for EntrySink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.inner.write(buf);
        self.record(result)
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.inner.flush();
        self.record(result)
    }
}

/// Close the archive on every exit path of an export pipeline
///
/// On success a close failure becomes the result. On failure the archive is
/// still closed; if that fails too, the close error is attached to the
/// original one instead of replacing it.
pub fn close_on_exit<T, W: Write + Seek>(
    archive: &mut ArchiveAggregator<W>,
    outcome: Result<T>,
) -> Result<T> {
    match outcome {
        Ok(value) => {
            archive.finish()?;
            Ok(value)
        }
        Err(err) => match archive.finish() {
            Ok(()) => Err(err),
            Err(close) => {
                warn!("Closing archive after failed export also failed: {}", close);
                Err(err.with_close_failure(close))
            }
        },
    }
}
