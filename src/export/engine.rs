//! Export engine orchestrating pagination, rotation and archiving
//!
//! The engine pulls pages from a [`PageSource`] with an advancing offset,
//! hands every row to the [`Rotator`] and seals the archive once the source
//! returns an empty page. Whatever happens, the archive is closed before
//! [`ExportEngine::run`] returns.

use std::io::Write;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ExportConfig;
use crate::error::{ConfigError, PagezipError, Result};

use super::archive::{close_on_exit, ArchiveAggregator};
use super::drivers::DriverRegistry;
use super::progress::ProgressTracker;
use super::rotation::{ChunkInfo, Rotator};
use super::source::PageSource;

/// Default number of rows fetched per page
pub const DEFAULT_PAGE_SIZE: usize = 3000;

/// Default maximum number of rows per chunk
pub const DEFAULT_ROTATION_THRESHOLD: usize = 3000;

/// Options recognized by [`ExportEngine::new`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Column labels, kept alongside the export for callers that need them
    pub fields: Option<Vec<String>>,
    /// Rows requested per fetch
    pub page_size: usize,
    /// Offset of the first fetch
    pub offset: u64,
    /// Maximum rows per chunk; must not be smaller than `page_size`
    pub rotation_threshold: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            fields: None,
            page_size: DEFAULT_PAGE_SIZE,
            offset: 0,
            rotation_threshold: DEFAULT_ROTATION_THRESHOLD,
        }
    }
}

impl ExportOptions {
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_rotation_threshold(mut self, rotation_threshold: usize) -> Self {
        self.rotation_threshold = rotation_threshold;
        self
    }

    /// Check the sizes; a page must always fit in a single chunk
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "page_size".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        if self.rotation_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rotation_threshold".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        if self.page_size > self.rotation_threshold {
            return Err(ConfigError::PageSizeExceedsThreshold {
                page_size: self.page_size,
                rotation_threshold: self.rotation_threshold,
            }
            .into());
        }
        Ok(())
    }
}

impl From<&ExportConfig> for ExportOptions {
    fn from(config: &ExportConfig) -> Self {
        Self {
            fields: (!config.fields.is_empty()).then(|| config.fields.clone()),
            page_size: config.page_size,
            offset: config.offset,
            rotation_threshold: config.rotation_threshold,
        }
    }
}

/// Statistics of an export run
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    /// Name of the format driver
    pub format: String,
    /// Rows written into chunks
    pub rows: u64,
    /// Non-empty pages fetched
    pub pages: u64,
    /// Finalized chunks in index order
    pub chunks: Vec<ChunkInfo>,
    /// Size of the sealed archive, if it was sealed successfully
    pub archive_bytes: Option<u64>,
    /// Offset the next fetch would have used
    pub next_offset: u64,
    /// Time taken by `run`
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Ready,
    Completed,
    Failed,
}

/// Engine exporting a paginated source into a zip of row-bounded chunks
pub struct ExportEngine {
    /// Caller-supplied data access
    source: Box<dyn PageSource>,
    /// Writer rotation for the chunk being filled
    rotator: Rotator,
    /// Output archive
    archive: ArchiveAggregator,
    format: String,
    fields: Option<Vec<String>>,
    page_size: usize,
    /// Cursor into the logical dataset
    offset: u64,
    rows: u64,
    pages: u64,
    elapsed_ms: u64,
    state: RunState,
    /// Progress tracker for user feedback
    tracker: Option<ProgressTracker>,
}

impl ExportEngine {
    /// Create a new export engine
    ///
    /// # Arguments
    /// * `registry` - Registry to resolve `format` in
    /// * `format` - Name of a registered format driver
    /// * `base_name` - Prefix of the chunk entry names
    /// * `source` - Page source to export
    /// * `options` - Paging and rotation options
    ///
    /// # Returns
    /// * `Result<Self>` - Engine ready to run, or a configuration error
    pub fn new(
        registry: &DriverRegistry,
        format: &str,
        base_name: impl Into<String>,
        source: Box<dyn PageSource>,
        options: ExportOptions,
    ) -> Result<Self> {
        let driver = registry.get(format)?;
        options.validate()?;

        let base_name = base_name.into();
        debug!(
            "Created export engine: format={}, base_name={}, page_size={}, rotation_threshold={}",
            format, base_name, options.page_size, options.rotation_threshold
        );

        Ok(Self {
            source,
            rotator: Rotator::new(driver, base_name, options.rotation_threshold as u64),
            archive: ArchiveAggregator::new(),
            format: format.to_string(),
            fields: options.fields,
            page_size: options.page_size,
            offset: options.offset,
            rows: 0,
            pages: 0,
            elapsed_ms: 0,
            state: RunState::Ready,
            tracker: None,
        })
    }

    /// Report progress through `tracker` while running
    pub fn with_progress(mut self, tracker: ProgressTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Execute the export
    ///
    /// Pages are fetched until the source returns an empty page. The
    /// cancellation token is checked before every fetch. The trailing
    /// partial chunk is only written when the data ends naturally.
    ///
    /// An engine runs at most once.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<()> {
        if self.state != RunState::Ready {
            return Err(PagezipError::InvalidState(
                "export engine has already run".to_string(),
            ));
        }
        // Stays failed unless the archive is sealed below
        self.state = RunState::Failed;

        let start_time = Instant::now();
        info!(
            "Starting {} export at offset {} (page size {})",
            self.format, self.offset, self.page_size
        );

        let outcome = self.pump(cancel).await;
        let result = close_on_exit(&mut self.archive, outcome);

        self.elapsed_ms = start_time.elapsed().as_millis() as u64;
        if let Some(ref tracker) = self.tracker {
            tracker.finish();
        }

        match &result {
            Ok(()) => {
                self.state = RunState::Completed;
                info!(
                    "Export completed: {} rows in {} chunks, {} ms",
                    self.rows,
                    self.rotator.chunks().len(),
                    self.elapsed_ms
                );
            }
            Err(e) if e.is_cancelled() => info!("Export cancelled after {} rows", self.rows),
            Err(e) => warn!("Export failed after {} rows: {}", self.rows, e),
        }

        result
    }

    /// Pagination loop
    async fn pump(&mut self, cancel: &CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(PagezipError::Cancelled);
            }

            debug!(
                "Fetching page #{} (limit {}, offset {})",
                self.pages + 1,
                self.page_size,
                self.offset
            );
            let page = self.source.fetch(self.page_size, self.offset, cancel).await?;
            if page.is_empty() {
                debug!("Empty page at offset {}, no more rows", self.offset);
                break;
            }

            for row in &page {
                self.rotator.accept(row, &mut self.archive)?;
            }

            self.rows += page.len() as u64;
            self.pages += 1;
            self.offset += self.page_size as u64;

            if let Some(ref tracker) = self.tracker {
                tracker.update(self.rows, self.rotator.chunks().len() as u64);
            }
            if self.pages % 10 == 0 {
                info!("Progress: {} rows exported ({} pages)", self.rows, self.pages);
            }
        }

        self.rotator.finalize_if_non_empty(&mut self.archive)
    }

    /// Stream the finished archive into `dest`
    ///
    /// Only valid after [`ExportEngine::run`] succeeded.
    ///
    /// # Returns
    /// * `Result<u64>` - Number of bytes written
    pub fn write_archive_to(&self, dest: &mut dyn Write) -> Result<u64> {
        self.ensure_completed()?;
        self.archive.write_to(dest)
    }

    /// Bytes of the finished archive
    pub fn archive_bytes(&self) -> Result<&[u8]> {
        self.ensure_completed()?;
        self.archive.bytes().ok_or_else(|| {
            PagezipError::InvalidState("archive bytes are not available".to_string())
        })
    }

    fn ensure_completed(&self) -> Result<()> {
        match self.state {
            RunState::Completed => Ok(()),
            RunState::Ready => Err(PagezipError::InvalidState(
                "export has not run yet".to_string(),
            )),
            RunState::Failed => Err(PagezipError::InvalidState(
                "export did not complete successfully".to_string(),
            )),
        }
    }

    /// Chunks finalized so far, in index order
    pub fn chunks(&self) -> &[ChunkInfo] {
        self.rotator.chunks()
    }

    /// Current cursor into the logical dataset
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Column labels passed in the options
    pub fn fields(&self) -> Option<&[String]> {
        self.fields.as_deref()
    }

    /// Whether the archive has been closed
    pub fn is_archive_closed(&self) -> bool {
        self.archive.is_finished()
    }

    /// Statistics of the run so far
    pub fn summary(&self) -> ExportSummary {
        ExportSummary {
            format: self.format.clone(),
            rows: self.rows,
            pages: self.pages,
            chunks: self.rotator.chunks().to_vec(),
            archive_bytes: self.archive.bytes().map(|b| b.len() as u64),
            next_offset: self.offset,
            elapsed_ms: self.elapsed_ms,
        }
    }
}
