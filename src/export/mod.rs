//! Paginated export into a multi-file zip archive
//!
//! The export system is built on four components:
//!
//! 1. **PageSource**: caller-supplied access to the data, one page per call
//! 2. **FormatDriver / RowWriter**: pluggable serialization backends (CSV, Excel, JSON Lines)
//! 3. **Rotator**: bounds the number of rows per output file
//! 4. **ArchiveAggregator**: collects every finished file as a zip entry
//!
//! These components are orchestrated by the **ExportEngine**, which runs the
//! pagination loop and guarantees the archive is closed on every exit path.
//!
//! # Example
//!
//! ```
//! use pagezip::export::{DriverRegistry, ExportEngine, ExportOptions, MemorySource};
//! use pagezip::row;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let rows = (0..25).map(|i| row![i, format!("name-{i}")]).collect();
//! let registry = DriverRegistry::builtin();
//! let options = ExportOptions::default()
//!     .with_page_size(10)
//!     .with_rotation_threshold(10);
//!
//! let mut engine = ExportEngine::new(
//!     &registry,
//!     "csv",
//!     "users",
//!     Box::new(MemorySource::new(rows)),
//!     options,
//! )?;
//! engine.run(&CancellationToken::new()).await?;
//!
//! let names: Vec<_> = engine.chunks().iter().map(|c| c.name.as_str()).collect();
//! assert_eq!(names, ["users_1.csv", "users_2.csv", "users_3.csv"]);
//!
//! let mut zip_bytes = Vec::new();
//! engine.write_archive_to(&mut zip_bytes)?;
//! # Ok::<(), pagezip::PagezipError>(())
//! # }).unwrap();
//! ```

pub mod archive;
pub mod drivers;
pub mod engine;
pub mod progress;
pub mod rotation;
pub mod source;
pub mod value;

#[cfg(test)]
mod tests;

pub use archive::{close_on_exit, ArchiveAggregator};
pub use drivers::{DriverRegistry, FormatDriver, RowWriter};
pub use engine::{ExportEngine, ExportOptions, ExportSummary};
pub use progress::ProgressTracker;
pub use rotation::{ChunkInfo, Rotator};
pub use source::{FnPageSource, JsonLinesSource, MemorySource, PageSource};
pub use value::{Row, Value};
