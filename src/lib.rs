//! pagezip library
//!
//! Exports large, paginated datasets into a zip archive of row-bounded files.
//! A caller supplies a [`export::PageSource`]; the [`export::ExportEngine`]
//! pulls pages, serializes rows through a pluggable format driver and rotates
//! to a new file whenever the rotation threshold is reached.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `export`: Export engine, format drivers, archive and page sources
//! - `formatter`: Summary output formatting
//!
//! # Example
//!
//! ```no_run
//! use pagezip::export::{DriverRegistry, ExportEngine, ExportOptions, JsonLinesSource};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = DriverRegistry::builtin();
//!     let source = JsonLinesSource::open("orders.jsonl", None).await?;
//!     let mut engine = ExportEngine::new(
//!         &registry,
//!         "xlsx",
//!         "orders",
//!         Box::new(source),
//!         ExportOptions::default(),
//!     )?;
//!
//!     engine.run(&CancellationToken::new()).await?;
//!     let mut file = std::fs::File::create("orders.zip")?;
//!     engine.write_archive_to(&mut file)?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod formatter;

// Re-export commonly used types
pub use config::Config;
pub use error::{PagezipError, Result};
pub use export::{DriverRegistry, ExportEngine, ExportOptions, PageSource, Row, Value};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
