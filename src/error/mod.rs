//! Error handling for export operations.
//!
//! Every fallible operation in the crate returns [`Result`], whose error type
//! [`PagezipError`] wraps one of the more specific error kinds:
//! - [`ConfigError`]: rejected configuration (unknown driver, bad sizes, config files)
//! - [`SourceError`]: failures reported by a page source
//! - [`SerializationError`]: a format writer failed to encode or flush rows
//! - [`ArchiveError`]: zip entry creation, write or close failures
//!
//! # Example
//!
//! ```rust
//! use pagezip::error::{ConfigError, PagezipError, Result};
//!
//! fn check(page_size: usize, rotation_threshold: usize) -> Result<()> {
//!     if page_size > rotation_threshold {
//!         return Err(ConfigError::PageSizeExceedsThreshold {
//!             page_size,
//!             rotation_threshold,
//!         }
//!         .into());
//!     }
//!     Ok(())
//! }
//!
//! assert!(matches!(check(10, 5), Err(PagezipError::Config(_))));
//! ```

pub mod kinds;

// Re-export commonly used types
pub use kinds::{
    ArchiveError, ConfigError, PagezipError, Result, SerializationError, SourceError,
};
