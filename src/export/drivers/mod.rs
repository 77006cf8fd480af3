//! Format drivers for export operations
//!
//! A [`FormatDriver`] produces fresh [`RowWriter`]s and names the file suffix
//! of its format. Drivers are looked up by name in a [`DriverRegistry`] that
//! is populated once at startup and only read afterwards.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use tracing::debug;

use crate::error::{ConfigError, Result};

use super::value::Value;

pub mod csv;
pub mod jsonl;
pub mod xlsx;

pub use self::csv::CsvDriver;
pub use self::jsonl::JsonLDriver;
pub use self::xlsx::XlsxDriver;

/// A serialization backend that can be selected by name
pub trait FormatDriver: Send + Sync {
    /// Create an empty writer for a new chunk
    ///
    /// Every call must return an independent writer.
    fn new_writer(&self) -> Box<dyn RowWriter>;

    /// File suffix for this format, including the leading dot (e.g. `.csv`)
    fn suffix(&self) -> &str;
}

/// Per-chunk serializer
///
/// A writer accepts rows incrementally and is flushed exactly once.
/// [`RowWriter::flush_to`] consumes the writer, so it can never be reused.
pub trait RowWriter: Send {
    /// Buffer one row
    ///
    /// # Arguments
    /// * `row` - Ordered cell values
    ///
    /// # Returns
    /// * `Result<()>` - Success or a serialization error
    fn write_row(&mut self, row: &[Value]) -> Result<()>;

    /// Serialize every buffered row into `sink`
    ///
    /// # Arguments
    /// * `sink` - Destination stream (an archive entry during exports)
    ///
    /// # Returns
    /// * `Result<u64>` - Number of bytes written to `sink`
    fn flush_to(self: Box<Self>, sink: &mut dyn Write) -> Result<u64>;

    /// Number of rows buffered so far
    ///
    /// Chunk rotation is driven by this count, so it must only grow when
    /// `write_row` succeeds.
    fn rows(&self) -> u64;
}

/// Registry of format drivers keyed by name
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn FormatDriver>>,
}

impl DriverRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the bundled `csv`, `xlsx` and `jsonl` drivers
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.drivers.insert("csv".to_string(), Arc::new(CsvDriver));
        registry.drivers.insert("xlsx".to_string(), Arc::new(XlsxDriver));
        registry.drivers.insert("jsonl".to_string(), Arc::new(JsonLDriver));
        registry
    }

    /// Register a driver under `name`
    ///
    /// # Arguments
    /// * `name` - Format name used to select the driver
    /// * `driver` - Driver implementation
    ///
    /// # Returns
    /// * `Result<()>` - Error if the name is already taken
    pub fn register(
        &mut self,
        name: impl Into<String>,
        driver: impl FormatDriver + 'static,
    ) -> Result<()> {
        let name = name.into();
        if self.drivers.contains_key(&name) {
            return Err(ConfigError::DuplicateDriver(name).into());
        }
        debug!("Registered format driver: {}", name);
        self.drivers.insert(name, Arc::new(driver));
        Ok(())
    }

    /// Look up a driver by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn FormatDriver>> {
        self.drivers
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownDriver(name.to_string()).into())
    }

    /// Check whether a driver is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    /// Registered driver names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Sink wrapper that counts the bytes passing through it
pub(crate) struct CountingWriter<'a> {
    inner: &'a mut dyn Write,
    written: u64,
}

impl<'a> CountingWriter<'a> {
    pub(crate) fn new(inner: &'a mut dyn Write) -> Self {
        Self { inner, written: 0 }
    }

    pub(crate) fn written(&self) -> u64 {
        self.written
    }
}

impl Write for CountingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
