use std::{fmt, io};

/// Crate-wide `Result` type using [`PagezipError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, PagezipError>;

/// Top-level error type for export operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum PagezipError {
    /// Configuration errors, raised before any export work starts.
    Config(ConfigError),

    /// The cancellation token was observed by the pagination loop.
    Cancelled,

    /// The page source failed.
    Source(SourceError),

    /// A format writer failed to accept a row or to flush.
    Serialization(SerializationError),

    /// Archive entry creation, write or close failure.
    Archive(ArchiveError),

    /// Operation invoked in the wrong lifecycle state.
    InvalidState(String),

    /// I/O errors.
    Io(io::Error),

    /// The export failed and closing the archive afterwards failed as well.
    CloseFailed {
        original: Box<PagezipError>,
        close: Box<PagezipError>,
    },
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// No driver is registered under this name.
    UnknownDriver(String),

    /// A driver with this name is already registered.
    DuplicateDriver(String),

    /// A single page could overflow a chunk.
    PageSizeExceedsThreshold {
        page_size: usize,
        rotation_threshold: usize,
    },

    /// Invalid field value.
    InvalidValue { field: String, value: String },

    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),
}

/// Page source errors.
#[derive(Debug)]
pub enum SourceError {
    /// Fetching a page failed.
    Fetch(String),

    /// A record could not be decoded into a row.
    Decode { line: u64, message: String },

    /// The source cannot seek backwards.
    Rewind { requested: u64, position: u64 },
}

/// Format writer errors.
#[derive(Debug)]
pub enum SerializationError {
    /// Encoding a row failed.
    WriteRow { format: String, message: String },

    /// Flushing encoded rows to the sink failed.
    Flush { format: String, message: String },

    /// The format cannot hold more rows in a single file.
    RowLimit { format: String, limit: u64 },
}

/// Archive-specific errors.
#[derive(Debug)]
pub enum ArchiveError {
    /// Starting a new entry failed.
    CreateEntry { name: String, message: String },

    /// An entry with this name already exists.
    DuplicateEntry(String),

    /// Writing entry bytes failed.
    Write { name: String, message: String },

    /// Flushing or sealing the archive failed.
    Finish(String),

    /// The archive is sealed and accepts no more entries.
    Sealed,

    /// The archive has not been sealed yet.
    NotFinished,
}

impl PagezipError {
    /// Annotate this error with a failure that happened while closing the archive.
    pub fn with_close_failure(self, close: PagezipError) -> Self {
        PagezipError::CloseFailed {
            original: Box::new(self),
            close: Box::new(close),
        }
    }

    /// The error that caused the export to fail, looking through close annotations.
    pub fn original(&self) -> &PagezipError {
        match self {
            PagezipError::CloseFailed { original, .. } => original.original(),
            other => other,
        }
    }

    /// Whether the export stopped because of cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.original(), PagezipError::Cancelled)
    }

    /// Shorthand for a page fetch failure.
    pub fn fetch(message: impl Into<String>) -> Self {
        PagezipError::Source(SourceError::Fetch(message.into()))
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for PagezipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PagezipError::Config(e) => write!(f, "Configuration error: {e}"),
            PagezipError::Cancelled => write!(f, "Export cancelled"),
            PagezipError::Source(e) => write!(f, "Source error: {e}"),
            PagezipError::Serialization(e) => write!(f, "Serialization error: {e}"),
            PagezipError::Archive(e) => write!(f, "Archive error: {e}"),
            PagezipError::InvalidState(msg) => write!(f, "Invalid state: {msg}"),
            PagezipError::Io(e) => write!(f, "I/O error: {e}"),
            PagezipError::CloseFailed { original, close } => {
                write!(f, "{original} (closing the archive also failed: {close})")
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownDriver(name) => write!(f, "Driver is not registered: {name}"),
            ConfigError::DuplicateDriver(name) => {
                write!(f, "Driver is already registered: {name}")
            }
            ConfigError::PageSizeExceedsThreshold {
                page_size,
                rotation_threshold,
            } => write!(
                f,
                "Page size {page_size} is greater than rotation threshold {rotation_threshold}"
            ),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Fetch(msg) => write!(f, "Failed to fetch page: {msg}"),
            SourceError::Decode { line, message } => {
                write!(f, "Failed to decode record at line {line}: {message}")
            }
            SourceError::Rewind {
                requested,
                position,
            } => write!(
                f,
                "Cannot read offset {requested}, source is already at {position}"
            ),
        }
    }
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationError::WriteRow { format, message } => {
                write!(f, "Failed to write {format} row: {message}")
            }
            SerializationError::Flush { format, message } => {
                write!(f, "Failed to flush {format} data: {message}")
            }
            SerializationError::RowLimit { format, limit } => {
                write!(f, "{format} files hold at most {limit} rows")
            }
        }
    }
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveError::CreateEntry { name, message } => {
                write!(f, "Failed to create entry '{name}': {message}")
            }
            ArchiveError::DuplicateEntry(name) => write!(f, "Entry already exists: {name}"),
            ArchiveError::Write { name, message } => {
                write!(f, "Failed to write entry '{name}': {message}")
            }
            ArchiveError::Finish(msg) => write!(f, "Failed to close archive: {msg}"),
            ArchiveError::Sealed => write!(f, "Archive is already closed"),
            ArchiveError::NotFinished => write!(f, "Archive has not been closed yet"),
        }
    }
}

impl std::error::Error for PagezipError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PagezipError::Io(e) => Some(e),
            PagezipError::CloseFailed { original, .. } => Some(original.as_ref()),
            _ => None,
        }
    }
}
impl std::error::Error for ConfigError {}
impl std::error::Error for SourceError {}
impl std::error::Error for SerializationError {}
impl std::error::Error for ArchiveError {}

/* ========================= Conversions to PagezipError ========================= */

impl From<io::Error> for PagezipError {
    fn from(err: io::Error) -> Self {
        PagezipError::Io(err)
    }
}

impl From<ConfigError> for PagezipError {
    fn from(err: ConfigError) -> Self {
        PagezipError::Config(err)
    }
}

impl From<SourceError> for PagezipError {
    fn from(err: SourceError) -> Self {
        PagezipError::Source(err)
    }
}

impl From<SerializationError> for PagezipError {
    fn from(err: SerializationError) -> Self {
        PagezipError::Serialization(err)
    }
}

impl From<ArchiveError> for PagezipError {
    fn from(err: ArchiveError) -> Self {
        PagezipError::Archive(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_failure_keeps_original() {
        let err = PagezipError::Cancelled
            .with_close_failure(ArchiveError::Finish("disk full".to_string()).into());

        assert!(err.is_cancelled());
        let msg = err.to_string();
        assert!(msg.starts_with("Export cancelled"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_config_error_display() {
        let err: PagezipError = ConfigError::PageSizeExceedsThreshold {
            page_size: 5000,
            rotation_threshold: 3000,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Page size 5000 is greater than rotation threshold 3000"
        );
    }

    #[test]
    fn test_fetch_shorthand() {
        let err = PagezipError::fetch("timeout");
        assert!(matches!(err, PagezipError::Source(SourceError::Fetch(ref m)) if m == "timeout"));
        assert!(!err.is_cancelled());
    }
}
