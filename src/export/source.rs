//! Page sources for export operations
//!
//! A [`PageSource`] is the caller-supplied data access: given a page size and
//! an offset it returns the next rows. An empty page means the data is
//! exhausted. Errors returned by a source reach the caller of
//! [`ExportEngine::run`](super::ExportEngine::run) unchanged.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{Result, SourceError};

use super::value::{Row, Value};

/// Trait for fetching rows page by page
#[async_trait]
pub trait PageSource: Send {
    /// Fetch up to `limit` rows starting at `offset`
    ///
    /// # Arguments
    /// * `limit` - Page size
    /// * `offset` - Position of the first row in the logical dataset
    /// * `cancel` - Token of the running export, for sources that can abort early
    ///
    /// # Returns
    /// * `Result<Vec<Row>>` - Rows of the page; empty when the data is exhausted
    async fn fetch(
        &mut self,
        limit: usize,
        offset: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<Row>>;
}

/// Page source backed by a closure
///
/// ```
/// use futures::FutureExt;
/// use pagezip::export::source::from_fn;
/// use pagezip::row;
///
/// let source = from_fn(|limit, offset| {
///     async move {
///         let end = (offset + limit as u64).min(10);
///         Ok((offset..end).map(|i| row![i as i64]).collect())
///     }
///     .boxed()
/// });
/// # let _ = source;
/// ```
pub struct FnPageSource<F> {
    fetch: F,
}

/// Wrap a closure returning a boxed future into a [`PageSource`]
pub fn from_fn<F>(fetch: F) -> FnPageSource<F>
where
    F: FnMut(usize, u64) -> BoxFuture<'static, Result<Vec<Row>>> + Send,
{
    FnPageSource { fetch }
}

#[async_trait]
impl<F> PageSource for FnPageSource<F>
where
    F: FnMut(usize, u64) -> BoxFuture<'static, Result<Vec<Row>>> + Send,
{
    async fn fetch(
        &mut self,
        limit: usize,
        offset: u64,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Row>> {
        (self.fetch)(limit, offset).await
    }
}

/// Page source over rows already held in memory
pub struct MemorySource {
    rows: Vec<Row>,
}

impl MemorySource {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl PageSource for MemorySource {
    async fn fetch(
        &mut self,
        limit: usize,
        offset: u64,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Row>> {
        let start = usize::try_from(offset)
            .unwrap_or(usize::MAX)
            .min(self.rows.len());
        let end = start.saturating_add(limit).min(self.rows.len());
        Ok(self.rows[start..end].to_vec())
    }
}

/// Page source reading a JSON Lines file front to back
///
/// Each non-blank line is one record:
/// - an array becomes a row as-is
/// - an object becomes a row of the values of `fields`, in that order, or of
///   all its values in key order when no fields are configured
/// - any other JSON value becomes a single-cell row
///
/// The file is read sequentially, so offsets must never go backwards.
pub struct JsonLinesSource {
    lines: Lines<BufReader<File>>,
    path: PathBuf,
    fields: Option<Vec<String>>,
    /// Records consumed so far
    position: u64,
    /// Physical line number of the last line read
    line_no: u64,
}

impl JsonLinesSource {
    /// Open a JSON Lines file
    ///
    /// # Arguments
    /// * `path` - Input file
    /// * `fields` - Object keys to project, in output column order
    ///
    /// # Returns
    /// * `Result<Self>` - New source or an I/O error
    pub async fn open(path: impl AsRef<Path>, fields: Option<Vec<String>>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await.map_err(|e| {
            SourceError::Fetch(format!("Failed to open {}: {}", path.display(), e))
        })?;

        debug!("Opened JSON Lines source: {}", path.display());

        Ok(Self {
            lines: BufReader::new(file).lines(),
            path,
            fields: fields.filter(|f| !f.is_empty()),
            position: 0,
            line_no: 0,
        })
    }

    /// Read the next non-blank line
    async fn next_record(&mut self) -> Result<Option<String>> {
        loop {
            let line = self.lines.next_line().await.map_err(|e| {
                SourceError::Fetch(format!("Failed to read {}: {}", self.path.display(), e))
            })?;
            match line {
                Some(line) => {
                    self.line_no += 1;
                    if !line.trim().is_empty() {
                        return Ok(Some(line));
                    }
                }
                None => return Ok(None),
            }
        }
    }

    fn decode(&self, line: &str) -> Result<Row> {
        let value: serde_json::Value =
            serde_json::from_str(line).map_err(|e| SourceError::Decode {
                line: self.line_no,
                message: e.to_string(),
            })?;

        let row = match value {
            serde_json::Value::Array(items) => items.into_iter().map(Value::from).collect(),
            serde_json::Value::Object(mut map) => match &self.fields {
                Some(fields) => fields
                    .iter()
                    .map(|f| map.remove(f).map_or(Value::Null, Value::from))
                    .collect(),
                None => map.into_iter().map(|(_, v)| Value::from(v)).collect(),
            },
            scalar => vec![Value::from(scalar)],
        };
        Ok(row)
    }
}

#[async_trait]
impl PageSource for JsonLinesSource {
    async fn fetch(
        &mut self,
        limit: usize,
        offset: u64,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Row>> {
        if offset < self.position {
            return Err(SourceError::Rewind {
                requested: offset,
                position: self.position,
            }
            .into());
        }

        while self.position < offset {
            if self.next_record().await?.is_none() {
                return Ok(Vec::new());
            }
            self.position += 1;
        }

        let mut page = Vec::with_capacity(limit);
        while page.len() < limit {
            let Some(line) = self.next_record().await? else {
                break;
            };
            page.push(self.decode(&line)?);
            self.position += 1;
        }

        trace!(
            "Read {} records from {} (position {})",
            page.len(),
            self.path.display(),
            self.position
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PagezipError;
    use crate::row;
    use futures::FutureExt;

    async fn write_temp(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("pagezip-{}-{}", std::process::id(), name));
        tokio::fs::write(&path, content).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_memory_source_pages() {
        let rows: Vec<Row> = (0..5).map(|i| row![i]).collect();
        let mut source = MemorySource::new(rows);
        let token = CancellationToken::new();

        assert_eq!(source.fetch(2, 0, &token).await.unwrap().len(), 2);
        assert_eq!(source.fetch(2, 4, &token).await.unwrap(), vec![row![4]]);
        assert!(source.fetch(2, 6, &token).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fn_source() {
        let mut source = from_fn(|limit, offset| {
            async move { Ok(vec![row![limit as i64, offset as i64]]) }.boxed()
        });
        let page = source.fetch(3, 9, &CancellationToken::new()).await.unwrap();
        assert_eq!(page, vec![row![3, 9]]);
    }

    #[tokio::test]
    async fn test_jsonl_source_objects_and_arrays() {
        let path = write_temp(
            "mixed.jsonl",
            "{\"b\": 2, \"a\": 1}\n\n[3, \"x\"]\n{\"a\": 5}\n\"solo\"\n",
        )
        .await;
        let token = CancellationToken::new();

        let mut source = JsonLinesSource::open(&path, Some(vec!["a".into(), "b".into()]))
            .await
            .unwrap();
        let page = source.fetch(10, 0, &token).await.unwrap();
        assert_eq!(
            page,
            vec![
                row![1, 2],
                row![3, "x"],
                vec![Value::Int(5), Value::Null],
                row!["solo"],
            ]
        );
        assert!(source.fetch(10, 10, &token).await.unwrap().is_empty());

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn test_jsonl_source_offsets() {
        let content: String = (0..7).map(|i| format!("[{i}]\n")).collect();
        let path = write_temp("offsets.jsonl", &content).await;
        let token = CancellationToken::new();

        let mut source = JsonLinesSource::open(&path, None).await.unwrap();
        assert_eq!(source.fetch(3, 2, &token).await.unwrap(), vec![row![2], row![3], row![4]]);
        assert_eq!(source.fetch(3, 5, &token).await.unwrap(), vec![row![5], row![6]]);

        let err = source.fetch(3, 0, &token).await.unwrap_err();
        assert!(matches!(err, PagezipError::Source(SourceError::Rewind { .. })));

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn test_jsonl_source_decode_error() {
        let path = write_temp("broken.jsonl", "[1]\n{not json\n").await;
        let mut source = JsonLinesSource::open(&path, None).await.unwrap();
        let err = source.fetch(5, 0, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err,
            PagezipError::Source(SourceError::Decode { line: 2, .. })
        ));

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn test_jsonl_source_missing_file() {
        let result = JsonLinesSource::open("/definitely/not/here.jsonl", None).await;
        assert!(matches!(result, Err(PagezipError::Source(SourceError::Fetch(_)))));
    }
}
