//! End-to-end export scenarios: pagination, rotation and archive contents.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{PagezipError, Result, SerializationError, SourceError};
use crate::row;

use super::*;

/// Seekable stream that accepts `budget` bytes and then fails
pub(crate) struct ShortStream {
    budget: usize,
    position: u64,
}

impl ShortStream {
    pub(crate) fn new(budget: usize) -> Self {
        Self {
            budget,
            position: 0,
        }
    }
}

impl Write for ShortStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.budget == 0 {
            return Err(io::Error::other("no space left on device"));
        }
        let n = buf.len().min(self.budget);
        self.budget -= n;
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for ShortStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if let SeekFrom::Start(p) = pos {
            self.position = p;
        }
        Ok(self.position)
    }
}

/// Source over in-memory rows that counts calls and can fail or cancel
struct ScriptedSource {
    data: Vec<Row>,
    calls: Arc<AtomicUsize>,
    fail_on_call: Option<usize>,
    cancel_after_call: Option<(usize, CancellationToken)>,
}

impl ScriptedSource {
    fn new(data: Vec<Row>) -> Self {
        Self {
            data,
            calls: Arc::new(AtomicUsize::new(0)),
            fail_on_call: None,
            cancel_after_call: None,
        }
    }

    fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    fn cancelling_after(mut self, call: usize, token: CancellationToken) -> Self {
        self.cancel_after_call = Some((call, token));
        self
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    async fn fetch(
        &mut self,
        limit: usize,
        offset: u64,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Row>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(PagezipError::fetch("connection reset"));
        }

        let start = (offset as usize).min(self.data.len());
        let end = (start + limit).min(self.data.len());
        let page = self.data[start..end].to_vec();

        if let Some((after, token)) = &self.cancel_after_call {
            if call == *after {
                token.cancel();
            }
        }
        Ok(page)
    }
}

fn dataset(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| {
            let s = i.to_string();
            row![s.clone(), s.clone(), s.clone(), s.clone(), s]
        })
        .collect()
}

fn options(page_size: usize, rotation_threshold: usize) -> ExportOptions {
    ExportOptions::default()
        .with_page_size(page_size)
        .with_rotation_threshold(rotation_threshold)
}

fn build(format: &str, source: ScriptedSource, options: ExportOptions) -> ExportEngine {
    ExportEngine::new(
        &DriverRegistry::builtin(),
        format,
        "test_csv",
        Box::new(source),
        options,
    )
    .unwrap()
}

/// Decode every entry of a CSV archive, in archive order
fn read_csv_entries(bytes: Vec<u8>) -> Vec<(String, Vec<Vec<String>>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut content = Vec::new();
            file.read_to_end(&mut content).unwrap();
            let rows = csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_reader(content.as_slice())
                .records()
                .map(|r| r.unwrap().iter().map(str::to_string).collect())
                .collect();
            (file.name().to_string(), rows)
        })
        .collect()
}

fn as_strings(rows: &[Row]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|r| r.iter().map(Value::to_string).collect())
        .collect()
}

#[tokio::test]
async fn test_export_8000_rows_in_three_chunks() {
    let data = dataset(8000);
    let mut engine = build("csv", ScriptedSource::new(data.clone()), ExportOptions::default());
    engine.run(&CancellationToken::new()).await.unwrap();

    let mut zip_bytes = Vec::new();
    let n = engine.write_archive_to(&mut zip_bytes).unwrap();
    assert_eq!(n as usize, zip_bytes.len());

    let entries = read_csv_entries(zip_bytes);
    let names: Vec<&str> = entries.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["test_csv_1.csv", "test_csv_2.csv", "test_csv_3.csv"]);

    let sizes: Vec<usize> = entries.iter().map(|(_, rows)| rows.len()).collect();
    assert_eq!(sizes, vec![3000, 3000, 2000]);

    let expected = as_strings(&data);
    assert_eq!(entries[0].1, expected[..3000]);
    assert_eq!(entries[1].1, expected[3000..6000]);
    assert_eq!(entries[2].1, expected[6000..]);
}

#[tokio::test]
async fn test_empty_source_produces_empty_archive() {
    let source = ScriptedSource::new(Vec::new());
    let calls = source.calls.clone();
    let mut engine = build("csv", source, ExportOptions::default());
    engine.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(engine.chunks().is_empty());
    assert!(engine.is_archive_closed());

    let bytes = engine.archive_bytes().unwrap().to_vec();
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert_eq!(archive.len(), 0);
}

#[tokio::test]
async fn test_chunk_count_is_ceiling_of_rows_over_threshold() {
    let cases = [
        (0, 5, 5),
        (1, 5, 5),
        (5, 5, 5),
        (6, 5, 5),
        (23, 2, 7),
        (30, 10, 10),
        (31, 3, 10),
        (100, 1, 1),
    ];

    for (n, page_size, threshold) in cases {
        let data = dataset(n);
        let mut engine = build("csv", ScriptedSource::new(data.clone()), options(page_size, threshold));
        engine.run(&CancellationToken::new()).await.unwrap();

        let expected_chunks = n.div_ceil(threshold);
        let entries = read_csv_entries(engine.archive_bytes().unwrap().to_vec());
        assert_eq!(entries.len(), expected_chunks, "n={n} page={page_size} t={threshold}");

        for (k, (name, rows)) in entries.iter().enumerate() {
            assert_eq!(name, &format!("test_csv_{}.csv", k + 1));
            if k + 1 < entries.len() {
                assert_eq!(rows.len(), threshold);
            } else {
                let rem = n % threshold;
                assert_eq!(rows.len(), if rem == 0 { threshold } else { rem });
            }
        }

        let rebuilt: Vec<Vec<String>> = entries.into_iter().flat_map(|(_, rows)| rows).collect();
        assert_eq!(rebuilt, as_strings(&data), "n={n} page={page_size} t={threshold}");

        let summary = engine.summary();
        assert_eq!(summary.rows as usize, n);
        assert_eq!(summary.chunks.len(), expected_chunks);
    }
}

#[tokio::test]
async fn test_fetch_error_is_returned_unchanged() {
    let source = ScriptedSource::new(dataset(8000)).failing_on(2);
    let calls = source.calls.clone();
    let mut engine = build("csv", source, ExportOptions::default());

    let err = engine.run(&CancellationToken::new()).await.unwrap_err();
    match err {
        PagezipError::Source(SourceError::Fetch(msg)) => assert_eq!(msg, "connection reset"),
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    // 3000 rows fit in the first chunk, which was never rotated out
    assert!(engine.chunks().is_empty());
    assert!(engine.is_archive_closed());

    let mut out = Vec::new();
    assert!(matches!(
        engine.write_archive_to(&mut out),
        Err(PagezipError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_fetch_error_keeps_finalized_chunks() {
    let source = ScriptedSource::new(dataset(100)).failing_on(3);
    let mut engine = build("csv", source, options(10, 10));

    assert!(engine.run(&CancellationToken::new()).await.is_err());
    // The first chunk was rotated out when the second page arrived
    assert_eq!(engine.chunks().len(), 1);
    assert_eq!(engine.chunks()[0].name, "test_csv_1.csv");
    assert_eq!(engine.chunks()[0].rows, 10);
    assert!(engine.is_archive_closed());
    assert!(engine.summary().archive_bytes.is_some());
}

#[tokio::test]
async fn test_cancellation_stops_fetching() {
    let token = CancellationToken::new();
    let source = ScriptedSource::new(dataset(100)).cancelling_after(2, token.clone());
    let calls = source.calls.clone();
    let mut engine = build("csv", source, options(10, 10));

    let err = engine.run(&token).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Rows of the second page stay buffered; no trailing flush on cancellation
    assert_eq!(engine.chunks().len(), 1);
    assert_eq!(engine.summary().rows, 20);
    assert!(engine.is_archive_closed());
}

#[tokio::test]
async fn test_cancelled_before_run_fetches_nothing() {
    let token = CancellationToken::new();
    token.cancel();

    let source = ScriptedSource::new(dataset(10));
    let calls = source.calls.clone();
    let mut engine = build("csv", source, ExportOptions::default());

    assert!(matches!(
        engine.run(&token).await,
        Err(PagezipError::Cancelled)
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(engine.is_archive_closed());
}

#[tokio::test]
async fn test_short_page_does_not_end_export() {
    // Only an empty page ends the loop; a short page just advances the offset
    let source = ScriptedSource::new(dataset(12));
    let calls = source.calls.clone();
    let mut engine = build("csv", source, options(5, 5));
    engine.run(&CancellationToken::new()).await.unwrap();

    // offsets 0, 5, 10 (short), 15 (empty)
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(engine.offset(), 15);
    let rows: Vec<u64> = engine.chunks().iter().map(|c| c.rows).collect();
    assert_eq!(rows, vec![5, 5, 2]);
}

#[tokio::test]
async fn test_xlsx_export_entries() {
    let mut engine = build("xlsx", ScriptedSource::new(dataset(25)), options(10, 10));
    engine.run(&CancellationToken::new()).await.unwrap();

    let bytes = engine.archive_bytes().unwrap().to_vec();
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut names: Vec<&str> = archive.file_names().collect();
    names.sort_unstable();
    assert_eq!(names, vec!["test_csv_1.xlsx", "test_csv_2.xlsx", "test_csv_3.xlsx"]);
}

#[tokio::test]
async fn test_jsonl_export_preserves_types() {
    let data = vec![row![1, "a", true], row![2.5, None::<i64>]];
    let mut engine = build("jsonl", ScriptedSource::new(data), options(1, 5));
    engine.run(&CancellationToken::new()).await.unwrap();

    let bytes = engine.archive_bytes().unwrap().to_vec();
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut content = String::new();
    archive
        .by_name("test_csv_1.jsonl")
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "[1,\"a\",true]\n[2.5,null]\n");
}

struct FailingDriver {
    fail_at_row: u64,
}

struct FailingWriter {
    fail_at_row: u64,
    rows: u64,
}

impl FormatDriver for FailingDriver {
    fn new_writer(&self) -> Box<dyn RowWriter> {
        Box::new(FailingWriter {
            fail_at_row: self.fail_at_row,
            rows: 0,
        })
    }

    fn suffix(&self) -> &str {
        ".txt"
    }
}

impl RowWriter for FailingWriter {
    fn write_row(&mut self, _row: &[Value]) -> Result<()> {
        if self.rows + 1 == self.fail_at_row {
            return Err(SerializationError::WriteRow {
                format: "txt".to_string(),
                message: "encoder exploded".to_string(),
            }
            .into());
        }
        self.rows += 1;
        Ok(())
    }

    fn flush_to(self: Box<Self>, sink: &mut dyn Write) -> Result<u64> {
        sink.write_all(b"ok")?;
        Ok(2)
    }

    fn rows(&self) -> u64 {
        self.rows
    }
}

#[tokio::test]
async fn test_writer_failure_closes_archive() {
    let mut registry = DriverRegistry::new();
    registry.register("txt", FailingDriver { fail_at_row: 4 }).unwrap();

    let mut engine = ExportEngine::new(
        &registry,
        "txt",
        "broken",
        Box::new(ScriptedSource::new(dataset(10))),
        options(5, 5),
    )
    .unwrap();

    let err = engine.run(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
        err,
        PagezipError::Serialization(SerializationError::WriteRow { .. })
    ));
    assert!(engine.is_archive_closed());
    assert!(engine.chunks().is_empty());
}
