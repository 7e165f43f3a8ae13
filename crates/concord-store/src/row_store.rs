//! # Append-Only Row Store
//!
//! The row store is the only durable state of a run and the resume point
//! after a crash. It is a CSV file written by exactly one writer, one
//! batch at a time.
//!
//! ## Layout
//!
//! | Column | Content |
//! |--------|---------|
//! | `row_index` | 1-based corpus position, unique |
//! | `reference_label` | `0` toxic, `1` neutral, empty when absent |
//! | `text` | corpus text, line breaks flattened |
//! | `label_<source>` | one word label per configured source |
//! | `failed_sources` | `;`-separated sources whose label is a fail-safe |
//!
//! ## Durability
//!
//! [`RowStore::append_batch`] encodes a whole batch in memory, appends it
//! with a single `write_all` and calls `sync_data` before returning.
//!
//! A crash can still leave a torn last line. [`RowStore::open`] cuts the
//! file back to the last complete record when the final line has no
//! newline, the wrong number of fields, an unparseable or already
//! committed `row_index`. The same defects on any earlier line are an
//! error.
//!
//! ## Resume
//!
//! Every committed `row_index` is tracked; [`RowStore::contains`] tells
//! the runner which corpus units are done. Rows re-run after a skipped
//! batch land after higher indices in the file, so [`RowTable::read`]
//! returns rows in `row_index` order. [`RowStore::resume_offset`] is the
//! highest committed `row_index`.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use concord_adjudicator::Label;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::text::flatten_text;

/// First fixed column.
pub const ROW_INDEX_COLUMN: &str = "row_index";
/// Second fixed column.
pub const REFERENCE_COLUMN: &str = "reference_label";
/// Third fixed column.
pub const TEXT_COLUMN: &str = "text";
/// Trailing failure column.
pub const FAILED_COLUMN: &str = "failed_sources";
/// Prefix of per-source label columns.
pub const LABEL_PREFIX: &str = "label_";

const FAILED_SEPARATOR: &str = ";";

/// Builds the header for a source list.
#[must_use]
pub fn header(sources: &[String]) -> Vec<String> {
    let mut columns = vec![
        ROW_INDEX_COLUMN.to_string(),
        REFERENCE_COLUMN.to_string(),
        TEXT_COLUMN.to_string(),
    ];
    columns.extend(sources.iter().map(|s| format!("{LABEL_PREFIX}{s}")));
    columns.push(FAILED_COLUMN.to_string());
    columns
}

/// One persisted row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    /// Corpus position.
    pub row_index: u64,
    /// Reference annotation.
    pub reference: Option<Label>,
    /// Flattened text.
    pub text: String,
    /// One label per source, in header order.
    pub labels: Vec<Label>,
    /// Sources whose label is a fail-safe substitution.
    pub failed_sources: Vec<String>,
}

impl StoredRow {
    /// Creates a row, flattening the text.
    pub fn new(row_index: u64, reference: Option<Label>, text: &str, labels: Vec<Label>) -> Self {
        Self {
            row_index,
            reference,
            text: flatten_text(text),
            labels,
            failed_sources: Vec::new(),
        }
    }

    /// Records the fail-safe sources.
    pub fn with_failed_sources(mut self, failed: Vec<String>) -> Self {
        self.failed_sources = failed;
        self
    }

    /// True when `source`'s label on this row is a fail-safe substitution.
    pub fn is_failed(&self, source: &str) -> bool {
        self.failed_sources.iter().any(|s| s == source)
    }

    fn to_record(&self) -> Vec<String> {
        let mut record = Vec::with_capacity(self.labels.len() + 4);
        record.push(self.row_index.to_string());
        record.push(
            self.reference
                .and_then(Label::reference_code)
                .map(|c| c.to_string())
                .unwrap_or_default(),
        );
        record.push(self.text.clone());
        record.extend(self.labels.iter().map(|l| l.as_str().to_string()));
        record.push(self.failed_sources.join(FAILED_SEPARATOR));
        record
    }
}

/// Reads a reference cell: canonical code or a label word.
fn parse_reference(cell: &str) -> Option<Label> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    match cell.parse::<u8>() {
        Ok(code) => Label::from_reference_code(code),
        Err(_) => Some(Label::from_cell(cell)).filter(|l| l.is_known()),
    }
}

/// Layout of a parsed header.
struct Layout {
    sources: Vec<String>,
    has_failed_column: bool,
}

fn parse_header(path: &Path, headers: &csv::StringRecord) -> Result<Layout> {
    let cells: Vec<&str> = headers.iter().map(str::trim).collect();
    for (idx, column) in [ROW_INDEX_COLUMN, REFERENCE_COLUMN, TEXT_COLUMN]
        .into_iter()
        .enumerate()
    {
        if cells.get(idx) != Some(&column) {
            return Err(StoreError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            });
        }
    }

    let mut sources = Vec::new();
    let mut has_failed_column = false;
    for cell in &cells[3..] {
        if *cell == FAILED_COLUMN {
            has_failed_column = true;
        } else if let Some(name) = cell.strip_prefix(LABEL_PREFIX) {
            sources.push(name.to_string());
        } else {
            sources.push((*cell).to_string());
        }
    }
    Ok(Layout {
        sources,
        has_failed_column,
    })
}

fn parse_record(path: &Path, layout: &Layout, record: &csv::StringRecord) -> Result<StoredRow> {
    let invalid = |row: u64, reason: String| StoreError::InvalidRow {
        path: path.to_path_buf(),
        row,
        reason,
    };
    let line = record.position().map(|p| p.line()).unwrap_or_default();

    let row_index = record
        .get(0)
        .and_then(|c| c.trim().parse::<u64>().ok())
        .ok_or_else(|| invalid(line, "row_index is not an integer".to_string()))?;

    let labels = (0..layout.sources.len())
        .map(|i| Label::from_cell(record.get(3 + i).unwrap_or_default()))
        .collect();

    let failed_sources = if layout.has_failed_column {
        record
            .get(3 + layout.sources.len())
            .unwrap_or_default()
            .split(FAILED_SEPARATOR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };

    Ok(StoredRow {
        row_index,
        reference: parse_reference(record.get(1).unwrap_or_default()),
        text: record.get(2).unwrap_or_default().to_string(),
        labels,
        failed_sources,
    })
}

/// An in-memory copy of a whole row store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowTable {
    /// Source names in column order.
    pub sources: Vec<String>,
    /// Rows in file order.
    pub rows: Vec<StoredRow>,
}

impl RowTable {
    /// Creates a table.
    pub fn new(sources: Vec<String>, rows: Vec<StoredRow>) -> Self {
        Self { sources, rows }
    }

    /// Reads a row store from disk, rows sorted by `row_index`.
    ///
    /// Older stores without the `failed_sources` column, or with bare
    /// source names instead of `label_*` headers, are accepted.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let layout = parse_header(path, reader.headers()?)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(parse_record(path, &layout, &record?)?);
        }
        rows.sort_by_key(|r: &StoredRow| r.row_index);
        debug!(path = %path.display(), rows = rows.len(), "row table read");
        Ok(Self {
            sources: layout.sources,
            rows,
        })
    }

    /// Writes the table, header included, replacing any existing file.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        writer.write_record(header(&self.sources))?;
        for row in &self.rows {
            writer.write_record(row.to_record())?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column position of `source`.
    pub fn source_index(&self, source: &str) -> Option<usize> {
        self.sources.iter().position(|s| s == source)
    }
}

/// Single-writer handle on the durable row store.
#[derive(Debug)]
pub struct RowStore {
    path: PathBuf,
    sources: Vec<String>,
    committed: BTreeSet<u64>,
}

/// Checks one stored record, returning its `row_index`.
fn check_record(
    record: &csv::StringRecord,
    width: usize,
    committed: &BTreeSet<u64>,
) -> std::result::Result<u64, String> {
    if record.len() != width {
        return Err(format!("{} fields, expected {width}", record.len()));
    }
    let index = record
        .get(0)
        .and_then(|c| c.trim().parse::<u64>().ok())
        .ok_or_else(|| "row_index is not an integer".to_string())?;
    if committed.contains(&index) {
        return Err(format!("row_index {index} is already committed"));
    }
    Ok(index)
}

impl RowStore {
    /// Opens the store at `path` for `sources`, creating it when absent.
    ///
    /// A torn last record is cut off and the file truncated to the last
    /// complete one.
    ///
    /// # Errors
    ///
    /// [`StoreError::HeaderMismatch`] when an existing store was written
    /// for a different source list, [`StoreError::InvalidRow`] when a
    /// record before the last one is malformed.
    pub fn open(path: impl Into<PathBuf>, sources: &[String]) -> Result<Self> {
        let path = path.into();
        let expected = header(sources);

        let bytes = if path.exists() { std::fs::read(&path)? } else { Vec::new() };
        let complete = bytes.iter().rposition(|b| *b == b'\n').map_or(0, |p| p + 1);
        if complete == 0 {
            if !bytes.is_empty() {
                warn!(path = %path.display(), bytes = bytes.len(), "row store header is torn, recreating");
            }
            return Self::create(path, sources, &expected);
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(&bytes[..complete]);
        let found: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        if found != expected {
            return Err(StoreError::HeaderMismatch {
                path,
                expected,
                found,
            });
        }

        let records = reader
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut committed = BTreeSet::new();
        let mut cut = complete as u64;
        for (i, record) in records.iter().enumerate() {
            match check_record(record, expected.len(), &committed) {
                Ok(index) => {
                    committed.insert(index);
                }
                Err(reason) if i + 1 == records.len() => {
                    cut = record.position().map_or(cut, |p| p.byte());
                    warn!(path = %path.display(), line = i + 2, reason = %reason, "dropping torn last row");
                }
                Err(reason) => {
                    return Err(StoreError::InvalidRow {
                        path,
                        row: (i + 2) as u64,
                        reason,
                    });
                }
            }
        }

        if cut < bytes.len() as u64 {
            let file = OpenOptions::new().write(true).open(&path)?;
            file.set_len(cut)?;
            file.sync_data()?;
            warn!(
                path = %path.display(),
                dropped_bytes = bytes.len() as u64 - cut,
                "truncated row store to last complete record"
            );
        }

        let store = Self {
            path,
            sources: sources.to_vec(),
            committed,
        };
        info!(
            path = %store.path.display(),
            rows = store.len(),
            resume_offset = store.resume_offset(),
            "opened existing row store"
        );
        Ok(store)
    }

    fn create(path: PathBuf, sources: &[String], header: &[String]) -> Result<Self> {
        let file = File::create(&path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(header)?;
        writer.flush()?;
        let file = writer.into_inner().map_err(|e| StoreError::Io(e.into_error()))?;
        file.sync_data()?;
        info!(path = %path.display(), sources = sources.len(), "created row store");
        Ok(Self {
            path,
            sources: sources.to_vec(),
            committed: BTreeSet::new(),
        })
    }

    /// Store location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Source names in column order.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Number of durable data rows.
    pub fn len(&self) -> u64 {
        self.committed.len() as u64
    }

    /// True when no data row has been written.
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    /// True when `row_index` is durable.
    pub fn contains(&self, row_index: u64) -> bool {
        self.committed.contains(&row_index)
    }

    /// Highest durable `row_index`, `0` for an empty store.
    pub fn resume_offset(&self) -> u64 {
        self.committed.last().copied().unwrap_or(0)
    }

    /// Appends a batch and makes it durable.
    ///
    /// Rows must carry one label per source, strictly increasing
    /// `row_index` values within the batch, and indices not yet committed.
    pub fn append_batch(&mut self, batch: &[StoredRow]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut previous: Option<u64> = None;
        for row in batch {
            let invalid = |reason: String| StoreError::InvalidRow {
                path: self.path.clone(),
                row: row.row_index,
                reason,
            };
            if row.labels.len() != self.sources.len() {
                return Err(invalid(format!(
                    "{} labels for {} sources",
                    row.labels.len(),
                    self.sources.len()
                )));
            }
            if previous.is_some_and(|p| row.row_index <= p) {
                return Err(invalid("row_index is not increasing".to_string()));
            }
            if self.contains(row.row_index) {
                return Err(invalid("row_index is already committed".to_string()));
            }
            previous = Some(row.row_index);
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        for row in batch {
            writer.write_record(row.to_record())?;
        }
        let buffer = writer.into_inner().map_err(|e| StoreError::Io(e.into_error()))?;

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(&buffer)?;
        file.sync_data()?;

        self.committed.extend(batch.iter().map(|r| r.row_index));
        debug!(
            rows = batch.len(),
            bytes = buffer.len(),
            resume_offset = self.resume_offset(),
            "batch committed to row store"
        );
        Ok(())
    }

    /// Reads the whole store back.
    pub fn read_all(&self) -> Result<RowTable> {
        RowTable::read(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> Vec<String> {
        vec!["gemini".to_string(), "openai".to_string()]
    }

    fn row(index: u64, text: &str, labels: [Label; 2]) -> StoredRow {
        StoredRow::new(index, Some(Label::Toxic), text, labels.to_vec())
    }

    #[test]
    fn test_header_layout() {
        assert_eq!(
            header(&sources()),
            vec![
                "row_index",
                "reference_label",
                "text",
                "label_gemini",
                "label_openai",
                "failed_sources"
            ]
        );
    }

    #[test]
    fn test_open_creates_header_only_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let store = RowStore::open(&path, &sources()).unwrap();

        assert!(store.is_empty());
        assert_eq!(store.resume_offset(), 0);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn test_append_and_reopen_keeps_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let mut store = RowStore::open(&path, &sources()).unwrap();
        store
            .append_batch(&[
                row(1, "a", [Label::Toxic, Label::Toxic]),
                row(2, "b", [Label::Neutral, Label::Toxic]),
            ])
            .unwrap();
        assert_eq!(store.len(), 2);
        drop(store);

        let reopened = RowStore::open(&path, &sources()).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.resume_offset(), 2);
    }

    #[test]
    fn test_header_mismatch_on_resume() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        RowStore::open(&path, &sources()).unwrap();

        let err = RowStore::open(&path, &["gemini".to_string()]).unwrap_err();
        assert!(matches!(err, StoreError::HeaderMismatch { .. }));
    }

    #[test]
    fn test_append_rejects_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RowStore::open(dir.path().join("log.csv"), &sources()).unwrap();

        let short = StoredRow::new(1, None, "x", vec![Label::Toxic]);
        assert!(store.append_batch(&[short]).is_err());

        store.append_batch(&[row(5, "x", [Label::Toxic, Label::Toxic])]).unwrap();
        let stale = row(5, "y", [Label::Toxic, Label::Toxic]);
        assert!(store.append_batch(&[stale]).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_gap_fill_is_accepted_and_read_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let mut store = RowStore::open(&path, &sources()).unwrap();
        store.append_batch(&[row(1, "a", [Label::Toxic, Label::Toxic])]).unwrap();
        store.append_batch(&[row(4, "d", [Label::Toxic, Label::Toxic])]).unwrap();
        store
            .append_batch(&[
                row(2, "b", [Label::Neutral, Label::Neutral]),
                row(3, "c", [Label::Neutral, Label::Neutral]),
            ])
            .unwrap();

        assert!(store.contains(3));
        assert_eq!(store.resume_offset(), 4);
        let ids: Vec<u64> = store.read_all().unwrap().rows.iter().map(|r| r.row_index).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        let reopened = RowStore::open(&path, &sources()).unwrap();
        assert_eq!(reopened.len(), 4);
    }

    #[test]
    fn test_open_cuts_torn_last_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let mut store = RowStore::open(&path, &sources()).unwrap();
        store.append_batch(&[row(11, "x", [Label::Toxic, Label::Toxic])]).unwrap();
        drop(store);
        let intact = std::fs::read(&path).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"1").unwrap();
        drop(file);

        let mut reopened = RowStore::open(&path, &sources()).unwrap();
        assert_eq!(reopened.resume_offset(), 11);
        assert_eq!(reopened.len(), 1);
        assert_eq!(std::fs::read(&path).unwrap(), intact);

        reopened.append_batch(&[row(12, "y", [Label::Neutral, Label::Neutral])]).unwrap();
        let ids: Vec<u64> = reopened.read_all().unwrap().rows.iter().map(|r| r.row_index).collect();
        assert_eq!(ids, vec![11, 12]);
    }

    #[test]
    fn test_open_cuts_short_last_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let mut store = RowStore::open(&path, &sources()).unwrap();
        store.append_batch(&[row(1, "a", [Label::Toxic, Label::Toxic])]).unwrap();
        drop(store);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"2,0,b\n").unwrap();
        drop(file);

        let store = RowStore::open(&path, &sources()).unwrap();
        assert_eq!(store.resume_offset(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_open_rejects_corruption_before_last_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        std::fs::write(
            &path,
            "row_index,reference_label,text,label_gemini,label_openai,failed_sources\n\
             1,0,a,toxic\n\
             2,0,b,toxic,toxic,\n",
        )
        .unwrap();

        let err = RowStore::open(&path, &sources()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRow { row: 2, .. }));
    }

    #[test]
    fn test_open_recreates_torn_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        std::fs::write(&path, "row_index,refer").unwrap();

        let store = RowStore::open(&path, &sources()).unwrap();
        assert!(store.is_empty());
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("row_index,reference_label,text"));
    }

    #[test]
    fn test_round_trip_preserves_failures_and_flattening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let mut store = RowStore::open(&path, &sources()).unwrap();
        let failed = StoredRow::new(
            1,
            Some(Label::Neutral),
            "multi\nline, \"quoted\"",
            vec![Label::Toxic, Label::Neutral],
        )
        .with_failed_sources(vec!["gemini".to_string()]);
        store.append_batch(&[failed]).unwrap();

        let table = store.read_all().unwrap();
        assert_eq!(table.sources, sources());
        let read = &table.rows[0];
        assert_eq!(read.text, "multi line, \"quoted\"");
        assert_eq!(read.reference, Some(Label::Neutral));
        assert!(read.is_failed("gemini"));
        assert!(!read.is_failed("openai"));
    }

    #[test]
    fn test_reads_legacy_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.csv");
        std::fs::write(
            &path,
            "row_index,reference_label,text,prediction_gpt,prediction_claude\n1,0,bad,harassment,Positive\n",
        )
        .unwrap();

        let table = RowTable::read(&path).unwrap();
        assert_eq!(table.sources, vec!["prediction_gpt", "prediction_claude"]);
        assert_eq!(table.rows[0].labels, vec![Label::Toxic, Label::Neutral]);
        assert!(table.rows[0].failed_sources.is_empty());
    }

    #[test]
    fn test_table_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unique.csv");
        let table = RowTable::new(sources(), vec![row(3, "c", [Label::Unknown, Label::Neutral])]);
        table.write(&path).unwrap();

        let read = RowTable::read(&path).unwrap();
        assert_eq!(read, table);
        assert_eq!(read.source_index("openai"), Some(1));
    }
}
