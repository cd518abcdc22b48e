//! CSV-backed tables for the screening pipeline.
//!
//! Every stage hands its results to the next one through CSV files. This
//! crate owns reading and writing them:
//! - [`MetadataTable`], the conference metadata indexed by paper ID
//! - typed row I/O via [`read_rows`] / [`write_rows`] and the [`CsvTable`] schemas
//! - [`Sheet`], an untyped view for hand-edited spreadsheets
//!
//! Files written for spreadsheet users carry a UTF-8 BOM; every reader strips
//! one if present.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use nimescreen_shared::{
    FilterRow, KwicRow, MergedRow, NimeScreenError, PaperRecord, RenameEntry, Result,
    ScreeningRow, SummaryRow, UnmatchedEntry,
};

const UTF8_BOM: &str = "\u{feff}";

// ---------------------------------------------------------------------------
// Table schemas
// ---------------------------------------------------------------------------

/// A row type with a fixed column order.
///
/// Headers are written explicitly so that an empty table still gets a header line.
pub trait CsvTable: Serialize {
    const HEADERS: &'static [&'static str];
}

impl CsvTable for RenameEntry {
    const HEADERS: &'static [&'static str] = &["original", "new_name", "ID", "method"];
}

impl CsvTable for UnmatchedEntry {
    const HEADERS: &'static [&'static str] = &["original"];
}

impl CsvTable for FilterRow {
    const HEADERS: &'static [&'static str] =
        &["pdf_name", "contains_keywords", "keywords_found", "reason"];
}

impl CsvTable for KwicRow {
    const HEADERS: &'static [&'static str] = &[
        "Year",
        "pdf_name",
        "context_before",
        "keyword",
        "matched_word",
        "context_after",
        "manual_decision",
    ];
}

impl CsvTable for ScreeningRow {
    const HEADERS: &'static [&'static str] = &[
        "Year",
        "pdf_name",
        "Aggregated_Context",
        "Hit_Count",
        "Auto_Priority_Score",
        "KEEP(1)_or_EXCLUDE(0)",
        "EXCLUSION_REASON",
    ];
}

impl CsvTable for MergedRow {
    const HEADERS: &'static [&'static str] = &[
        "Year", "pdf_name", "ID", "title", "author", "keywords", "abstract", "doi", "bibtex",
    ];
}

impl CsvTable for SummaryRow {
    const HEADERS: &'static [&'static str] = &[
        "Year",
        "pdf_name",
        "Auto_Priority_Score",
        "Hit_Count",
        "title",
        "author",
        "abstract",
        "original_url",
    ];
}

// ---------------------------------------------------------------------------
// Typed row I/O
// ---------------------------------------------------------------------------

/// Options for [`write_rows`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Prefix the file with a UTF-8 byte order mark (for spreadsheet tools).
    pub bom: bool,
}

/// Read a whole file as text, dropping a leading BOM.
fn read_text(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path).map_err(|e| NimeScreenError::io(path, e))?;
    Ok(match content.strip_prefix(UTF8_BOM) {
        Some(rest) => rest.to_string(),
        None => content,
    })
}

/// Deserialize every row of a headed CSV file.
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = read_text(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in reader.deserialize() {
        rows.push(result.map_err(|e| NimeScreenError::csv(path, e))?);
    }
    debug!(?path, rows = rows.len(), "read csv");
    Ok(rows)
}

/// Write `rows` under the table's header, creating parent directories.
pub fn write_rows<T: CsvTable>(path: &Path, rows: &[T], options: WriteOptions) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| NimeScreenError::io(parent, e))?;
    }

    let mut file = File::create(path).map_err(|e| NimeScreenError::io(path, e))?;
    if options.bom {
        file.write_all(UTF8_BOM.as_bytes())
            .map_err(|e| NimeScreenError::io(path, e))?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer
        .write_record(T::HEADERS)
        .map_err(|e| NimeScreenError::csv(path, e))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| NimeScreenError::csv(path, e))?;
    }
    writer.flush().map_err(|e| NimeScreenError::io(path, e))?;

    debug!(?path, rows = rows.len(), "wrote csv");
    Ok(())
}

// ---------------------------------------------------------------------------
// Metadata table
// ---------------------------------------------------------------------------

/// The conference metadata table, indexed by trimmed paper ID.
#[derive(Debug, Clone, Default)]
pub struct MetadataTable {
    records: Vec<PaperRecord>,
    by_id: HashMap<String, usize>,
}

impl MetadataTable {
    /// Load `nime_papers.csv`. Rows without an ID are dropped.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(NimeScreenError::missing_input(
                path,
                "the conference metadata table",
            ));
        }

        let rows: Vec<PaperRecord> = read_rows(path)?;
        let table = Self::from_records(rows);
        tracing::info!(?path, papers = table.len(), "loaded metadata");
        Ok(table)
    }

    /// Build a table from in-memory records. The first record wins on duplicate IDs.
    pub fn from_records(records: impl IntoIterator<Item = PaperRecord>) -> Self {
        let mut table = Self::default();
        for mut record in records {
            record.id = record.id.trim().to_string();
            if record.id.is_empty() {
                continue;
            }
            let idx = table.records.len();
            table.by_id.entry(record.id.clone()).or_insert(idx);
            table.records.push(record);
        }
        table
    }

    /// Look up a record by paper ID.
    pub fn get(&self, id: &str) -> Option<&PaperRecord> {
        self.by_id.get(id).map(|&idx| &self.records[idx])
    }

    /// All records with a non-empty ID, in file order.
    pub fn records(&self) -> &[PaperRecord] {
        &self.records
    }

    /// Number of distinct IDs.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Untyped sheets
// ---------------------------------------------------------------------------

/// A CSV file read as plain strings, for sheets edited by hand.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    /// Read a headed CSV file. Short rows are padded with empty cells.
    pub fn read(path: &Path) -> Result<Self> {
        let content = read_text(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| NimeScreenError::csv(path, e))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| NimeScreenError::csv(path, e))?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(headers.len().max(row.len()), String::new());
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    /// Index of the column named exactly `name`.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Index of the first column whose uppercased name contains `needle`.
    pub fn column_containing(&self, needle: &str) -> Option<usize> {
        let needle = needle.to_uppercase();
        self.headers
            .iter()
            .position(|h| h.to_uppercase().contains(&needle))
    }

    /// Cell value, or `""` when the row is short.
    pub fn cell<'a>(&self, row: &'a [String], column: Option<usize>) -> &'a str {
        column
            .and_then(|idx| row.get(idx))
            .map(String::as_str)
            .unwrap_or("")
    }
}
