//! Core domain types shared by every pipeline stage.
//!
//! Row types double as CSV schemas: their serde names are the exact column
//! headers written to (and read from) disk.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Year label used when a PDF name carries no `nimeYYYY_` prefix.
pub const UNKNOWN_YEAR: &str = "Unknown";

// ---------------------------------------------------------------------------
// PaperRecord
// ---------------------------------------------------------------------------

/// One row of the conference metadata table (`nime_papers.csv`).
///
/// Every column is optional on disk; absent cells deserialize to `""`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub doi: String,
    #[serde(default)]
    pub bibtex: String,
    #[serde(default)]
    pub year: String,
}

impl PaperRecord {
    /// True when title, abstract and keyword field are all blank.
    pub fn has_no_searchable_text(&self) -> bool {
        self.title.is_empty() && self.abstract_text.is_empty() && self.keywords.is_empty()
    }

    /// The text blob searched by the metadata check: title, abstract, keywords.
    pub fn searchable_text(&self) -> String {
        [
            self.title.as_str(),
            self.abstract_text.as_str(),
            self.keywords.as_str(),
        ]
        .join(" ")
    }
}

// ---------------------------------------------------------------------------
// Rename map
// ---------------------------------------------------------------------------

/// How a PDF was matched to its paper ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// File name equals the basename of the record's URL.
    Url,
    /// File stem equals the record's ID.
    IdDirect,
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url => f.write_str("url"),
            Self::IdDirect => f.write_str("id_direct"),
        }
    }
}

/// A row of `rename_map.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameEntry {
    pub original: String,
    pub new_name: String,
    #[serde(rename = "ID")]
    pub id: String,
    pub method: MatchMethod,
}

/// A row of `rename_unmatched.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedEntry {
    pub original: String,
}

// ---------------------------------------------------------------------------
// Filter audit
// ---------------------------------------------------------------------------

/// A row of `filter_results.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRow {
    pub pdf_name: String,
    /// `Yes` or `No`.
    pub contains_keywords: String,
    /// Matched keywords joined by `"; "`.
    pub keywords_found: String,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// KWIC
// ---------------------------------------------------------------------------

/// A single keyword occurrence, as written to `kwic_details_all_instances.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KwicRow {
    #[serde(rename = "Year")]
    pub year: String,
    pub pdf_name: String,
    pub context_before: String,
    pub keyword: String,
    pub matched_word: String,
    pub context_after: String,
    #[serde(default)]
    pub manual_decision: String,
}

/// A row of the screening sheet (`kwic_context_screening.csv`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreeningRow {
    #[serde(rename = "Year")]
    pub year: String,
    pub pdf_name: String,
    #[serde(rename = "Aggregated_Context")]
    pub aggregated_context: String,
    #[serde(rename = "Hit_Count")]
    pub hit_count: usize,
    #[serde(rename = "Auto_Priority_Score")]
    pub auto_priority_score: f64,
    #[serde(rename = "KEEP(1)_or_EXCLUDE(0)")]
    pub keep_or_exclude: String,
    #[serde(rename = "EXCLUSION_REASON")]
    pub exclusion_reason: String,
}

// ---------------------------------------------------------------------------
// Merge outputs
// ---------------------------------------------------------------------------

/// A row of `kwic_screened_metadata.csv`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergedRow {
    #[serde(rename = "Year")]
    pub year: String,
    pub pdf_name: String,
    #[serde(rename = "ID")]
    pub id: String,
    pub title: String,
    pub author: String,
    pub keywords: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub doi: String,
    pub bibtex: String,
}

/// A row of `screened_metadata_results.csv`, the ranked reading list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryRow {
    #[serde(rename = "Year")]
    pub year: String,
    pub pdf_name: String,
    #[serde(rename = "Auto_Priority_Score")]
    pub auto_priority_score: Option<f64>,
    #[serde(rename = "Hit_Count")]
    pub hit_count: Option<usize>,
    pub title: String,
    pub author: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub original_url: String,
}

// ---------------------------------------------------------------------------
// File name helpers
// ---------------------------------------------------------------------------

/// Extract the proceedings year from names like `nime2013_Batula.pdf`.
pub fn year_from_pdf_name(pdf_name: &str) -> String {
    static YEAR_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"nime(\d{4})_").expect("valid regex"));

    YEAR_RE
        .captures(pdf_name)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| UNKNOWN_YEAR.to_string())
}

/// Strip a trailing `.pdf` (exact case) from a file name.
pub fn strip_pdf_extension(name: &str) -> &str {
    name.strip_suffix(".pdf").unwrap_or(name)
}

/// Case-insensitive `.pdf` extension check on a bare file name.
pub fn has_pdf_extension(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".pdf")
}
