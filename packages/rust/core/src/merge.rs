//! Join the hand-screened sheet back to the conference metadata.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{info, instrument, warn};

use nimescreen_shared::{
    MergeConfig, MergedRow, NimeScreenError, PaperRecord, RenameEntry, Result, SummaryRow, layout,
};
use nimescreen_storage::{MetadataTable, Sheet, WriteOptions, read_rows, write_rows};

/// Exact header of the decision column in a freshly generated sheet.
pub const KEEP_COLUMN: &str = "KEEP(1)_or_EXCLUDE(0)";

/// `new_name -> ID` for every matched PDF.
pub fn join_rename_map(entries: &[RenameEntry]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|e| (e.new_name.clone(), e.id.clone()))
        .collect()
}

/// A kept screening row, reduced to the fields the outputs need.
#[derive(Debug, Clone, PartialEq)]
pub struct KeptPaper {
    pub year: String,
    pub pdf_name: String,
    pub score: Option<f64>,
    pub hit_count: Option<usize>,
}

/// Rows whose decision cell is `1` (after trimming), in sheet order.
pub fn kept_papers(sheet: &Sheet) -> Result<Vec<KeptPaper>> {
    let keep = sheet
        .column(KEEP_COLUMN)
        .or_else(|| sheet.column_containing("KEEP"))
        .ok_or_else(|| NimeScreenError::validation("screening sheet has no KEEP column"))?;
    let pdf_name = sheet
        .column("pdf_name")
        .ok_or_else(|| NimeScreenError::validation("screening sheet has no pdf_name column"))?;
    let year = sheet.column("Year");
    let score = sheet.column("Auto_Priority_Score");
    let hits = sheet.column("Hit_Count");

    Ok(sheet
        .rows
        .iter()
        .filter(|row| sheet.cell(row, Some(keep)).trim() == "1")
        .map(|row| KeptPaper {
            year: sheet.cell(row, year).to_string(),
            pdf_name: sheet.cell(row, Some(pdf_name)).to_string(),
            score: sheet.cell(row, score).trim().parse().ok(),
            hit_count: sheet.cell(row, hits).trim().parse().ok(),
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct MergeReport {
    pub kept: usize,
    /// Kept papers with no metadata record after both joins.
    pub unresolved: usize,
    /// Output files; empty when nothing was kept.
    pub outputs: Vec<PathBuf>,
}

#[instrument(skip_all, fields(sheet = %config.screening_csv.display()))]
pub fn run_merge(config: &MergeConfig) -> Result<MergeReport> {
    if !config.screening_csv.is_file() {
        return Err(NimeScreenError::missing_input(
            &config.screening_csv,
            "the screening sheet; run `nimescreen kwic` and fill in the KEEP column",
        ));
    }
    let sheet = Sheet::read(&config.screening_csv)?;
    let kept = kept_papers(&sheet)?;

    if kept.is_empty() {
        warn!("no papers marked KEEP(1); nothing to merge");
        return Ok(MergeReport {
            kept: 0,
            unresolved: 0,
            outputs: Vec::new(),
        });
    }

    if !config.rename_map_csv.is_file() {
        return Err(NimeScreenError::missing_input(
            &config.rename_map_csv,
            "the rename map; run `nimescreen rename` first",
        ));
    }
    let rename_map: Vec<RenameEntry> = read_rows(&config.rename_map_csv)?;
    let ids = join_rename_map(&rename_map);
    let metadata = MetadataTable::load(&config.metadata_csv)?;

    let mut merged = Vec::with_capacity(kept.len());
    let mut summary = Vec::with_capacity(kept.len());
    let mut unresolved = 0;

    for paper in &kept {
        let id = ids.get(&paper.pdf_name).cloned().unwrap_or_default();
        let record = match metadata.get(&id) {
            Some(record) => record.clone(),
            None => {
                unresolved += 1;
                PaperRecord::default()
            }
        };

        summary.push(SummaryRow {
            year: paper.year.clone(),
            pdf_name: paper.pdf_name.clone(),
            auto_priority_score: paper.score,
            hit_count: paper.hit_count,
            title: record.title.clone(),
            author: record.author.clone(),
            abstract_text: record.abstract_text.clone(),
            original_url: record.url,
        });
        merged.push(MergedRow {
            year: paper.year.clone(),
            pdf_name: paper.pdf_name.clone(),
            id,
            title: record.title,
            author: record.author,
            keywords: record.keywords,
            abstract_text: record.abstract_text,
            doi: record.doi,
            bibtex: record.bibtex,
        });
    }

    summary.sort_by(|a, b| by_score_desc(a.auto_priority_score, b.auto_priority_score));

    let merged_csv = config.output_dir.join(layout::SCREENED_METADATA_FILE);
    let summary_csv = config.output_dir.join(layout::SCREENED_SUMMARY_FILE);
    write_rows(&merged_csv, &merged, WriteOptions { bom: true })?;
    write_rows(&summary_csv, &summary, WriteOptions { bom: true })?;

    info!(kept = kept.len(), unresolved, "merge completed");
    Ok(MergeReport {
        kept: kept.len(),
        unresolved,
        outputs: vec![merged_csv, summary_csv],
    })
}

/// Descending by score; rows without a score sort last.
fn by_score_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
