//! Keyword-in-context extraction and the paper-level screening sheet.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info, instrument, warn};

use nimescreen_shared::{
    KeywordsConfig, KwicConfig, KwicRow, NimeScreenError, Result, ScoringConfig, ScreeningRow,
    layout, year_from_pdf_name,
};
use nimescreen_storage::{WriteOptions, write_rows};

use crate::pipeline::ProgressReporter;
use crate::scoring::{
    ContextTerms, IdfTable, ScoreBreakdown, ScoreInputs, build_preview, score_paper, snippet,
};

// ---------------------------------------------------------------------------
// Occurrences
// ---------------------------------------------------------------------------

/// One keyword hit with its surrounding text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub keyword: String,
    /// Surface form as it appears in the text.
    pub matched_word: String,
    pub before: String,
    pub after: String,
}

/// Finds every keyword occurrence in a document, word-bounded and case-insensitive.
pub struct KwicExtractor {
    patterns: Vec<(String, Regex)>,
    window: usize,
}

impl KwicExtractor {
    pub fn new(keywords: &KeywordsConfig, window: usize) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut patterns = Vec::new();
        for keyword in &keywords.targets {
            if !seen.insert(keyword.as_str()) {
                continue;
            }
            let suffix = if keywords.agentive.contains(keyword) {
                "(s|ist|ists)?"
            } else {
                "s?"
            };
            let re = Regex::new(&format!(r"(?i)\b{}{suffix}\b", regex::escape(keyword)))
                .map_err(|e| NimeScreenError::config(format!("bad keyword '{keyword}': {e}")))?;
            patterns.push((keyword.clone(), re));
        }
        Ok(Self { patterns, window })
    }

    /// All occurrences, grouped by keyword in table order, then by position.
    pub fn occurrences(&self, text: &str) -> Vec<Occurrence> {
        let mut found = Vec::new();
        for (keyword, re) in &self.patterns {
            for m in re.find_iter(text) {
                let start = window_start(text, m.start(), self.window);
                let end = window_end(text, m.end(), self.window);
                found.push(Occurrence {
                    keyword: keyword.clone(),
                    matched_word: m.as_str().to_string(),
                    before: clean_context(&text[start..m.start()]),
                    after: clean_context(&text[m.end()..end]),
                });
            }
        }
        found
    }
}

/// Byte offset `n` characters before `pos`, clamped to the start.
fn window_start(text: &str, pos: usize, n: usize) -> usize {
    if n == 0 {
        return pos;
    }
    text[..pos]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Byte offset `n` characters after `pos`, clamped to the end.
fn window_end(text: &str, pos: usize, n: usize) -> usize {
    text[pos..]
        .char_indices()
        .nth(n)
        .map(|(i, _)| pos + i)
        .unwrap_or(text.len())
}

fn clean_context(raw: &str) -> String {
    raw.replace('\n', " ").trim().to_string()
}

// ---------------------------------------------------------------------------
// Screening
// ---------------------------------------------------------------------------

/// A paper's row before it is written, with the score kept in pieces.
#[derive(Debug, Clone)]
pub struct ScreenedPaper {
    pub year: String,
    pub pdf_name: String,
    pub hit_count: usize,
    pub preview: String,
    pub score: ScoreBreakdown,
}

impl ScreenedPaper {
    fn to_row(&self) -> ScreeningRow {
        ScreeningRow {
            year: self.year.clone(),
            pdf_name: self.pdf_name.clone(),
            aggregated_context: self.preview.clone(),
            hit_count: self.hit_count,
            auto_priority_score: self.score.total,
            keep_or_exclude: String::new(),
            exclusion_reason: String::new(),
        }
    }
}

/// Document frequency per keyword, counted from detail rows.
pub fn document_frequencies(rows: &[KwicRow]) -> BTreeMap<String, usize> {
    let mut pairs: HashSet<(&str, &str)> = HashSet::new();
    let mut df = BTreeMap::new();
    for row in rows {
        if pairs.insert((row.keyword.as_str(), row.pdf_name.as_str())) {
            *df.entry(row.keyword.clone()).or_insert(0) += 1;
        }
    }
    df
}

/// Score every paper and order them by score, highest first.
///
/// `papers` lists every scanned `(year, pdf_name)` so that papers without
/// hits still appear. `rows` must already be in detail-sheet order.
pub fn screen_papers(
    papers: &[(String, String)],
    rows: &[KwicRow],
    idf: &IdfTable,
    keywords: &KeywordsConfig,
    scoring: &ScoringConfig,
    terms: &ContextTerms,
) -> Vec<ScreenedPaper> {
    let mut groups: BTreeMap<(&str, &str), Vec<&KwicRow>> = BTreeMap::new();
    for (year, pdf_name) in papers {
        groups.entry((year.as_str(), pdf_name.as_str())).or_default();
    }
    for row in rows {
        groups
            .entry((row.year.as_str(), row.pdf_name.as_str()))
            .or_default()
            .push(row);
    }

    let mut screened: Vec<ScreenedPaper> = groups
        .into_iter()
        .map(|((year, pdf_name), hits)| {
            let mut keyword_counts = BTreeMap::new();
            for row in &hits {
                *keyword_counts.entry(row.keyword.clone()).or_insert(0) += 1;
            }

            let blob = hits
                .iter()
                .map(|r| format!("{} {} {}", r.context_before, r.keyword, r.context_after))
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase();

            let inputs = ScoreInputs {
                hit_count: hits.len(),
                keyword_counts,
                musical_term_count: terms.musical_count(&blob),
                false_positive_count: terms.false_positive_count(&blob),
            };
            let score = score_paper(&inputs, idf, &keywords.boosted, scoring);

            let preview = build_preview(
                hits.iter().map(|r| {
                    snippet(
                        &r.context_before,
                        &r.matched_word,
                        &r.context_after,
                        scoring.preview_chars,
                    )
                }),
                scoring.max_snippets,
            );

            ScreenedPaper {
                year: year.to_string(),
                pdf_name: pdf_name.to_string(),
                hit_count: hits.len(),
                preview,
                score,
            }
        })
        .collect();

    screened.sort_by(|a, b| b.score.total.total_cmp(&a.score.total));
    screened
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct KwicReport {
    pub documents: usize,
    pub occurrences: usize,
    pub idf: IdfTable,
    pub details_csv: PathBuf,
    pub screening_csv: PathBuf,
}

/// `*.txt` directly in `dir` (sorted), then `*/*.txt` (sorted).
fn collect_text_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut top = Vec::new();
    let mut nested = Vec::new();

    let entries = std::fs::read_dir(dir).map_err(|e| NimeScreenError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| NimeScreenError::io(dir, e))?.path();
        if path.is_dir() {
            let sub = std::fs::read_dir(&path).map_err(|e| NimeScreenError::io(&path, e))?;
            for entry in sub {
                let inner = entry.map_err(|e| NimeScreenError::io(&path, e))?.path();
                if is_text_file(&inner) {
                    nested.push(inner);
                }
            }
        } else if is_text_file(&path) {
            top.push(path);
        }
    }

    top.sort();
    nested.sort();
    top.extend(nested);
    Ok(top)
}

fn is_text_file(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == "txt")
}

#[instrument(skip_all, fields(texts = %config.text_dir.display()))]
pub fn run_kwic(config: &KwicConfig, progress: &dyn ProgressReporter) -> Result<KwicReport> {
    if !config.text_dir.is_dir() {
        return Err(NimeScreenError::missing_input(
            &config.text_dir,
            "extracted text files; run `nimescreen extract` first",
        ));
    }

    let details_csv = config.output_dir.join(layout::KWIC_DETAILS_FILE);
    let screening_csv = config.output_dir.join(layout::KWIC_SCREENING_FILE);

    let files = collect_text_files(&config.text_dir)?;
    if files.is_empty() {
        warn!("no .txt files found; nothing to screen");
        return Ok(KwicReport {
            documents: 0,
            occurrences: 0,
            idf: IdfTable::default(),
            details_csv,
            screening_csv,
        });
    }

    let extractor = KwicExtractor::new(&config.keywords, config.scoring.context_window)?;
    let terms = ContextTerms::new(&config.scoring)?;

    progress.phase("Extracting keyword contexts");
    let mut papers = Vec::with_capacity(files.len());
    let mut rows = Vec::new();
    // A stem found both at the top level and in a sub-directory is one paper.
    let mut seen = HashSet::new();
    let total = files.len();

    for (i, file) in files.iter().enumerate() {
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let pdf_name = format!("{stem}.pdf");
        progress.item(&pdf_name, i + 1, total);

        let bytes = match std::fs::read(file) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "could not read text file, skipping");
                continue;
            }
        };
        let text = String::from_utf8_lossy(&bytes);
        let year = year_from_pdf_name(&pdf_name);

        let found = extractor.occurrences(&text);
        debug!(pdf = %pdf_name, hits = found.len(), "scanned");
        rows.extend(found.into_iter().map(|o| KwicRow {
            year: year.clone(),
            pdf_name: pdf_name.clone(),
            context_before: o.before,
            keyword: o.keyword,
            matched_word: o.matched_word,
            context_after: o.after,
            manual_decision: String::new(),
        }));
        if seen.insert((year.clone(), pdf_name.clone())) {
            papers.push((year, pdf_name));
        }
    }

    rows.sort_by(|a, b| {
        (&a.year, &a.pdf_name, &a.keyword).cmp(&(&b.year, &b.pdf_name, &b.keyword))
    });
    write_rows(&details_csv, &rows, WriteOptions::default())?;

    progress.phase("Scoring papers");
    let idf = IdfTable::new(
        &config.keywords.targets,
        papers.len(),
        &document_frequencies(&rows),
    );
    for (keyword, weight) in idf.iter() {
        debug!(keyword, weight, "idf weight");
    }

    let screened = screen_papers(
        &papers,
        &rows,
        &idf,
        &config.keywords,
        &config.scoring,
        &terms,
    );
    let sheet: Vec<ScreeningRow> = screened.iter().map(ScreenedPaper::to_row).collect();
    write_rows(&screening_csv, &sheet, WriteOptions { bom: true })?;

    info!(
        documents = papers.len(),
        occurrences = rows.len(),
        papers = sheet.len(),
        "kwic screening completed"
    );
    progress.done();
    Ok(KwicReport {
        documents: papers.len(),
        occurrences: rows.len(),
        idf,
        details_csv,
        screening_csv,
    })
}
