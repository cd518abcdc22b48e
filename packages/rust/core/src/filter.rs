//! Keyword filter: classify each renamed PDF and sort it into the output tree.
//!
//! [`classify`] is the pure decision; [`run_filter`] extracts text, classifies
//! and materializes the result as copied files plus `filter_results.csv`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use nimescreen_extract::{PdfTextExtractor, list_pdfs};
use nimescreen_shared::{
    FilterConfig, FilterRow, NimeScreenError, PaperRecord, Result, layout, strip_pdf_extension,
};
use nimescreen_storage::{MetadataTable, WriteOptions, write_rows};

use crate::keywords::{KeywordMatcher, strip_references};
use crate::pipeline::ProgressReporter;

/// Outcome of the filter for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No eligible keyword in the full text.
    NoMatch,
    /// Full-text match the metadata does not confirm (or no metadata exists).
    MatchNoMetadata,
    /// Full-text match confirmed by the metadata text.
    MatchWithMetadata,
}

impl Verdict {
    pub fn is_match(self) -> bool {
        !matches!(self, Self::NoMatch)
    }
}

/// Why a document got its verdict. Rendered verbatim into the audit sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    NoKeyword,
    OnlyDependentKeywords,
    NoMetadata,
    MetadataWithoutKeyword,
    MetadataMatch,
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoKeyword => "No keyword match in full text",
            Self::OnlyDependentKeywords => {
                "No instrument keyword found in full text (only interface/layout present)"
            }
            Self::NoMetadata => "Full-text match; no metadata available",
            Self::MetadataWithoutKeyword => "Full-text match; no keyword match in metadata",
            Self::MetadataMatch => "Full-text and metadata match",
        }
    }
}

/// The filter decision for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub verdict: Verdict,
    pub reason: Reason,
    /// Keywords found in the full text, in keyword-table order.
    pub keywords: Vec<String>,
}

impl Classification {
    /// Audit row for `filter_results.csv`.
    pub fn to_row(&self, pdf_name: &str) -> FilterRow {
        FilterRow {
            pdf_name: pdf_name.to_string(),
            contains_keywords: if self.verdict.is_match() { "Yes" } else { "No" }.to_string(),
            keywords_found: self.keywords.join("; "),
            reason: self.reason.as_str().to_string(),
        }
    }
}

/// Classify a document from its full text and (optional) metadata record.
///
/// The references section is ignored. Dependent keywords only count when an
/// instrument keyword is also present; the metadata check decides the
/// sub-bucket of a match, never the match itself.
pub fn classify(
    full_text: &str,
    metadata: Option<&PaperRecord>,
    matcher: &KeywordMatcher,
) -> Classification {
    let keywords = matcher.search(strip_references(full_text));

    let has_instrument = keywords.iter().any(|k| matcher.is_instrument(k));
    let has_dependent = keywords.iter().any(|k| matcher.is_dependent(k));

    if keywords.is_empty() || (has_dependent && !has_instrument) {
        let reason = if has_dependent {
            Reason::OnlyDependentKeywords
        } else {
            Reason::NoKeyword
        };
        return Classification {
            verdict: Verdict::NoMatch,
            reason,
            keywords,
        };
    }

    let (verdict, reason) = match metadata {
        None => (Verdict::MatchNoMetadata, Reason::NoMetadata),
        Some(record) if record.has_no_searchable_text() => {
            (Verdict::MatchNoMetadata, Reason::NoMetadata)
        }
        Some(record) if !matcher.search(&record.searchable_text()).is_empty() => {
            (Verdict::MatchWithMetadata, Reason::MetadataMatch)
        }
        Some(_) => (Verdict::MatchNoMetadata, Reason::MetadataWithoutKeyword),
    };

    Classification {
        verdict,
        reason,
        keywords,
    }
}

/// Folder name for a keyword combination: sorted, `_`-joined.
pub fn keyword_folder_name(keywords: &[String]) -> String {
    let mut sorted: Vec<&str> = keywords.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join("_")
}

/// Directory a classified PDF is copied into, below the filter output root.
pub fn destination_dir(output_dir: &Path, classification: &Classification, group: &[String]) -> PathBuf {
    if !classification.verdict.is_match() {
        return output_dir.join(layout::NO_KEYWORD_MATCH_DIR);
    }

    let combo = keyword_folder_name(&classification.keywords);
    let mut dir = output_dir.join(layout::KEYWORD_MATCH_DIR);
    if group.iter().any(|g| combo.contains(g.as_str())) {
        dir.push(layout::KEYBOARD_GROUP_DIR);
    }
    dir.push(&combo);
    dir.push(match classification.verdict {
        Verdict::MatchWithMetadata => layout::METADATA_MATCH_DIR,
        _ => layout::NO_METADATA_MATCH_DIR,
    });
    dir
}

/// Summary of a filter run.
#[derive(Debug, Clone, Default)]
pub struct FilterReport {
    pub processed: usize,
    pub matched: usize,
    pub metadata_confirmed: usize,
    pub not_matched: usize,
    pub copy_failures: usize,
    /// Distinct keyword combinations among matches.
    pub combinations: BTreeSet<String>,
    pub results_csv: PathBuf,
}

/// Run the keyword filter over `Renamed_PDFs/{Matched,Unmatched}`.
#[instrument(skip_all, fields(output = %config.output_dir.display()))]
pub fn run_filter(
    config: &FilterConfig,
    extractor: &dyn PdfTextExtractor,
    progress: &dyn ProgressReporter,
) -> Result<FilterReport> {
    progress.phase("Loading metadata");
    let metadata = MetadataTable::load(&config.metadata_csv)?;
    let matcher = KeywordMatcher::new(&config.keywords)?;

    let mut pdfs = list_pdfs(&config.renamed_dir.join(layout::MATCHED_DIR))?;
    pdfs.extend(list_pdfs(&config.renamed_dir.join(layout::UNMATCHED_DIR))?);
    if pdfs.is_empty() {
        return Err(NimeScreenError::missing_input(
            &config.renamed_dir,
            "no PDFs in Matched/ or Unmatched/; run `nimescreen rename` first",
        ));
    }

    let out = &config.output_dir;
    for dir in [
        out.join(layout::NO_KEYWORD_MATCH_DIR),
        out.join(layout::KEYWORD_MATCH_DIR).join(layout::KEYBOARD_GROUP_DIR),
    ] {
        std::fs::create_dir_all(&dir).map_err(|e| NimeScreenError::io(&dir, e))?;
    }

    info!(pdfs = pdfs.len(), extractor = extractor.name(), "filtering PDFs");
    progress.phase("Scanning PDFs");

    let mut report = FilterReport {
        results_csv: out.join(layout::FILTER_RESULTS_FILE),
        ..Default::default()
    };
    let mut rows = Vec::with_capacity(pdfs.len());
    let total = pdfs.len();

    for (i, pdf) in pdfs.iter().enumerate() {
        let pdf_name = pdf
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        progress.item(&pdf_name, i + 1, total);

        let text = extractor.extract(pdf);
        let record = metadata.get(strip_pdf_extension(&pdf_name));
        let classification = classify(&text, record, &matcher);
        debug!(pdf = %pdf_name, verdict = ?classification.verdict, keywords = ?classification.keywords, "classified");

        report.processed += 1;
        match classification.verdict {
            Verdict::NoMatch => report.not_matched += 1,
            verdict => {
                report.matched += 1;
                if verdict == Verdict::MatchWithMetadata {
                    report.metadata_confirmed += 1;
                }
                report
                    .combinations
                    .insert(keyword_folder_name(&classification.keywords));
            }
        }

        let dest_dir = destination_dir(out, &classification, &config.keywords.keyboard_group);
        if let Err(e) = copy_into(pdf, &dest_dir, &pdf_name) {
            warn!(pdf = %pdf_name, error = %e, "failed to copy PDF");
            report.copy_failures += 1;
        }

        rows.push(classification.to_row(&pdf_name));
    }

    write_rows(&report.results_csv, &rows, WriteOptions::default())?;

    info!(
        processed = report.processed,
        matched = report.matched,
        not_matched = report.not_matched,
        combinations = report.combinations.len(),
        "filter completed"
    );
    progress.done();
    Ok(report)
}

fn copy_into(src: &Path, dir: &Path, name: &str) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| NimeScreenError::io(dir, e))?;
    let dest = dir.join(name);
    std::fs::copy(src, &dest).map_err(|e| NimeScreenError::io(&dest, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::pipeline::SilentProgress;
    use nimescreen_shared::KeywordsConfig;

    fn matcher() -> KeywordMatcher {
        KeywordMatcher::new(&KeywordsConfig::default()).unwrap()
    }

    fn record(title: &str, abstract_text: &str) -> PaperRecord {
        PaperRecord {
            id: "nime2013_1".into(),
            title: title.into(),
            abstract_text: abstract_text.into(),
            ..Default::default()
        }
    }

    #[test]
    fn text_without_keywords_is_no_match() {
        let c = classify("Gesture tracking for dancers.", None, &matcher());
        assert_eq!(c.verdict, Verdict::NoMatch);
        assert_eq!(c.reason, Reason::NoKeyword);
        assert!(c.keywords.is_empty());
    }

    #[test]
    fn dependent_keyword_alone_is_no_match_until_instrument_appears() {
        let m = matcher();
        let alone = classify("A new interface for sound.", None, &m);
        assert_eq!(alone.verdict, Verdict::NoMatch);
        assert_eq!(alone.reason, Reason::OnlyDependentKeywords);
        assert_eq!(alone.keywords, vec!["interface"]);

        let with_instrument = classify("A new interface for the accordion.", None, &m);
        assert!(with_instrument.verdict.is_match());
        assert_eq!(with_instrument.keywords, vec!["accordion", "interface"]);
    }

    #[test]
    fn keyword_only_in_references_is_no_match() {
        let m = matcher();
        let after = classify("Our sensor study.\nReferences\n[1] Piano touch.", None, &m);
        assert_eq!(after.verdict, Verdict::NoMatch);

        let before = classify("Our piano study.\nReferences\n[1] Sensors.", None, &m);
        assert!(before.verdict.is_match());
    }

    #[test]
    fn metadata_decides_the_sub_bucket() {
        let m = matcher();
        let text = "We built a harpsichord controller.";

        let none = classify(text, None, &m);
        assert_eq!((none.verdict, none.reason), (Verdict::MatchNoMetadata, Reason::NoMetadata));

        let blank = record("", "");
        let c = classify(text, Some(&blank), &m);
        assert_eq!(c.reason, Reason::NoMetadata);

        let confirmed = record("Harpsichord Touch", "");
        let c = classify(text, Some(&confirmed), &m);
        assert_eq!(c.verdict, Verdict::MatchWithMetadata);

        let silent = record("Touch", "Haptics for strings.");
        let c = classify(text, Some(&silent), &m);
        assert_eq!(
            (c.verdict, c.reason),
            (Verdict::MatchNoMetadata, Reason::MetadataWithoutKeyword)
        );
    }

    #[test]
    fn destination_groups_keyboard_combinations() {
        let group = KeywordsConfig::default().keyboard_group;
        let root = Path::new("/out");

        let organ = Classification {
            verdict: Verdict::MatchWithMetadata,
            reason: Reason::MetadataMatch,
            keywords: vec!["piano".into(), "organ".into()],
        };
        assert_eq!(
            destination_dir(root, &organ, &group),
            PathBuf::from("/out/Keyword_Match/organ_piano/Metadata_Match")
        );

        let keyboard = Classification {
            verdict: Verdict::MatchNoMetadata,
            reason: Reason::NoMetadata,
            keywords: vec!["keyboard".into(), "interface".into()],
        };
        assert_eq!(
            destination_dir(root, &keyboard, &group),
            PathBuf::from(
                "/out/Keyword_Match/Keyboard_Interface_Related/interface_keyboard/No_Metadata_Match"
            )
        );

        let none = Classification {
            verdict: Verdict::NoMatch,
            reason: Reason::NoKeyword,
            keywords: vec![],
        };
        assert_eq!(destination_dir(root, &none, &group), PathBuf::from("/out/No_Keyword_Match"));
    }

    #[test]
    fn audit_row_formatting() {
        let c = Classification {
            verdict: Verdict::NoMatch,
            reason: Reason::OnlyDependentKeywords,
            keywords: vec!["interface".into(), "layout".into()],
        };
        let row = c.to_row("x.pdf");
        assert_eq!(row.contains_keywords, "No");
        assert_eq!(row.keywords_found, "interface; layout");
        assert!(row.reason.contains("only interface/layout"));
    }

    struct FixtureExtractor(HashMap<String, String>);

    impl PdfTextExtractor for FixtureExtractor {
        fn extract(&self, path: &Path) -> String {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            self.0.get(&name).cloned().unwrap_or_default()
        }

        fn name(&self) -> &str {
            "fixture"
        }
    }

    #[test]
    fn run_filter_materializes_tree_and_audit() {
        let tmp = tempfile::tempdir().unwrap();
        let renamed = tmp.path().join("Renamed_PDFs");
        for (dir, name) in [
            ("Matched", "nime2013_1.pdf"),
            ("Matched", "nime2013_2.pdf"),
            ("Unmatched", "stray.pdf"),
        ] {
            std::fs::create_dir_all(renamed.join(dir)).unwrap();
            std::fs::write(renamed.join(dir).join(name), b"%PDF").unwrap();
        }
        let metadata_csv = tmp.path().join("nime_papers.csv");
        std::fs::write(
            &metadata_csv,
            "ID,title,abstract,keywords\nnime2013_1,The Digital Organ,,\nnime2013_2,Gestures,,\n",
        )
        .unwrap();

        let extractor = FixtureExtractor(HashMap::from([
            ("nime2013_1.pdf".to_string(), "An organ with a new layout.".to_string()),
            ("nime2013_2.pdf".to_string(), "A layout study.".to_string()),
            ("stray.pdf".to_string(), "Piano roll analysis.".to_string()),
        ]));

        let config = FilterConfig {
            metadata_csv,
            renamed_dir: renamed,
            output_dir: tmp.path().join("Metadata_Filtered_Results"),
            keywords: KeywordsConfig::default(),
        };
        let report = run_filter(&config, &extractor, &SilentProgress).unwrap();

        assert_eq!(report.processed, 3);
        assert_eq!(report.matched, 2);
        assert_eq!(report.metadata_confirmed, 1);
        assert_eq!(report.not_matched, 1);
        assert_eq!(report.copy_failures, 0);

        let out = &config.output_dir;
        assert!(out
            .join("Keyword_Match/Keyboard_Interface_Related/layout_organ/Metadata_Match/nime2013_1.pdf")
            .exists());
        assert!(out.join("No_Keyword_Match/nime2013_2.pdf").exists());
        assert!(out.join("Keyword_Match/piano/No_Metadata_Match/stray.pdf").exists());

        let audit = std::fs::read_to_string(&report.results_csv).unwrap();
        assert!(audit.starts_with("pdf_name,contains_keywords,keywords_found,reason"));
        assert!(audit.contains("stray.pdf,Yes,piano,Full-text match; no metadata available"));
    }

    #[test]
    fn run_filter_without_pdfs_aborts() {
        let tmp = tempfile::tempdir().unwrap();
        let metadata_csv = tmp.path().join("nime_papers.csv");
        std::fs::write(&metadata_csv, "ID,title\n").unwrap();
        let config = FilterConfig {
            metadata_csv,
            renamed_dir: tmp.path().join("Renamed_PDFs"),
            output_dir: tmp.path().join("out"),
            keywords: KeywordsConfig::default(),
        };
        let err = run_filter(&config, &FixtureExtractor(HashMap::new()), &SilentProgress)
            .unwrap_err();
        assert!(matches!(err, NimeScreenError::MissingInput { .. }));
    }
}
