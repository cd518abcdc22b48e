//! Map downloaded PDFs to paper IDs and copy them under canonical names.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use nimescreen_extract::list_pdfs;
use nimescreen_shared::{
    MatchMethod, NimeScreenError, PaperRecord, RenameConfig, RenameEntry, Result, UnmatchedEntry,
    layout, strip_pdf_extension,
};
use nimescreen_storage::{MetadataTable, WriteOptions, write_rows};

use crate::pipeline::ProgressReporter;

/// Last path segment of a URL-ish string. Query strings are not stripped.
pub fn url_basename(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Lookup tables built from the metadata: URL basename and bare ID.
#[derive(Debug, Clone, Default)]
pub struct IdIndex {
    by_url_name: HashMap<String, String>,
    ids: HashSet<String>,
}

impl IdIndex {
    pub fn from_records(records: &[PaperRecord]) -> Self {
        let mut index = Self::default();
        for record in records {
            let id = record.id.trim();
            if id.is_empty() {
                continue;
            }
            index.ids.insert(id.to_string());

            let url = record.url.trim();
            let name = url_basename(url);
            if !url.is_empty() && name.ends_with(".pdf") {
                index.by_url_name.insert(name.to_string(), id.to_string());
            }
        }
        index
    }

    /// Resolve a file name to its paper ID: URL basename first, then bare ID.
    pub fn match_file(&self, file_name: &str) -> Option<(String, MatchMethod)> {
        if let Some(id) = self.by_url_name.get(file_name) {
            return Some((id.clone(), MatchMethod::Url));
        }
        let stem = strip_pdf_extension(file_name);
        self.ids
            .contains(stem)
            .then(|| (stem.to_string(), MatchMethod::IdDirect))
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// What the rename stage will do, before touching the filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenamePlan {
    pub matched: Vec<RenameEntry>,
    pub unmatched: Vec<String>,
}

/// Assign target names to `files` (bare file names, processing order).
///
/// `existing` holds names already present in the matched output directory.
/// Collisions get `_1`, `_2`, ... appended to the ID.
pub fn plan_renames(files: &[String], index: &IdIndex, existing: &HashSet<String>) -> RenamePlan {
    let mut taken: HashSet<String> = existing.clone();
    let mut plan = RenamePlan::default();

    for original in files {
        let Some((id, method)) = index.match_file(original) else {
            plan.unmatched.push(original.clone());
            continue;
        };

        let mut new_name = format!("{id}.pdf");
        let mut n = 1;
        while taken.contains(&new_name) {
            new_name = format!("{id}_{n}.pdf");
            n += 1;
        }
        taken.insert(new_name.clone());

        plan.matched.push(RenameEntry {
            original: original.clone(),
            new_name,
            id,
            method,
        });
    }

    plan
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Summary of a rename run.
#[derive(Debug, Clone)]
pub struct RenameReport {
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub by_url: usize,
    pub by_id: usize,
    pub map_csv: PathBuf,
}

#[instrument(skip_all, fields(source = %config.source_dir.display()))]
pub fn run_rename(config: &RenameConfig, progress: &dyn ProgressReporter) -> Result<RenameReport> {
    if !config.source_dir.is_dir() {
        return Err(NimeScreenError::missing_input(
            &config.source_dir,
            "the downloaded PDF directory; run `nimescreen fetch` or set paths.source_pdfs",
        ));
    }

    progress.phase("Loading metadata");
    let metadata = MetadataTable::load(&config.metadata_csv)?;
    let index = IdIndex::from_records(metadata.records());

    let files: Vec<String> = list_pdfs(&config.source_dir)?
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    if files.is_empty() {
        warn!("no PDFs found in source directory");
    }

    let matched_dir = config.output_dir.join(layout::MATCHED_DIR);
    let unmatched_dir = config.output_dir.join(layout::UNMATCHED_DIR);
    for dir in [&matched_dir, &unmatched_dir] {
        std::fs::create_dir_all(dir).map_err(|e| NimeScreenError::io(dir, e))?;
    }

    let existing = existing_names(&matched_dir)?;
    let plan = plan_renames(&files, &index, &existing);

    progress.phase("Copying PDFs");
    let total = plan.matched.len() + plan.unmatched.len();
    let mut current = 0;

    for entry in &plan.matched {
        current += 1;
        progress.item(&entry.original, current, total);
        copy_file(
            &config.source_dir.join(&entry.original),
            &matched_dir.join(&entry.new_name),
        )?;
        debug!(from = %entry.original, to = %entry.new_name, method = %entry.method, "renamed");
    }
    for name in &plan.unmatched {
        current += 1;
        progress.item(name, current, total);
        copy_file(&config.source_dir.join(name), &unmatched_dir.join(name))?;
    }

    let map_csv = config.output_dir.join(layout::RENAME_MAP_FILE);
    write_rows(&map_csv, &plan.matched, WriteOptions::default())?;

    let unmatched_rows: Vec<UnmatchedEntry> = plan
        .unmatched
        .iter()
        .map(|original| UnmatchedEntry {
            original: original.clone(),
        })
        .collect();
    write_rows(
        &config.output_dir.join(layout::RENAME_UNMATCHED_FILE),
        &unmatched_rows,
        WriteOptions::default(),
    )?;

    let by_url = plan
        .matched
        .iter()
        .filter(|e| e.method == MatchMethod::Url)
        .count();
    let report = RenameReport {
        total: files.len(),
        matched: plan.matched.len(),
        unmatched: plan.unmatched.len(),
        by_url,
        by_id: plan.matched.len() - by_url,
        map_csv,
    };

    info!(
        total = report.total,
        matched = report.matched,
        unmatched = report.unmatched,
        by_url = report.by_url,
        by_id = report.by_id,
        "rename completed"
    );
    progress.done();
    Ok(report)
}

fn existing_names(dir: &Path) -> Result<HashSet<String>> {
    let entries = std::fs::read_dir(dir).map_err(|e| NimeScreenError::io(dir, e))?;
    let mut names = HashSet::new();
    for entry in entries {
        let entry = entry.map_err(|e| NimeScreenError::io(dir, e))?;
        names.insert(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    std::fs::copy(from, to).map_err(|e| NimeScreenError::io(to, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SilentProgress;
    use nimescreen_storage::read_rows;

    fn record(id: &str, url: &str) -> PaperRecord {
        PaperRecord {
            id: id.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    fn index() -> IdIndex {
        IdIndex::from_records(&[
            record("nime2013_7", " https://nime.org/proceedings/2013/nime2013_batula.pdf "),
            record("nime2013_8", "https://nime.org/proceedings/2013/"),
            record(" nime2013_9 ", ""),
        ])
    }

    #[test]
    fn url_basename_takes_last_segment() {
        assert_eq!(url_basename("https://a.org/x/y.pdf"), "y.pdf");
        assert_eq!(url_basename("plain.pdf"), "plain.pdf");
    }

    #[test]
    fn url_match_wins_over_id() {
        let idx = index();
        assert_eq!(
            idx.match_file("nime2013_batula.pdf"),
            Some(("nime2013_7".to_string(), MatchMethod::Url))
        );
        assert_eq!(
            idx.match_file("nime2013_9.pdf"),
            Some(("nime2013_9".to_string(), MatchMethod::IdDirect))
        );
        assert_eq!(idx.match_file("nime2013_batula.PDF"), None);
        assert_eq!(idx.match_file("unknown.pdf"), None);
    }

    #[test]
    fn collisions_get_numeric_suffixes() {
        let idx = IdIndex::from_records(&[
            record("nime2013_7", "https://nime.org/2013/a.pdf"),
            record("nime2013_7", "https://nime.org/2013/b.pdf"),
        ]);
        let files = vec!["a.pdf".to_string(), "b.pdf".to_string(), "nime2013_7.pdf".to_string()];
        let existing = HashSet::from(["nime2013_7.pdf".to_string()]);

        let plan = plan_renames(&files, &idx, &existing);
        let names: Vec<&str> = plan.matched.iter().map(|e| e.new_name.as_str()).collect();
        assert_eq!(names, vec!["nime2013_7_1.pdf", "nime2013_7_2.pdf", "nime2013_7_3.pdf"]);
        assert!(plan.unmatched.is_empty());
    }

    #[test]
    fn unmatched_files_keep_their_name() {
        let plan = plan_renames(&["mystery.pdf".to_string()], &index(), &HashSet::new());
        assert!(plan.matched.is_empty());
        assert_eq!(plan.unmatched, vec!["mystery.pdf"]);
    }

    #[test]
    fn run_rename_copies_and_writes_maps() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("NIME Papers");
        std::fs::create_dir_all(&source).unwrap();
        for name in ["nime2013_batula.pdf", "nime2013_9.pdf", "mystery.PDF", "notes.txt"] {
            std::fs::write(source.join(name), name.as_bytes()).unwrap();
        }
        let metadata_csv = tmp.path().join("nime_papers.csv");
        std::fs::write(
            &metadata_csv,
            "ID,title,url\nnime2013_7,Batula,https://nime.org/2013/nime2013_batula.pdf\nnime2013_9,Other,\n",
        )
        .unwrap();

        let config = RenameConfig {
            metadata_csv,
            source_dir: source,
            output_dir: tmp.path().join("Renamed_PDFs"),
        };
        let report = run_rename(&config, &SilentProgress).unwrap();
        assert_eq!((report.total, report.matched, report.unmatched), (3, 2, 1));
        assert_eq!((report.by_url, report.by_id), (1, 1));

        let out = &config.output_dir;
        assert_eq!(
            std::fs::read(out.join("Matched/nime2013_7.pdf")).unwrap(),
            b"nime2013_batula.pdf"
        );
        assert!(out.join("Matched/nime2013_9.pdf").exists());
        assert!(out.join("Unmatched/mystery.PDF").exists());

        // Every map row points at a file that exists.
        let map: Vec<RenameEntry> = read_rows(&report.map_csv).unwrap();
        assert_eq!(map.len(), 2);
        for entry in &map {
            assert!(out.join("Matched").join(&entry.new_name).exists());
        }
        let unmatched: Vec<UnmatchedEntry> =
            read_rows(&out.join("rename_unmatched.csv")).unwrap();
        assert_eq!(unmatched[0].original, "mystery.PDF");
    }

    #[test]
    fn rerun_does_not_overwrite_earlier_copies() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("src");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("nime2020_1.pdf"), b"x").unwrap();
        let metadata_csv = tmp.path().join("meta.csv");
        std::fs::write(&metadata_csv, "ID\nnime2020_1\n").unwrap();

        let config = RenameConfig {
            metadata_csv,
            source_dir: source,
            output_dir: tmp.path().join("out"),
        };
        run_rename(&config, &SilentProgress).unwrap();
        run_rename(&config, &SilentProgress).unwrap();

        assert!(config.output_dir.join("Matched/nime2020_1.pdf").exists());
        assert!(config.output_dir.join("Matched/nime2020_1_1.pdf").exists());
    }

    #[test]
    fn missing_source_dir_aborts() {
        let tmp = tempfile::tempdir().unwrap();
        let config = RenameConfig {
            metadata_csv: tmp.path().join("meta.csv"),
            source_dir: tmp.path().join("absent"),
            output_dir: tmp.path().join("out"),
        };
        let err = run_rename(&config, &SilentProgress).unwrap_err();
        assert!(matches!(err, NimeScreenError::MissingInput { .. }));
    }
}
