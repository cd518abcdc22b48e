//! Bulk PDF-to-text conversion for the keyboard/interface subset.

use std::path::PathBuf;

use tracing::{debug, info, instrument, warn};

use nimescreen_extract::{PdfTextExtractor, collect_pdfs, text_file_name};
use nimescreen_shared::{ExtractConfig, NimeScreenError, Result};

use crate::pipeline::ProgressReporter;

#[derive(Debug, Clone)]
pub struct ExtractReport {
    pub processed: usize,
    pub extracted: usize,
    pub empty_or_failed: usize,
    pub output_dir: PathBuf,
}

/// Write one `.txt` per PDF found below the source directory.
///
/// PDFs with no extractable text still get an (empty) text file so the
/// downstream document count stays aligned with the PDF set. A text file
/// that cannot be written is logged and counted as failed.
#[instrument(skip_all, fields(source = %config.source_dir.display()))]
pub fn run_extract(
    config: &ExtractConfig,
    extractor: &dyn PdfTextExtractor,
    progress: &dyn ProgressReporter,
) -> Result<ExtractReport> {
    if !config.source_dir.is_dir() {
        return Err(NimeScreenError::missing_input(
            &config.source_dir,
            "the keyboard/interface filter output; run `nimescreen filter` first",
        ));
    }

    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| NimeScreenError::io(&config.output_dir, e))?;

    let pdfs = collect_pdfs(&config.source_dir)?;
    if pdfs.is_empty() {
        warn!("no PDFs below source directory");
    }
    info!(pdfs = pdfs.len(), extractor = extractor.name(), "extracting text");
    progress.phase("Extracting text");

    let mut report = ExtractReport {
        processed: 0,
        extracted: 0,
        empty_or_failed: 0,
        output_dir: config.output_dir.clone(),
    };
    let total = pdfs.len();

    for (i, pdf) in pdfs.iter().enumerate() {
        let pdf_name = pdf
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        progress.item(&pdf_name, i + 1, total);

        let text = extractor.extract(pdf);
        let dest = config.output_dir.join(text_file_name(&pdf_name));
        report.processed += 1;
        if let Err(e) = std::fs::write(&dest, &text) {
            warn!(pdf = %pdf_name, path = %dest.display(), error = %e, "failed to write text file");
            report.empty_or_failed += 1;
            continue;
        }

        if text.trim().is_empty() {
            debug!(pdf = %pdf_name, "no text extracted");
            report.empty_or_failed += 1;
        } else {
            report.extracted += 1;
        }
    }

    info!(
        processed = report.processed,
        extracted = report.extracted,
        empty_or_failed = report.empty_or_failed,
        "extraction completed"
    );
    progress.done();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::pipeline::SilentProgress;

    /// Returns the file's own bytes as text, or nothing for `blank*` files.
    struct EchoExtractor;

    impl PdfTextExtractor for EchoExtractor {
        fn extract(&self, path: &Path) -> String {
            let name = path.file_name().unwrap().to_string_lossy();
            if name.starts_with("blank") {
                return String::new();
            }
            std::fs::read_to_string(path).unwrap()
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[test]
    fn writes_one_text_file_per_pdf_including_empty_ones() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("Keyboard_Interface_Related");
        let nested = source.join("keyboard").join("Metadata_Match");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("nime2013_1.pdf"), "piano hands").unwrap();
        std::fs::write(nested.join("blank.PDF"), "").unwrap();

        let config = ExtractConfig {
            source_dir: source,
            output_dir: tmp.path().join("texts"),
        };
        let report = run_extract(&config, &EchoExtractor, &SilentProgress).unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.extracted, 1);
        assert_eq!(report.empty_or_failed, 1);
        assert_eq!(
            std::fs::read_to_string(config.output_dir.join("nime2013_1.txt")).unwrap(),
            "piano hands"
        );
        assert_eq!(
            std::fs::read_to_string(config.output_dir.join("blank.txt")).unwrap(),
            ""
        );
    }

    #[test]
    fn blocked_output_is_counted_and_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("source");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("a.pdf"), "first paper").unwrap();
        std::fs::write(source.join("b.pdf"), "second paper").unwrap();

        let config = ExtractConfig {
            source_dir: source,
            output_dir: tmp.path().join("texts"),
        };
        // A directory where a.txt should go makes that write fail.
        std::fs::create_dir_all(config.output_dir.join("a.txt")).unwrap();

        let report = run_extract(&config, &EchoExtractor, &SilentProgress).unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(report.extracted, 1);
        assert_eq!(report.empty_or_failed, 1);
        assert_eq!(
            std::fs::read_to_string(config.output_dir.join("b.txt")).unwrap(),
            "second paper"
        );
    }

    #[test]
    fn missing_source_aborts() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ExtractConfig {
            source_dir: tmp.path().join("absent"),
            output_dir: tmp.path().join("texts"),
        };
        let err = run_extract(&config, &EchoExtractor, &SilentProgress).unwrap_err();
        assert!(matches!(err, NimeScreenError::MissingInput { .. }));
        assert!(!config.output_dir.exists());
    }
}
