//! PDF-to-text through `lopdf`, tolerant of per-page failures.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use lopdf::Document;
use tracing::{debug, warn};

use nimescreen_shared::{NimeScreenError, Result};

/// Something that turns a PDF on disk into plain text.
///
/// Extraction never fails the caller: unreadable documents yield `""` and the
/// problem is logged by the implementation.
pub trait PdfTextExtractor: Send + Sync {
    /// Extract the document's text, pages separated by `\n`.
    fn extract(&self, path: &Path) -> String;

    /// Human-readable extractor name for tracing.
    fn name(&self) -> &str;
}

/// Production extractor backed by `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfExtractor;

impl PdfTextExtractor for LopdfExtractor {
    fn extract(&self, path: &Path) -> String {
        match extract_pages(path) {
            Ok(pages) => pages.join("\n"),
            Err(e) => {
                warn!(pdf = %path.display(), error = %e, "failed to extract text");
                String::new()
            }
        }
    }

    fn name(&self) -> &str {
        "lopdf"
    }
}

/// Extract the non-empty text of every readable page.
///
/// Fails only when the document itself cannot be opened; pages that fail
/// are skipped.
pub fn extract_pages(path: &Path) -> Result<Vec<String>> {
    // lopdf can panic on malformed content streams.
    let document = catch_unwind(AssertUnwindSafe(|| Document::load(path)))
        .map_err(|_| NimeScreenError::Pdf(format!("lopdf panicked opening {}", path.display())))?
        .map_err(|e| NimeScreenError::Pdf(format!("lopdf failed to open {}: {e}", path.display())))?;

    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    let mut pages = Vec::with_capacity(page_numbers.len());

    for page in page_numbers {
        let extracted = catch_unwind(AssertUnwindSafe(|| document.extract_text(&[page])));
        match extracted {
            Ok(Ok(text)) if !text.trim().is_empty() => pages.push(text),
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!(pdf = %path.display(), page, error = %e, "page skipped"),
            Err(_) => debug!(pdf = %path.display(), page, "page skipped after lopdf panic"),
        }
    }

    Ok(pages)
}
