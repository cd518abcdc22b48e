//! PDF text extraction and PDF discovery on disk.
//!
//! - [`PdfTextExtractor`] is the seam every stage reads PDFs through; the
//!   production implementation is [`LopdfExtractor`].
//! - [`list_pdfs`] / [`collect_pdfs`] find input files for a stage.

mod files;
mod pdf;

pub use files::{collect_pdfs, list_pdfs, text_file_name};
pub use pdf::{LopdfExtractor, PdfTextExtractor, extract_pages};
