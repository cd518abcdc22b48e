//! Paper portal scraping and PDF download.
//!
//! This crate provides:
//! - [`list_pdf_links`], which picks one year's PDF links out of the listing page
//! - [`Fetcher`], which downloads them sequentially into a year directory

pub mod engine;

pub use engine::{FetchReport, Fetcher, list_pdf_links, pdf_file_name};
