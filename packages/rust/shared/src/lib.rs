//! Shared types, error model, and configuration for nimescreen.
//!
//! This crate is the foundation depended on by all other nimescreen crates.
//! It provides:
//! - [`NimeScreenError`], the unified error type
//! - Row types that double as CSV schemas ([`PaperRecord`], [`RenameEntry`], ...)
//! - Configuration ([`AppConfig`], per-stage configs, config loading)
//! - The fixed on-disk [`layout`] names

pub mod config;
pub mod error;
pub mod layout;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CONFIG_FILE_NAME, ExtractConfig, FetchConfig, FetchSection, FilterConfig,
    KeywordsConfig, KwicConfig, MergeConfig, PathsConfig, RenameConfig, ScoringConfig, config_dir,
    init_config, load_config, load_config_from, validate_config,
};
pub use error::{NimeScreenError, Result};
pub use types::{
    FilterRow, KwicRow, MatchMethod, MergedRow, PaperRecord, RenameEntry, ScreeningRow,
    SummaryRow, UNKNOWN_YEAR, UnmatchedEntry, has_pdf_extension, strip_pdf_extension,
    year_from_pdf_name,
};
