//! Fixed file and directory names of the on-disk pipeline layout.
//!
//! Each stage writes under a configurable root directory; the names below are
//! the sub-paths inside those roots that downstream stages rely on.

/// Sub-directory of the rename output holding matched, renamed PDFs.
pub const MATCHED_DIR: &str = "Matched";
/// Sub-directory of the rename output holding PDFs copied under their original name.
pub const UNMATCHED_DIR: &str = "Unmatched";
/// Audit map written at the rename output root.
pub const RENAME_MAP_FILE: &str = "rename_map.csv";
/// List of unmatched PDF names written at the rename output root.
pub const RENAME_UNMATCHED_FILE: &str = "rename_unmatched.csv";

/// Filter output: PDFs with an eligible keyword hit.
pub const KEYWORD_MATCH_DIR: &str = "Keyword_Match";
/// Filter output: PDFs without an eligible keyword hit.
pub const NO_KEYWORD_MATCH_DIR: &str = "No_Keyword_Match";
/// Parent for keyword combinations that involve keyboard/interface/layout.
pub const KEYBOARD_GROUP_DIR: &str = "Keyboard_Interface_Related";
/// Leaf for matches confirmed by the metadata text.
pub const METADATA_MATCH_DIR: &str = "Metadata_Match";
/// Leaf for full-text-only matches.
pub const NO_METADATA_MATCH_DIR: &str = "No_Metadata_Match";
/// Per-PDF audit sheet written at the filter output root.
pub const FILTER_RESULTS_FILE: &str = "filter_results.csv";

/// Every keyword occurrence with its context.
pub const KWIC_DETAILS_FILE: &str = "kwic_details_all_instances.csv";
/// Paper-level screening sheet, ranked by score.
pub const KWIC_SCREENING_FILE: &str = "kwic_context_screening.csv";
/// Kept papers joined with full metadata.
pub const SCREENED_METADATA_FILE: &str = "kwic_screened_metadata.csv";
/// Kept papers as a ranked reading list.
pub const SCREENED_SUMMARY_FILE: &str = "screened_metadata_results.csv";

/// Directory name the fetcher creates for one proceedings year.
pub fn papers_dir_name(year: u16) -> String {
    format!("NIME_{year}_Papers")
}
