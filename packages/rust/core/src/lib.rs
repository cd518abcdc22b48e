//! Screening stages for nimescreen.
//!
//! Each stage is a function taking its runtime config and returning a report:
//! [`run_fetch`], [`run_rename`], [`run_filter`], [`run_extract`],
//! [`run_kwic`], [`run_merge`]. The decision logic behind them ([`classify`],
//! [`plan_renames`], [`score_paper`]) is pure and usable on its own.

pub mod extract_stage;
pub mod filter;
pub mod keywords;
pub mod kwic;
pub mod matcher;
pub mod merge;
pub mod pipeline;
pub mod scoring;

pub use extract_stage::{ExtractReport, run_extract};
pub use filter::{Classification, FilterReport, Reason, Verdict, classify, run_filter};
pub use keywords::{KeywordMatcher, strip_references};
pub use kwic::{KwicExtractor, KwicReport, Occurrence, run_kwic};
pub use matcher::{IdIndex, RenamePlan, RenameReport, plan_renames, run_rename};
pub use merge::{MergeReport, join_rename_map, run_merge};
pub use pipeline::{ProgressReporter, SilentProgress, run_fetch};
pub use scoring::{IdfTable, ScoreBreakdown, ScoreInputs, idf, score_paper};
