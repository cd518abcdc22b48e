//! Stage orchestration helpers: progress reporting and the async fetch stage.

use tracing::instrument;

use nimescreen_crawler::{FetchReport, Fetcher};
use nimescreen_shared::{FetchConfig, Result};

/// Progress callback for reporting stage status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called for each item (PDF, text file, download) as it is processed.
    fn item(&self, label: &str, current: usize, total: usize);
    /// Called when the stage completes.
    fn done(&self);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn item(&self, _label: &str, _current: usize, _total: usize) {}
    fn done(&self) {}
}

/// Download one proceedings year into `NIME_<year>_Papers/`.
#[instrument(skip_all, fields(year = config.year))]
pub async fn run_fetch(config: FetchConfig, progress: &dyn ProgressReporter) -> Result<FetchReport> {
    progress.phase("Fetching paper listing");
    let fetcher = Fetcher::new(config)?;

    let report = fetcher
        .run(&mut |current, total, name| progress.item(name, current, total))
        .await?;

    progress.done();
    Ok(report)
}
