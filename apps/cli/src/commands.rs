//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use nimescreen_core::{
    ProgressReporter, run_extract, run_fetch, run_filter, run_kwic, run_merge, run_rename,
};
use nimescreen_extract::LopdfExtractor;
use nimescreen_shared::{
    AppConfig, CONFIG_FILE_NAME, ExtractConfig, FetchConfig, FilterConfig, KwicConfig,
    MergeConfig, RenameConfig, init_config, load_config, load_config_from,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// nimescreen: screen NIME proceedings for keyboard-instrument research.
#[derive(Parser)]
#[command(
    name = "nimescreen",
    version,
    about = "Download, filter, and rank NIME papers for literature review.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ./nimescreen.toml, then ~/.nimescreen/nimescreen.toml).
    #[arg(long, global = true, env = "NIMESCREEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Working directory all configured paths are relative to.
    #[arg(long, global = true)]
    pub work_dir: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Pipeline stages, in the order they are normally run.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Download one year's paper PDFs from the portal.
    Fetch {
        /// Proceedings year (overrides fetch.year).
        #[arg(long)]
        year: Option<u16>,
    },

    /// Copy downloaded PDFs under their metadata IDs.
    Rename,

    /// Sort renamed PDFs by instrument keyword and metadata agreement.
    Filter,

    /// Extract text from the keyboard/interface subset.
    Extract,

    /// Build the keyword-in-context screening sheet.
    Kwic,

    /// Join kept papers from the screening sheet with metadata.
    Merge,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "nimescreen=info",
        1 => "nimescreen=debug",
        _ => "nimescreen=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init(cli.config.as_deref()),
            ConfigAction::Show => cmd_config_show(&resolve_config(&cli)?),
        };
    }

    let mut config = resolve_config(&cli)?;
    match cli.command {
        Command::Fetch { year } => {
            if let Some(year) = year {
                config.fetch.year = year;
            }
            cmd_fetch(&config).await
        }
        Command::Rename => cmd_rename(&config),
        Command::Filter => cmd_filter(&config),
        Command::Extract => cmd_extract(&config),
        Command::Kwic => cmd_kwic(&config),
        Command::Merge => cmd_merge(&config),
        Command::Config { .. } => Ok(()),
    }
}

/// Explicit `--config`, else the default lookup; then apply `--work-dir`.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(dir) = &cli.work_dir {
        config.paths.work_dir = dir.to_string_lossy().into_owned();
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// Stage handlers
// ---------------------------------------------------------------------------

async fn cmd_fetch(config: &AppConfig) -> Result<()> {
    let fetch = FetchConfig::try_from(config)?;
    info!(year = fetch.year, url = %fetch.papers_url, "fetching papers");

    let reporter = CliProgress::new();
    let report = run_fetch(fetch, &reporter).await?;

    println!();
    println!("  Papers found:     {}", report.found);
    println!("  Downloaded:       {}", report.downloaded);
    println!("  Already present:  {}", report.skipped_existing);
    println!("  Failed:           {}", report.failures.len());
    for (name, reason) in &report.failures {
        println!("    - {name}: {reason}");
    }
    println!("  Saved to:         {}", report.save_dir.display());
    println!("  Time:             {:.1}s", report.duration.as_secs_f64());
    println!();
    Ok(())
}

fn cmd_rename(config: &AppConfig) -> Result<()> {
    let reporter = CliProgress::new();
    let report = run_rename(&RenameConfig::from(config), &reporter)?;

    println!();
    println!("  PDFs:       {}", report.total);
    println!(
        "  Matched:    {} ({} by URL, {} by ID)",
        report.matched, report.by_url, report.by_id
    );
    println!("  Unmatched:  {}", report.unmatched);
    println!("  Map:        {}", report.map_csv.display());
    println!();
    Ok(())
}

fn cmd_filter(config: &AppConfig) -> Result<()> {
    let reporter = CliProgress::new();
    let report = run_filter(&FilterConfig::from(config), &LopdfExtractor, &reporter)?;

    println!();
    println!("  Processed:          {}", report.processed);
    println!(
        "  Keyword match:      {} ({} confirmed by metadata)",
        report.matched, report.metadata_confirmed
    );
    println!("  No keyword match:   {}", report.not_matched);
    if report.copy_failures > 0 {
        println!("  Copy failures:      {}", report.copy_failures);
    }
    println!("  Combinations:");
    for combo in &report.combinations {
        println!("    - {combo}");
    }
    println!("  Audit:              {}", report.results_csv.display());
    println!();
    Ok(())
}

fn cmd_extract(config: &AppConfig) -> Result<()> {
    let reporter = CliProgress::new();
    let report = run_extract(&ExtractConfig::from(config), &LopdfExtractor, &reporter)?;

    println!();
    println!("  Processed:        {}", report.processed);
    println!("  With text:        {}", report.extracted);
    println!("  Empty or failed:  {}", report.empty_or_failed);
    println!("  Output:           {}", report.output_dir.display());
    println!();
    Ok(())
}

fn cmd_kwic(config: &AppConfig) -> Result<()> {
    let reporter = CliProgress::new();
    let report = run_kwic(&KwicConfig::from(config), &reporter)?;

    if report.documents == 0 {
        println!("No text files to screen.");
        return Ok(());
    }

    println!();
    println!("  Documents:    {}", report.documents);
    println!("  Occurrences:  {}", report.occurrences);
    println!("  IDF weights:");
    for (keyword, weight) in report.idf.iter() {
        println!("    - {keyword}: {weight:.4}");
    }
    println!("  Details:      {}", report.details_csv.display());
    println!("  Screening:    {}", report.screening_csv.display());
    println!();
    Ok(())
}

fn cmd_merge(config: &AppConfig) -> Result<()> {
    let report = run_merge(&MergeConfig::from(config))?;

    if report.kept == 0 {
        println!("No papers marked as KEEP(1).");
        return Ok(());
    }

    println!();
    println!("  Kept papers:        {}", report.kept);
    println!("  Without metadata:   {}", report.unresolved);
    for path in &report.outputs {
        println!("  Wrote:              {}", path.display());
    }
    println!();
    Ok(())
}

fn cmd_config_init(path: Option<&Path>) -> Result<()> {
    let path = init_config(path.unwrap_or(Path::new(CONFIG_FILE_NAME)))?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid progress template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn item(&self, label: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("[{current}/{total}] {label}"));
    }

    fn done(&self) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["nimescreen", "fetch", "--year", "2013", "-vv", "--work-dir", "/data"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.work_dir, Some(PathBuf::from("/data")));
        assert!(matches!(cli.command, Command::Fetch { year: Some(2013) }));
    }

    #[test]
    fn work_dir_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[paths]\nwork_dir = \"/from/file\"\n").unwrap();
        let cli = Cli::try_parse_from([
            "nimescreen",
            "--config",
            path.to_str().unwrap(),
            "--work-dir",
            "/from/flag",
            "rename",
        ])
        .unwrap();
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.paths.work_dir, "/from/flag");
    }
}
