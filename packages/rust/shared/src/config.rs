//! Application configuration for nimescreen.
//!
//! Project config lives at `./nimescreen.toml`, with a user-level fallback at
//! `~/.nimescreen/nimescreen.toml`. CLI flags override config file values,
//! which override defaults. The defaults reproduce the tuned constants of the
//! screening heuristics exactly; change them only deliberately.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{NimeScreenError, Result};
use crate::layout;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "nimescreen.toml";

/// User-level config directory name under the home directory.
const CONFIG_DIR_NAME: &str = ".nimescreen";

// ---------------------------------------------------------------------------
// Config structs (matching nimescreen.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Input/output locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Paper portal settings.
    #[serde(default)]
    pub fetch: FetchSection,

    /// Keyword tables.
    #[serde(default)]
    pub keywords: KeywordsConfig,

    /// KWIC scoring constants.
    #[serde(default)]
    pub scoring: ScoringConfig,
}

/// `[paths]` section. Relative paths are resolved against `work_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root all other relative paths hang from.
    #[serde(default = "default_work_dir")]
    pub work_dir: String,

    /// Conference metadata table.
    #[serde(default = "default_metadata_csv")]
    pub metadata_csv: String,

    /// Directory of downloaded PDFs to rename.
    #[serde(default = "default_source_pdfs")]
    pub source_pdfs: String,

    /// Rename output root (`Matched/`, `Unmatched/`, rename map).
    #[serde(default = "default_renamed_dir")]
    pub renamed_dir: String,

    /// Keyword filter output root.
    #[serde(default = "default_filter_dir")]
    pub filter_dir: String,

    /// Extracted text output directory.
    #[serde(default = "default_texts_dir")]
    pub texts_dir: String,

    /// KWIC screening output directory.
    #[serde(default = "default_screening_dir")]
    pub screening_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            metadata_csv: default_metadata_csv(),
            source_pdfs: default_source_pdfs(),
            renamed_dir: default_renamed_dir(),
            filter_dir: default_filter_dir(),
            texts_dir: default_texts_dir(),
            screening_dir: default_screening_dir(),
        }
    }
}

fn default_work_dir() -> String {
    ".".into()
}
fn default_metadata_csv() -> String {
    "nime_papers.csv".into()
}
fn default_source_pdfs() -> String {
    "NIME Papers".into()
}
fn default_renamed_dir() -> String {
    "Renamed_PDFs".into()
}
fn default_filter_dir() -> String {
    "Metadata_Filtered_Results".into()
}
fn default_texts_dir() -> String {
    "Keyboard_Interface_Texts".into()
}
fn default_screening_dir() -> String {
    "KWIC_Screening".into()
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSection {
    /// Listing page that links every paper PDF.
    #[serde(default = "default_papers_url")]
    pub papers_url: String,

    /// Base that relative PDF links are resolved against.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Proceedings year to download.
    #[serde(default = "default_year")]
    pub year: u16,

    /// Directory under which `NIME_<year>_Papers/` is created.
    #[serde(default = "default_save_base")]
    pub save_base: String,

    /// Timeout for the listing page request, in seconds.
    #[serde(default = "default_listing_timeout")]
    pub listing_timeout_secs: u64,

    /// Timeout for each PDF download, in seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            papers_url: default_papers_url(),
            base_url: default_base_url(),
            year: default_year(),
            save_base: default_save_base(),
            listing_timeout_secs: default_listing_timeout(),
            download_timeout_secs: default_download_timeout(),
        }
    }
}

fn default_papers_url() -> String {
    "https://nime.org/papers/".into()
}
fn default_base_url() -> String {
    "https://nime.org/".into()
}
fn default_year() -> u16 {
    2025
}
fn default_save_base() -> String {
    ".".into()
}
fn default_listing_timeout() -> u64 {
    30
}
fn default_download_timeout() -> u64 {
    60
}

/// `[keywords]` section. All entries are lowercase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordsConfig {
    /// Keyword table, in display/tie-break order.
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,

    /// Musical-instrument keywords.
    #[serde(default = "default_instruments")]
    pub instruments: Vec<String>,

    /// Keywords that only count next to an instrument keyword.
    #[serde(default = "default_dependent")]
    pub dependent: Vec<String>,

    /// Keywords the filter matches as whole words (plus plural `s`).
    #[serde(default = "default_whole_word")]
    pub whole_word: Vec<String>,

    /// Keywords whose KWIC pattern also accepts `-ist`/`-ists`.
    #[serde(default = "default_agentive")]
    pub agentive: Vec<String>,

    /// Keywords that receive the flat per-occurrence score bonus.
    #[serde(default = "default_boosted")]
    pub boosted: Vec<String>,

    /// Keyword combinations containing any of these are grouped together.
    #[serde(default = "default_keyboard_group")]
    pub keyboard_group: Vec<String>,
}

impl Default for KeywordsConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            instruments: default_instruments(),
            dependent: default_dependent(),
            whole_word: default_whole_word(),
            agentive: default_agentive(),
            boosted: default_boosted(),
            keyboard_group: default_keyboard_group(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn default_targets() -> Vec<String> {
    strings(&[
        "organ",
        "keyboard",
        "piano",
        "clavichord",
        "harpsichord",
        "accordion",
        "interface",
        "layout",
    ])
}
fn default_instruments() -> Vec<String> {
    strings(&[
        "organ",
        "keyboard",
        "piano",
        "clavichord",
        "harpsichord",
        "accordion",
    ])
}
fn default_dependent() -> Vec<String> {
    strings(&["interface", "layout"])
}
fn default_whole_word() -> Vec<String> {
    strings(&["organ"])
}
fn default_agentive() -> Vec<String> {
    strings(&["keyboard", "piano", "organ", "accordion"])
}
fn default_boosted() -> Vec<String> {
    strings(&["piano", "harpsichord", "clavichord", "accordion", "organ"])
}
fn default_keyboard_group() -> Vec<String> {
    strings(&["keyboard", "interface", "layout"])
}

/// `[scoring]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Characters of context captured on each side of an occurrence.
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Characters of context shown on each side in the preview.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,

    /// Maximum distinct snippets in a paper's preview.
    #[serde(default = "default_max_snippets")]
    pub max_snippets: usize,

    /// Multiplier on `log2(hits + 1)`.
    #[serde(default = "default_volume_weight")]
    pub volume_weight: f64,

    /// Multiplier on a keyword's IDF, per occurrence.
    #[serde(default = "default_idf_weight")]
    pub idf_weight: f64,

    /// Flat bonus per occurrence of a boosted keyword.
    #[serde(default = "default_instrument_bonus")]
    pub instrument_bonus: f64,

    /// Points per musical-context term occurrence.
    #[serde(default = "default_musical_term_weight")]
    pub musical_term_weight: f64,

    /// Points subtracted per false-positive term occurrence.
    #[serde(default = "default_false_positive_weight")]
    pub false_positive_weight: f64,

    /// Vocabulary that signals a musical setting.
    #[serde(default = "default_musical_terms")]
    pub musical_terms: Vec<String>,

    /// Vocabulary that signals a typing/HCI setting.
    #[serde(default = "default_false_positive_terms")]
    pub false_positive_terms: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            context_window: default_context_window(),
            preview_chars: default_preview_chars(),
            max_snippets: default_max_snippets(),
            volume_weight: default_volume_weight(),
            idf_weight: default_idf_weight(),
            instrument_bonus: default_instrument_bonus(),
            musical_term_weight: default_musical_term_weight(),
            false_positive_weight: default_false_positive_weight(),
            musical_terms: default_musical_terms(),
            false_positive_terms: default_false_positive_terms(),
        }
    }
}

fn default_context_window() -> usize {
    80
}
fn default_preview_chars() -> usize {
    60
}
fn default_max_snippets() -> usize {
    8
}
fn default_volume_weight() -> f64 {
    2.0
}
fn default_idf_weight() -> f64 {
    5.0
}
fn default_instrument_bonus() -> f64 {
    5.0
}
fn default_musical_term_weight() -> f64 {
    1.5
}
fn default_false_positive_weight() -> f64 {
    2.5
}
fn default_musical_terms() -> Vec<String> {
    strings(&[
        "musical",
        "expression",
        "haptic",
        "force",
        "sensor",
        "velocity",
        "synthesizer",
        "midi",
        "controller",
        "timbre",
    ])
}
fn default_false_positive_terms() -> Vec<String> {
    strings(&[
        "qwerty",
        "typing",
        "text entry",
        "alphanumeric",
        "computer keyboard",
        "password",
        "office",
    ])
}

impl AppConfig {
    /// Resolve a configured path against `paths.work_dir`.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        Path::new(&self.paths.work_dir).join(relative)
    }
}

// ---------------------------------------------------------------------------
// Stage configs (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime configuration for the fetch stage.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub papers_url: Url,
    pub base_url: Url,
    pub year: u16,
    /// Final download directory (`<save_base>/NIME_<year>_Papers`).
    pub save_dir: PathBuf,
    pub listing_timeout: Duration,
    pub download_timeout: Duration,
}

impl TryFrom<&AppConfig> for FetchConfig {
    type Error = NimeScreenError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let fetch = &config.fetch;
        let papers_url = Url::parse(&fetch.papers_url).map_err(|e| {
            NimeScreenError::config(format!("invalid papers_url '{}': {e}", fetch.papers_url))
        })?;
        let base_url = Url::parse(&fetch.base_url).map_err(|e| {
            NimeScreenError::config(format!("invalid base_url '{}': {e}", fetch.base_url))
        })?;

        Ok(Self {
            papers_url,
            base_url,
            year: fetch.year,
            save_dir: config
                .resolve(&fetch.save_base)
                .join(layout::papers_dir_name(fetch.year)),
            listing_timeout: Duration::from_secs(fetch.listing_timeout_secs),
            download_timeout: Duration::from_secs(fetch.download_timeout_secs),
        })
    }
}

/// Runtime configuration for the rename stage.
#[derive(Debug, Clone)]
pub struct RenameConfig {
    pub metadata_csv: PathBuf,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl From<&AppConfig> for RenameConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            metadata_csv: config.resolve(&config.paths.metadata_csv),
            source_dir: config.resolve(&config.paths.source_pdfs),
            output_dir: config.resolve(&config.paths.renamed_dir),
        }
    }
}

/// Runtime configuration for the keyword filter stage.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub metadata_csv: PathBuf,
    /// Rename output root; PDFs are read from its `Matched/` and `Unmatched/`.
    pub renamed_dir: PathBuf,
    pub output_dir: PathBuf,
    pub keywords: KeywordsConfig,
}

impl From<&AppConfig> for FilterConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            metadata_csv: config.resolve(&config.paths.metadata_csv),
            renamed_dir: config.resolve(&config.paths.renamed_dir),
            output_dir: config.resolve(&config.paths.filter_dir),
            keywords: config.keywords.clone(),
        }
    }
}

/// Runtime configuration for the text extraction stage.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl From<&AppConfig> for ExtractConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            source_dir: config
                .resolve(&config.paths.filter_dir)
                .join(layout::KEYWORD_MATCH_DIR)
                .join(layout::KEYBOARD_GROUP_DIR),
            output_dir: config.resolve(&config.paths.texts_dir),
        }
    }
}

/// Runtime configuration for the KWIC screening stage.
#[derive(Debug, Clone)]
pub struct KwicConfig {
    pub text_dir: PathBuf,
    pub output_dir: PathBuf,
    pub keywords: KeywordsConfig,
    pub scoring: ScoringConfig,
}

impl From<&AppConfig> for KwicConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            text_dir: config.resolve(&config.paths.texts_dir),
            output_dir: config.resolve(&config.paths.screening_dir),
            keywords: config.keywords.clone(),
            scoring: config.scoring.clone(),
        }
    }
}

/// Runtime configuration for the metadata merge stage.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    pub screening_csv: PathBuf,
    pub rename_map_csv: PathBuf,
    pub metadata_csv: PathBuf,
    pub output_dir: PathBuf,
}

impl From<&AppConfig> for MergeConfig {
    fn from(config: &AppConfig) -> Self {
        let screening_dir = config.resolve(&config.paths.screening_dir);
        Self {
            screening_csv: screening_dir.join(layout::KWIC_SCREENING_FILE),
            rename_map_csv: config
                .resolve(&config.paths.renamed_dir)
                .join(layout::RENAME_MAP_FILE),
            metadata_csv: config.resolve(&config.paths.metadata_csv),
            output_dir: screening_dir,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the user-level config directory (`~/.nimescreen/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| NimeScreenError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Load the config from `./nimescreen.toml`, then `~/.nimescreen/nimescreen.toml`.
/// Returns defaults if neither exists.
pub fn load_config() -> Result<AppConfig> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return load_config_from(&local);
    }

    if let Ok(dir) = config_dir() {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            return load_config_from(&path);
        }
    }

    tracing::debug!("no config file found, using defaults");
    Ok(AppConfig::default())
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| NimeScreenError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        NimeScreenError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    tracing::debug!(?path, "loaded config");
    Ok(config)
}

/// Write a default config file at `path`. Refuses to overwrite.
pub fn init_config(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Err(NimeScreenError::config(format!(
            "{} already exists; remove it first to regenerate defaults",
            path.display()
        )));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| NimeScreenError::io(parent, e))?;
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| NimeScreenError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| NimeScreenError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path.to_path_buf())
}

/// Check the keyword tables and scoring constants for obvious mistakes.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let kw = &config.keywords;

    if kw.targets.is_empty() {
        return Err(NimeScreenError::config("keywords.targets must not be empty"));
    }

    let all_lists = [
        ("targets", &kw.targets),
        ("instruments", &kw.instruments),
        ("dependent", &kw.dependent),
        ("whole_word", &kw.whole_word),
        ("agentive", &kw.agentive),
        ("boosted", &kw.boosted),
        ("keyboard_group", &kw.keyboard_group),
    ];
    for (name, list) in all_lists {
        if let Some(bad) = list
            .iter()
            .find(|k| k.trim().is_empty() || k.to_lowercase() != **k)
        {
            return Err(NimeScreenError::config(format!(
                "keywords.{name} entry '{bad}' must be non-empty lowercase"
            )));
        }
    }

    if let Some(missing) = kw.dependent.iter().find(|k| !kw.targets.contains(k)) {
        return Err(NimeScreenError::config(format!(
            "dependent keyword '{missing}' is not in keywords.targets"
        )));
    }

    if config.scoring.context_window == 0 {
        return Err(NimeScreenError::config(
            "scoring.context_window must be greater than zero",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("metadata_csv"));
        assert!(toml_str.contains("harpsichord"));
    }

    #[test]
    fn empty_file_equals_defaults() {
        let parsed: AppConfig = toml::from_str("").expect("parse empty");
        assert_eq!(parsed.keywords, KeywordsConfig::default());
        assert_eq!(parsed.scoring, ScoringConfig::default());
        assert_eq!(parsed.fetch.year, 2025);
        assert_eq!(parsed.scoring.context_window, 80);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let toml_str = r#"
[fetch]
year = 2013

[scoring]
instrument_bonus = 5.0
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.fetch.year, 2013);
        assert_eq!(config.fetch.listing_timeout_secs, 30);
        assert_eq!(config.scoring.false_positive_weight, 2.5);
    }

    #[test]
    fn stage_paths_resolve_against_work_dir() {
        let mut app = AppConfig::default();
        app.paths.work_dir = "/data/nime".into();

        let rename = RenameConfig::from(&app);
        assert_eq!(rename.source_dir, PathBuf::from("/data/nime/NIME Papers"));

        let extract = ExtractConfig::from(&app);
        assert_eq!(
            extract.source_dir,
            PathBuf::from("/data/nime/Metadata_Filtered_Results/Keyword_Match/Keyboard_Interface_Related")
        );

        let merge = MergeConfig::from(&app);
        assert_eq!(
            merge.rename_map_csv,
            PathBuf::from("/data/nime/Renamed_PDFs/rename_map.csv")
        );
    }

    #[test]
    fn fetch_config_builds_year_directory() {
        let mut app = AppConfig::default();
        app.fetch.year = 2024;
        let fetch = FetchConfig::try_from(&app).expect("valid fetch config");
        assert!(fetch.save_dir.ends_with("NIME_2024_Papers"));
        assert_eq!(fetch.download_timeout, Duration::from_secs(60));
    }

    #[test]
    fn fetch_config_rejects_bad_url() {
        let mut app = AppConfig::default();
        app.fetch.papers_url = "not a url".into();
        let err = FetchConfig::try_from(&app).unwrap_err();
        assert!(err.to_string().contains("papers_url"));
    }

    #[test]
    fn validation_rejects_uppercase_and_orphan_dependents() {
        let mut config = AppConfig::default();
        config.keywords.targets[0] = "Organ".into();
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.keywords.dependent.push("pedal".into());
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("pedal"));

        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);

        init_config(&path).expect("first init");
        let loaded = load_config_from(&path).expect("load written defaults");
        assert_eq!(loaded.paths.renamed_dir, "Renamed_PDFs");

        assert!(init_config(&path).is_err());
    }
}
