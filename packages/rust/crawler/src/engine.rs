//! Sequential paper downloader.
//!
//! The fetcher reads a single listing page, keeps the links that point at one
//! year's PDFs, and downloads each of them in turn. Existing files are kept so
//! an interrupted run can be resumed. A failed download is logged, its partial
//! file removed, and the run moves on; nothing is retried.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use reqwest::Client;
use scraper::{Html, Selector};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};
use url::Url;

use nimescreen_shared::{FetchConfig, NimeScreenError, Result};

/// User-Agent string for portal requests.
const USER_AGENT: &str = concat!("nimescreen/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// FetchReport
// ---------------------------------------------------------------------------

/// Summary of a completed fetch run.
#[derive(Debug, Clone)]
pub struct FetchReport {
    /// Directory the PDFs were saved to.
    pub save_dir: PathBuf,
    /// Distinct PDF links found for the year.
    pub found: usize,
    /// Files downloaded in this run.
    pub downloaded: usize,
    /// Files already present and left untouched.
    pub skipped_existing: usize,
    /// Failed downloads (file name, error message).
    pub failures: Vec<(String, String)>,
    /// Total duration of the run.
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Downloads one proceedings year from the paper portal.
pub struct Fetcher {
    config: FetchConfig,
    client: Client,
}

impl Fetcher {
    /// Create a fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| NimeScreenError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Fetch the listing page and return the year's PDF links.
    pub async fn fetch_links(&self) -> Result<Vec<Url>> {
        let url = &self.config.papers_url;
        info!(%url, "accessing paper portal");

        let response = self
            .client
            .get(url.as_str())
            .timeout(self.config.listing_timeout)
            .send()
            .await
            .map_err(|e| NimeScreenError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NimeScreenError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| NimeScreenError::Network(format!("{url}: body read failed: {e}")))?;

        Ok(list_pdf_links(&body, self.config.year, &self.config.base_url))
    }

    /// Download every PDF for the configured year.
    ///
    /// `on_file` is called before each file with `(current, total, file_name)`.
    #[instrument(skip_all, fields(year = self.config.year))]
    pub async fn run(&self, on_file: &mut dyn FnMut(usize, usize, &str)) -> Result<FetchReport> {
        let start = Instant::now();
        let save_dir = &self.config.save_dir;

        std::fs::create_dir_all(save_dir).map_err(|e| NimeScreenError::io(save_dir, e))?;
        debug!(?save_dir, "save directory ready");

        let links = self.fetch_links().await?;
        let mut report = FetchReport {
            save_dir: save_dir.clone(),
            found: links.len(),
            downloaded: 0,
            skipped_existing: 0,
            failures: Vec::new(),
            duration: Duration::ZERO,
        };

        if links.is_empty() {
            warn!(
                year = self.config.year,
                "no papers found on the portal; this year's proceedings may not be released yet"
            );
            report.duration = start.elapsed();
            return Ok(report);
        }

        info!(found = links.len(), "starting download");

        let total = links.len();
        for (i, url) in links.iter().enumerate() {
            let Some(file_name) = pdf_file_name(url) else {
                warn!(%url, "link has no file name, skipping");
                report.failures.push((url.to_string(), "no file name in URL".into()));
                continue;
            };
            on_file(i + 1, total, &file_name);

            let dest = save_dir.join(&file_name);
            if dest.exists() {
                debug!(file = %file_name, "already downloaded, skipping");
                report.skipped_existing += 1;
                continue;
            }

            match self.download(url, &dest).await {
                Ok(bytes) => {
                    debug!(file = %file_name, bytes, "download complete");
                    report.downloaded += 1;
                }
                Err(e) => {
                    warn!(file = %file_name, error = %e, "download failed");
                    report.failures.push((file_name, e.to_string()));
                }
            }
        }

        report.duration = start.elapsed();
        info!(
            found = report.found,
            downloaded = report.downloaded,
            skipped = report.skipped_existing,
            failed = report.failures.len(),
            duration_ms = report.duration.as_millis(),
            "fetch completed"
        );
        Ok(report)
    }

    /// Stream one PDF to `dest`. On any failure the partial file is removed.
    async fn download(&self, url: &Url, dest: &Path) -> Result<u64> {
        let result = self.stream_to_file(url, dest).await;
        if result.is_err() && dest.exists() {
            if let Err(e) = tokio::fs::remove_file(dest).await {
                warn!(path = %dest.display(), error = %e, "could not remove partial file");
            }
        }
        result
    }

    async fn stream_to_file(&self, url: &Url, dest: &Path) -> Result<u64> {
        let mut response = self
            .client
            .get(url.as_str())
            .timeout(self.config.download_timeout)
            .send()
            .await
            .map_err(|e| NimeScreenError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NimeScreenError::Network(format!("{url}: HTTP {status}")));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| NimeScreenError::io(dest, e))?;

        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| NimeScreenError::Network(format!("{url}: body read failed: {e}")))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| NimeScreenError::io(dest, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| NimeScreenError::io(dest, e))?;

        Ok(written)
    }
}

// ---------------------------------------------------------------------------
// Link selection
// ---------------------------------------------------------------------------

/// Pick the PDF links for `year` out of a listing page.
///
/// A link qualifies when its `href` contains `/<year>/` and ends in `.pdf`
/// (any case). Links are resolved against `base_url` and deduplicated in
/// first-seen order.
pub fn list_pdf_links(html: &str, year: u16, base_url: &Url) -> Vec<Url> {
    let doc = Html::parse_document(html);
    let link_sel = Selector::parse("a[href]").expect("valid selector");
    let year_segment = format!("/{year}/");

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for el in doc.select(&link_sel) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        if !href.contains(&year_segment) || !href.to_lowercase().ends_with(".pdf") {
            continue;
        }

        match base_url.join(href) {
            Ok(resolved) => {
                if seen.insert(resolved.to_string()) {
                    links.push(resolved);
                }
            }
            Err(e) => debug!(href, error = %e, "unresolvable link"),
        }
    }

    links
}

/// Last path segment of a PDF URL, used as the local file name.
pub fn pdf_file_name(url: &Url) -> Option<String> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod fetcher_tests {
    use super::*;

    fn config_for(server_uri: &str, save_dir: PathBuf) -> FetchConfig {
        FetchConfig {
            papers_url: Url::parse(&format!("{server_uri}/papers/")).unwrap(),
            base_url: Url::parse(&format!("{server_uri}/")).unwrap(),
            year: 2025,
            save_dir,
            listing_timeout: Duration::from_secs(5),
            download_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_list_pdf_links_filters_year_and_extension() {
        let html = r#"<html><body>
            <a href="/proceedings/2025/nime2025_1.pdf">One</a>
            <a href="/proceedings/2025/nime2025_2.PDF">Two</a>
            <a href="/proceedings/2025/nime2025_1.pdf">One again</a>
            <a href="/proceedings/2024/nime2024_9.pdf">Last year</a>
            <a href="/proceedings/2025/index.html">Index</a>
            <a href="https://mirror.example.org/2025/remote.pdf">Mirror</a>
            <a>No href</a>
        </body></html>"#;
        let base = Url::parse("https://nime.org/").unwrap();

        let links = list_pdf_links(html, 2025, &base);
        let links: Vec<String> = links.iter().map(Url::to_string).collect();
        assert_eq!(
            links,
            vec![
                "https://nime.org/proceedings/2025/nime2025_1.pdf",
                "https://nime.org/proceedings/2025/nime2025_2.PDF",
                "https://mirror.example.org/2025/remote.pdf",
            ]
        );
    }

    #[test]
    fn test_pdf_file_name() {
        let url = Url::parse("https://nime.org/proceedings/2025/nime2025_1.pdf").unwrap();
        assert_eq!(pdf_file_name(&url).as_deref(), Some("nime2025_1.pdf"));

        let dir = Url::parse("https://nime.org/proceedings/").unwrap();
        assert_eq!(pdf_file_name(&dir), None);
    }

    #[tokio::test]
    async fn test_fetch_downloads_skips_and_cleans_up() {
        let server = wiremock::MockServer::start().await;

        let listing = r#"<html><body>
            <a href="/2025/good.pdf">Good</a>
            <a href="/2025/present.pdf">Already here</a>
            <a href="/2025/missing.pdf">Broken</a>
            <a href="/2024/old.pdf">Old</a>
        </body></html>"#;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/papers/"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(listing))
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::path("/2025/good.pdf"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 good".to_vec()))
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::path("/2025/missing.pdf"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let save_dir = tmp.path().join("NIME_2025_Papers");
        std::fs::create_dir_all(&save_dir).unwrap();
        std::fs::write(save_dir.join("present.pdf"), b"kept").unwrap();

        let fetcher = Fetcher::new(config_for(&server.uri(), save_dir.clone())).unwrap();
        let mut seen = Vec::new();
        let report = fetcher
            .run(&mut |_, total, name| seen.push((total, name.to_string())))
            .await
            .unwrap();

        assert_eq!(report.found, 3);
        assert_eq!(report.downloaded, 1);
        assert_eq!(report.skipped_existing, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "missing.pdf");
        assert_eq!(seen.len(), 3);

        assert_eq!(std::fs::read(save_dir.join("good.pdf")).unwrap(), b"%PDF-1.4 good");
        assert_eq!(std::fs::read(save_dir.join("present.pdf")).unwrap(), b"kept");
        assert!(!save_dir.join("missing.pdf").exists());
        assert!(!save_dir.join("old.pdf").exists());
    }

    #[tokio::test]
    async fn test_fetch_with_no_links_is_empty_report() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/papers/"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let save_dir = tmp.path().join("NIME_2025_Papers");
        let fetcher = Fetcher::new(config_for(&server.uri(), save_dir.clone())).unwrap();
        let report = fetcher.run(&mut |_, _, _| {}).await.unwrap();

        assert_eq!(report.found, 0);
        assert!(save_dir.is_dir());
    }

    #[tokio::test]
    async fn test_listing_failure_is_network_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/papers/"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let fetcher =
            Fetcher::new(config_for(&server.uri(), tmp.path().join("NIME_2025_Papers"))).unwrap();
        let err = fetcher.run(&mut |_, _, _| {}).await.unwrap_err();
        assert!(matches!(err, NimeScreenError::Network(_)));
    }
}
