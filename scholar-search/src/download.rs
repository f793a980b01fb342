//! Open-access PDF downloader

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use scholar_core::work::{safe_title, Work};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::openalex::truncate_body;

pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

const PDF_MAGIC: &[u8] = b"%PDF";

/// Result of one download
#[derive(Debug, Clone)]
pub struct Downloaded {
    pub path: PathBuf,
    pub bytes: u64,
    /// False when the server returned something other than a PDF (usually a landing page)
    pub is_pdf: bool,
}

pub struct PaperDownloader {
    client: Client,
    dir: PathBuf,
    quiet: bool,
}

impl PaperDownloader {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let client = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent("ACM Scholar CLI")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            dir: dir.into(),
            quiet: false,
        })
    }

    /// Suppress the progress bar
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Download a work's PDF to `{dir}/{work.pdf_filename()}`
    pub async fn download(&self, work: &Work, url: &str) -> Result<Downloaded> {
        let path = self.dir.join(work.pdf_filename());
        self.fetch_to(url, &path).await
    }

    /// Download an arbitrary link, naming the file after `title` or the URL
    pub async fn download_url(&self, url: &str, title: Option<&str>) -> Result<Downloaded> {
        let path = self.dir.join(filename_for_url(url, title));
        self.fetch_to(url, &path).await
    }

    async fn fetch_to(&self, url: &str, path: &Path) -> Result<Downloaded> {
        debug!("GET {} -> {}", url, path.display());

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to request {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Download failed ({}): {}", status, truncate_body(&body));
        }

        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let pb = progress_bar(response.content_length(), &name, self.quiet);

        let mut file = fs::File::create(path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;

        let mut head = Vec::with_capacity(PDF_MAGIC.len());
        let streamed: Result<u64> = async {
            let mut written = 0u64;
            while let Some(chunk) = response.chunk().await? {
                if head.len() < PDF_MAGIC.len() {
                    let take = (PDF_MAGIC.len() - head.len()).min(chunk.len());
                    head.extend_from_slice(&chunk[..take]);
                }
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
                if let Some(pb) = &pb {
                    pb.inc(chunk.len() as u64);
                }
            }
            file.flush().await?;
            Ok(written)
        }
        .await;

        let bytes = match streamed {
            Ok(bytes) => bytes,
            Err(e) => {
                if let Some(pb) = pb {
                    pb.abandon_with_message(format!("✗ {}", name));
                }
                drop(file);
                if let Err(rm) = fs::remove_file(path).await {
                    warn!("Failed to remove partial file {}: {}", path.display(), rm);
                }
                return Err(e.context(format!("Download of {} interrupted", url)));
            }
        };

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        let is_pdf = head == PDF_MAGIC;
        if !is_pdf {
            warn!("{} is not a PDF (the link may point to a landing page)", name);
        }
        info!("Downloaded {} ({} bytes)", path.display(), bytes);

        Ok(Downloaded {
            path: path.to_path_buf(),
            bytes,
            is_pdf,
        })
    }
}

/// Filename for a direct link: safe title, else last URL segment, else `download.pdf`
fn filename_for_url(url: &str, title: Option<&str>) -> String {
    if let Some(title) = title.map(safe_title).filter(|t| !t.is_empty()) {
        return format!("{}.pdf", title);
    }

    let segment = url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.chars()
                .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_'))
                .collect::<String>()
        })
        .filter(|s| !s.is_empty());

    match segment {
        Some(s) if s.to_ascii_lowercase().ends_with(".pdf") => s,
        Some(s) => format!("{}.pdf", s),
        None => "download.pdf".to_string(),
    }
}

fn progress_bar(total: Option<u64>, name: &str, quiet: bool) -> Option<ProgressBar> {
    if quiet || !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = match total {
        Some(len) if len > 0 => {
            let pb = ProgressBar::new(len);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{msg:40!} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▓░"),
            );
            pb
        }
        _ => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.cyan} {msg} {bytes}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.enable_steady_tick(Duration::from_millis(80));
            pb
        }
    };
    pb.set_message(name.to_string());
    Some(pb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn work() -> Work {
        serde_json::from_value(serde_json::json!({
            "id": "https://openalex.org/W7",
            "title": "Readable Proofs",
            "publication_year": 2021,
            "authorships": [{"author": {"display_name": "Barbara Liskov"}}]
        }))
        .unwrap()
    }

    #[test]
    fn test_filename_for_url() {
        assert_eq!(
            filename_for_url("https://arxiv.org/pdf/1706.03762", None),
            "1706.03762.pdf"
        );
        assert_eq!(
            filename_for_url("https://example.org/files/paper.PDF?dl=1", None),
            "paper.PDF"
        );
        assert_eq!(filename_for_url("https://example.org/", None), "download.pdf");
        assert_eq!(
            filename_for_url("https://example.org/x", Some("My Paper: v2")),
            "My_Paper_v2.pdf"
        );
    }

    #[tokio::test]
    async fn test_download_writes_named_file() {
        let router = Router::new().route("/paper.pdf", get(|| async { b"%PDF-1.7 body".to_vec() }));
        let base = spawn(router).await;
        let dir = tempfile::tempdir().unwrap();

        let downloader = PaperDownloader::new(dir.path()).unwrap().quiet(true);
        let result = downloader
            .download(&work(), &format!("{}/paper.pdf", base))
            .await
            .unwrap();

        assert_eq!(result.path, dir.path().join("Liskov_2021_Readable_Proofs.pdf"));
        assert_eq!(result.bytes, 13);
        assert!(result.is_pdf);
        assert_eq!(std::fs::read(&result.path).unwrap(), b"%PDF-1.7 body");
    }

    #[tokio::test]
    async fn test_landing_page_flagged() {
        let router = Router::new().route("/landing", get(|| async { "<html>abstract page</html>" }));
        let base = spawn(router).await;
        let dir = tempfile::tempdir().unwrap();

        let downloader = PaperDownloader::new(dir.path()).unwrap().quiet(true);
        let result = downloader
            .download_url(&format!("{}/landing", base), None)
            .await
            .unwrap();
        assert!(!result.is_pdf);
        assert!(result.path.ends_with("landing.pdf"));
    }

    #[tokio::test]
    async fn test_http_error_leaves_no_file() {
        let router = Router::new().route("/gone.pdf", get(|| async { StatusCode::FORBIDDEN }));
        let base = spawn(router).await;
        let dir = tempfile::tempdir().unwrap();

        let downloader = PaperDownloader::new(dir.path()).unwrap().quiet(true);
        let err = downloader
            .download(&work(), &format!("{}/gone.pdf", base))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("403"));
        assert!(!dir.path().join("Liskov_2021_Readable_Proofs.pdf").exists());
    }
}
