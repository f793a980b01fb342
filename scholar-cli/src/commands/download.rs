//! `acm download`: fetch open-access PDFs and index them

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt};
use scholar_core::config::ScholarConfig;
use scholar_core::work::Work;
use scholar_index::{build_embedder, Indexer, SurrealStore};
use scholar_search::{OpenAlexClient, PaperDownloader};
use tracing::{info, warn};

use super::search::require_history;
use crate::ui;

/// OpenAlex lookups in flight during `download batch`
const LOOKUP_CONCURRENCY: usize = 4;

#[derive(Parser, Debug)]
pub struct DownloadArgs {
    #[command(subcommand)]
    pub command: DownloadCommands,

    /// Download without indexing into the paper store
    #[arg(long, global = true)]
    pub no_index: bool,
}

#[derive(Subcommand, Debug)]
pub enum DownloadCommands {
    /// Download one paper by OpenAlex id (e.g. W2741809807)
    Paper {
        /// OpenAlex work id or URL
        paper_id: String,
    },
    /// Download every paper id listed in a file (one per line, # comments allowed)
    Batch {
        /// File with one OpenAlex id per line
        file: PathBuf,
    },
    /// Download papers from the last search results
    FromSearch {
        /// Comma-separated 1-based result numbers (e.g. 1,3,5)
        indices: Option<String>,

        /// Download every result
        #[arg(long, short)]
        all: bool,
    },
    /// Download a PDF from a direct link
    Url {
        /// PDF address
        url: String,

        /// Title used for the file name
        #[arg(long, short)]
        title: Option<String>,
    },
}

pub async fn run_download(args: DownloadArgs) -> Result<()> {
    let session = DownloadSession::open(!args.no_index).await?;

    let summary = match args.command {
        DownloadCommands::Paper { paper_id } => {
            let work = session.lookup(&paper_id).await?;
            session.download_works(&[&work]).await
        }
        DownloadCommands::Batch { file } => {
            let ids = read_id_file(&file)?;
            if ids.is_empty() {
                anyhow::bail!("No paper ids in {}", file.display());
            }
            let (works, mut missing) = session.lookup_all(&ids).await;
            let refs: Vec<&Work> = works.iter().collect();
            let mut summary = session.download_works(&refs).await;
            summary.failed.append(&mut missing);
            summary
        }
        DownloadCommands::FromSearch { indices, all } => {
            let history = require_history()?;
            let works: Vec<&Work> = match (indices, all) {
                (_, true) => history.results.iter().collect(),
                (Some(indices), false) => history.select(&indices),
                (None, false) => anyhow::bail!(
                    "Specify result numbers (e.g. 1,3) or --all\n\nSee them with: acm last"
                ),
            };
            if works.is_empty() {
                anyhow::bail!(
                    "None of those numbers match the {} saved results",
                    history.results.len()
                );
            }
            session.download_works(&works).await
        }
        DownloadCommands::Url { url, title } => session.download_link(&url, title.as_deref()).await,
    };

    summary.print();
    if summary.downloaded.is_empty() && !summary.failed.is_empty() {
        anyhow::bail!("No papers downloaded");
    }
    Ok(())
}

/// Ids from a batch file; blank lines and `#` comments are skipped
pub fn read_id_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

#[derive(Debug)]
pub struct DownloadedPaper {
    pub title: String,
    pub path: PathBuf,
    /// Chunks written to the store, when indexed
    pub chunks: Option<usize>,
}

#[derive(Debug, Default)]
pub struct DownloadSummary {
    pub downloaded: Vec<DownloadedPaper>,
    /// (paper, reason)
    pub failed: Vec<(String, String)>,
}

impl DownloadSummary {
    pub fn print(&self) {
        if !self.downloaded.is_empty() {
            println!("\nDownloaded {} paper(s):", self.downloaded.len());
            for paper in &self.downloaded {
                let indexed = match paper.chunks {
                    Some(n) => format!(" [indexed, {} chunks]", n),
                    None => String::new(),
                };
                println!("  ✓ {}{}", paper.title, indexed);
                println!("    {}", paper.path.display());
            }
        }
        if !self.failed.is_empty() {
            println!("\nFailed {}:", self.failed.len());
            for (paper, reason) in &self.failed {
                println!("  ✗ {}: {}", paper, reason);
            }
        }
    }
}

/// Config, clients and (optionally) the indexer for one download command
pub struct DownloadSession {
    client: OpenAlexClient,
    downloader: PaperDownloader,
    indexer: Option<Indexer>,
}

impl DownloadSession {
    pub async fn open(index: bool) -> Result<Self> {
        let config = ScholarConfig::load()?;
        let client = OpenAlexClient::from_config(&config)?;
        let downloader = PaperDownloader::new(config.download_dir()?)?.quiet(ui::is_quiet());

        let indexer = if index {
            match connect_indexer(&config).await {
                Ok(indexer) => Some(indexer),
                Err(reason) => {
                    warn!("{}", reason);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            client,
            downloader,
            indexer,
        })
    }

    pub async fn lookup(&self, paper_id: &str) -> Result<Work> {
        let pb = ui::spinner(format!("Looking up {}...", paper_id));
        let work = self.client.get_work(paper_id).await;
        ui::clear(pb);
        work?.with_context(|| format!("Paper not found: {}", paper_id))
    }

    /// Resolve many ids concurrently; failures come back as (id, reason)
    async fn lookup_all(&self, ids: &[String]) -> (Vec<Work>, Vec<(String, String)>) {
        let pb = ui::spinner(format!("Looking up {} papers...", ids.len()));
        let results: Vec<(String, Result<Option<Work>>)> = stream::iter(ids.iter().cloned())
            .map(|id| async move {
                let work = self.client.get_work(&id).await;
                (id, work)
            })
            .buffered(LOOKUP_CONCURRENCY)
            .collect()
            .await;
        ui::clear(pb);

        let mut works = Vec::new();
        let mut missing = Vec::new();
        for (id, result) in results {
            match result {
                Ok(Some(work)) => works.push(work),
                Ok(None) => missing.push((id, "not found on OpenAlex".to_string())),
                Err(e) => missing.push((id, format!("{:#}", e))),
            }
        }
        (works, missing)
    }

    /// Download (and index) each work, collecting failures instead of stopping
    pub async fn download_works(&self, works: &[&Work]) -> DownloadSummary {
        let mut summary = DownloadSummary::default();
        for (i, work) in works.iter().enumerate() {
            if works.len() > 1 {
                println!("[{}/{}] {}", i + 1, works.len(), work.display_title());
            }
            match self.download_one(work).await {
                Ok(paper) => summary.downloaded.push(paper),
                Err(e) => summary
                    .failed
                    .push((work.short_id().to_string(), format!("{:#}", e))),
            }
        }
        summary
    }

    async fn download_one(&self, work: &Work) -> Result<DownloadedPaper> {
        let url = work
            .pdf_url()
            .context("No open-access PDF available (try the DOI landing page)")?;
        let downloaded = self.downloader.download(work, &url).await?;
        info!("Saved {} ({} bytes)", downloaded.path.display(), downloaded.bytes);

        let chunks = if downloaded.is_pdf {
            self.index(work, &downloaded.path).await
        } else {
            warn!(
                "{} does not look like a PDF (probably a landing page); not indexing",
                downloaded.path.display()
            );
            None
        };

        Ok(DownloadedPaper {
            title: work.display_title().to_string(),
            path: downloaded.path,
            chunks,
        })
    }

    async fn download_link(&self, url: &str, title: Option<&str>) -> DownloadSummary {
        let mut summary = DownloadSummary::default();
        match self.downloader.download_url(url, title).await {
            Ok(downloaded) => {
                let work = local_work(&downloaded.path, title);
                let chunks = if downloaded.is_pdf {
                    self.index(&work, &downloaded.path).await
                } else {
                    None
                };
                summary.downloaded.push(DownloadedPaper {
                    title: work.display_title().to_string(),
                    path: downloaded.path,
                    chunks,
                });
            }
            Err(e) => summary.failed.push((url.to_string(), format!("{:#}", e))),
        }
        summary
    }

    /// Index a downloaded PDF; indexing problems never fail the download
    async fn index(&self, work: &Work, path: &Path) -> Option<usize> {
        let indexer = self.indexer.as_ref()?;
        let pb = ui::spinner(format!("Indexing {}...", work.short_id()));
        match indexer.index_pdf(work, path).await {
            Ok(report) => {
                ui::finish_success(pb, format!("Indexed {} ({} chunks)", report.paper_id, report.chunk_count));
                Some(report.chunk_count)
            }
            Err(e) => {
                ui::finish_error(pb, format!("Indexing failed: {:#}", e));
                None
            }
        }
    }
}

/// The indexer for downloaded papers, or why they will not be indexed
async fn connect_indexer(config: &ScholarConfig) -> std::result::Result<Indexer, String> {
    if !config.database.is_configured() {
        return Err(
            "No database configured; papers will not be indexed (acm config set database.url ...)".into(),
        );
    }
    let store = SurrealStore::connect(&config.database)
        .await
        .map_err(|e| format!("Database unavailable, papers will not be indexed: {}", e))?;
    Ok(Indexer::new(Arc::new(store), build_embedder(&config.llm)))
}

/// Stand-in work for a file fetched from a direct link, keyed by its file stem
fn local_work(path: &Path, title: Option<&str>) -> Work {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "download".into());
    Work {
        id: format!("local/{}", stem),
        title: Some(title.map(str::to_string).unwrap_or_else(|| stem.replace('_', " "))),
        ..Work::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_id_file_skips_comments_and_blanks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# reading list").unwrap();
        writeln!(file, "W2741809807").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  https://openalex.org/W1  ").unwrap();

        let ids = read_id_file(file.path()).unwrap();
        assert_eq!(ids, vec!["W2741809807", "https://openalex.org/W1"]);
    }

    #[tokio::test]
    async fn test_indexing_skipped_without_database() {
        let reason = connect_indexer(&ScholarConfig::default()).await.err().unwrap();
        assert!(reason.starts_with("No database configured"));
    }

    #[tokio::test]
    async fn test_indexing_skip_reports_connection_error() {
        let mut config = ScholarConfig::default();
        config.database.url = Some("ws://127.0.0.1:1/rpc".into());
        config.database.user = Some("root".into());
        config.database.password = Some("root".into());

        let reason = connect_indexer(&config).await.err().unwrap();
        assert!(reason.starts_with("Database unavailable"), "{}", reason);
        assert!(reason.contains("127.0.0.1:1"), "{}", reason);
    }

    #[test]
    fn test_local_work_uses_file_stem() {
        let work = local_work(Path::new("/papers/attention_is_all.pdf"), None);
        assert_eq!(work.short_id(), "attention_is_all");
        assert_eq!(work.display_title(), "attention is all");

        let titled = local_work(Path::new("/papers/x.pdf"), Some("Paxos Made Simple"));
        assert_eq!(titled.display_title(), "Paxos Made Simple");
    }
}
