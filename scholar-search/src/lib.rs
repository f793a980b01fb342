//! scholar-search - OpenAlex search and open-access PDF download
//!
//! This crate provides:
//! - OpenAlex works client (search, ACM-only search, lookup by id)
//! - PDF downloader with progress reporting
//! - CLI argument handling for `acm search` / `acm search-acm`
//!
//! ## Flow
//!
//! ```text
//! query → OpenAlexClient::search → Vec<Work> → table / json / ids
//!                                      ↓
//!                         ~/.acm-scholar/last_search.json
//! ```

pub mod download;
pub mod openalex;

use std::io::IsTerminal;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use scholar_core::config::ScholarConfig;
use scholar_core::history::SearchHistory;
use scholar_core::work::Work;
use serde::Serialize;
use tracing::{instrument, warn};

pub use download::{Downloaded, PaperDownloader};
pub use openalex::{OpenAlexClient, SearchQuery};

/// `acm search` arguments
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search keywords
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Only papers published in this year
    #[arg(short = 'y', long)]
    pub year: Option<i32>,

    /// Maximum results to return
    #[arg(short = 'l', long, default_value = "10")]
    pub limit: usize,

    /// Minimum citation count
    #[arg(short = 'c', long)]
    pub citations: Option<u64>,

    /// Output format (text, json, inline)
    #[arg(long, short = 'f', default_value = "text")]
    pub format: OutputFormat,

    /// Suppress progress spinner (set from the global `--quiet`)
    #[arg(skip)]
    pub quiet: bool,
}

/// `acm search-acm` arguments
#[derive(Args, Debug)]
pub struct AcmSearchArgs {
    /// Search keywords
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Only papers published in this year
    #[arg(short = 'y', long)]
    pub year: Option<i32>,

    /// Number of OpenAlex results to filter
    #[arg(short = 'l', long, default_value = "10")]
    pub limit: usize,

    /// Output format (text, json, inline)
    #[arg(long, short = 'f', default_value = "text")]
    pub format: OutputFormat,

    /// Suppress progress spinner (set from the global `--quiet`)
    #[arg(skip)]
    pub quiet: bool,
}

/// Output format options
#[derive(Debug, Clone, clap::ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Text,
    /// JSON for machine consumption
    Json,
    /// One OpenAlex id per line, for piping into `acm download batch`
    Inline,
}

/// Flat, serializable view of a work used by JSON output and the HTTP API
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WorkSummary {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub citations: u64,
    pub doi: Option<String>,
    pub pdf_url: Option<String>,
    pub is_acm: bool,
}

impl From<&Work> for WorkSummary {
    fn from(work: &Work) -> Self {
        Self {
            id: work.short_id().to_string(),
            title: work.display_title().to_string(),
            authors: work.author_names(usize::MAX),
            year: work.publication_year,
            citations: work.cited_by_count,
            doi: work.bare_doi().map(str::to_string),
            pdf_url: work.pdf_url(),
            is_acm: work.is_acm(),
        }
    }
}

/// Helper to create a spinner (respects quiet mode and TTY)
pub fn spinner(msg: &str, quiet: bool) -> Option<ProgressBar> {
    let env_quiet = std::env::var("ACM_QUIET").is_ok_and(|v| v == "1" || v == "true");
    if quiet || env_quiet || !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    Some(pb)
}

/// Execute `acm search`
#[instrument(skip_all, fields(query = %args.query, year = ?args.year, limit = args.limit))]
pub async fn run_search(args: SearchArgs) -> Result<()> {
    if args.query.trim().is_empty() {
        anyhow::bail!("No query provided");
    }
    let config = ScholarConfig::load()?;
    let client = OpenAlexClient::from_config(&config)?;

    let query = SearchQuery::new(args.query.clone())
        .year(args.year)
        .limit(args.limit)
        .min_citations(args.citations);

    let pb = spinner(&format!("Searching OpenAlex for '{}'...", args.query), args.quiet);
    let works = client.search(&query).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let works = works?;

    remember(&args.query, &works);
    print_works(&works, &args.format, "Search results")
}

/// Execute `acm search-acm`
#[instrument(skip_all, fields(query = %args.query, year = ?args.year))]
pub async fn run_search_acm(args: AcmSearchArgs) -> Result<()> {
    if args.query.trim().is_empty() {
        anyhow::bail!("No query provided");
    }
    let config = ScholarConfig::load()?;
    let client = OpenAlexClient::from_config(&config)?;

    let pb = spinner(&format!("Searching ACM publications for '{}'...", args.query), args.quiet);
    let works = client.search_acm(&args.query, args.year, args.limit).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let works = works?;

    remember(&args.query, &works);
    print_works(&works, &args.format, "ACM results")
}

fn remember(query: &str, works: &[Work]) {
    if let Err(e) = SearchHistory::new(query, works.to_vec()).save() {
        warn!("Could not save search history: {}", e);
    }
}

pub fn print_works(works: &[Work], format: &OutputFormat, heading: &str) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let summaries: Vec<WorkSummary> = works.iter().map(WorkSummary::from).collect();
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        OutputFormat::Inline => {
            for work in works {
                println!("{}", work.short_id());
            }
        }
        OutputFormat::Text => {
            if works.is_empty() {
                println!("No papers found. Try broader keywords.");
                return Ok(());
            }
            println!("\n{} ({} papers)\n", heading, works.len());
            print!("{}", format_table(works));
            println!("\nNext:");
            println!("  acm download paper <id>      download one paper");
            println!("  acm download from-search 1,3 download from these results");
            println!("  acm interactive              pick papers interactively\n");
        }
    }
    Ok(())
}

/// Fixed-width results table
pub fn format_table(works: &[Work]) -> String {
    let mut out = format!(
        "{:>3}  {:<48}  {:<28}  {:>4}  {:>7}  {}\n",
        "#", "Title", "Authors", "Year", "Cites", "ID"
    );
    for (i, work) in works.iter().enumerate() {
        let year = work
            .publication_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "N/A".into());
        out.push_str(&format!(
            "{:>3}  {:<48}  {:<28}  {:>4}  {:>7}  {}\n",
            i + 1,
            truncate(work.display_title(), 48),
            truncate(&work.author_names(3).join(", "), 28),
            year,
            work.cited_by_count,
            work.short_id()
        ));
    }
    out
}

/// Truncate to `max` characters, ending in `...` when cut
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", head)
}
