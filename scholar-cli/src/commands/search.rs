//! `acm last` and `acm interactive`: working with the saved search results

use anyhow::{Context, Result};
use clap::Parser;
use inquire::MultiSelect;
use scholar_core::history::SearchHistory;
use scholar_core::work::Work;
use scholar_search::{format_table, print_works, truncate, OutputFormat};

use super::download::{DownloadSession, DownloadSummary};
use crate::ui;

#[derive(Parser, Debug)]
pub struct InteractiveArgs {
    /// Download without indexing into the paper store
    #[arg(long)]
    pub no_index: bool,
}

/// Load the last search or explain how to make one
pub fn require_history() -> Result<SearchHistory> {
    SearchHistory::load()?
        .filter(|h| !h.results.is_empty())
        .context("No previous search results.\n\nRun: acm search \"<keywords>\"")
}

pub fn run_last() -> Result<()> {
    let history = require_history()?;
    println!(
        "Last search: \"{}\" ({})",
        history.query,
        history.searched_at.format("%Y-%m-%d %H:%M")
    );
    print_works(&history.results, &OutputFormat::Text, "Results")
}

/// Label shown for one work in the picker
fn choice_label(index: usize, work: &Work) -> String {
    let year = work
        .publication_year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "N/A".into());
    let pdf = if work.pdf_url().is_some() { "PDF" } else { "no PDF" };
    format!(
        "{:>2}. {} ({}, {} cites, {})",
        index + 1,
        truncate(work.display_title(), 70),
        year,
        work.cited_by_count,
        pdf
    )
}

pub async fn run_interactive(args: InteractiveArgs) -> Result<()> {
    let history = require_history()?;

    if !ui::is_interactive() {
        print!("{}", format_table(&history.results));
        anyhow::bail!(
            "Interactive selection needs a terminal\n\nUse: acm download from-search <indices>"
        );
    }

    let labels: Vec<String> = history
        .results
        .iter()
        .enumerate()
        .map(|(i, w)| choice_label(i, w))
        .collect();

    let picked = MultiSelect::new(
        &format!("Papers from \"{}\" to download:", history.query),
        labels.clone(),
    )
    .with_help_message("Space to select, Enter to confirm")
    .with_page_size(15)
    .prompt()
    .context("Selection cancelled")?;

    if picked.is_empty() {
        println!("Nothing selected.");
        return Ok(());
    }

    let works: Vec<&Work> = picked
        .iter()
        .filter_map(|label| labels.iter().position(|l| l == label))
        .map(|i| &history.results[i])
        .collect();

    let session = DownloadSession::open(!args.no_index).await?;
    let summary: DownloadSummary = session.download_works(&works).await;
    summary.print();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_label_marks_missing_pdf() {
        let work: Work = serde_json::from_value(serde_json::json!({
            "id": "https://openalex.org/W7",
            "title": "Consensus in the Presence of Partial Synchrony",
            "publication_year": 1988,
            "cited_by_count": 3000
        }))
        .unwrap();
        let label = choice_label(2, &work);
        assert!(label.starts_with(" 3. Consensus"));
        assert!(label.contains("1988"));
        assert!(label.ends_with("no PDF)"));
    }
}
