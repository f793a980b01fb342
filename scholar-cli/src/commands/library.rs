//! `acm library`: the downloaded PDFs and what has been indexed from them

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use scholar_core::config::ScholarConfig;
use scholar_core::library::{format_size, Library, LibraryEntry, LibrarySort};
use scholar_index::{open_store, PaperStore};
use scholar_search::truncate;
use std::sync::Arc;

use crate::ui;

#[derive(Parser, Debug)]
pub struct LibraryArgs {
    #[command(subcommand)]
    pub command: LibraryCommands,
}

#[derive(Subcommand, Debug)]
pub enum LibraryCommands {
    /// List downloaded papers
    List {
        /// Number of papers to show
        #[arg(long, short, default_value = "20")]
        limit: usize,

        /// Sort order
        #[arg(long, short, value_enum, default_value = "date")]
        sort: SortArg,
    },
    /// Library size and index statistics
    Stats,
    /// Delete a downloaded paper by list number or file name
    Remove {
        /// Number from `acm library list --sort title`, or the exact file name
        reference: String,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
    /// Delete old downloads, or everything
    Clean {
        /// Delete papers not modified in this many days
        #[arg(long, value_name = "DAYS")]
        older_than: Option<u32>,

        /// Delete every downloaded paper
        #[arg(long)]
        empty: bool,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
    /// Find downloaded (and indexed) papers by keyword
    Search {
        /// Case-insensitive keyword
        keyword: String,
    },
    /// Remove a paper and its chunks from the paper store
    Unindex {
        /// OpenAlex id used when the paper was indexed
        paper_id: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum SortArg {
    /// Newest first
    Date,
    /// File name A-Z
    Title,
    /// Largest first
    Size,
}

impl From<SortArg> for LibrarySort {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Date => LibrarySort::Date,
            SortArg::Title => LibrarySort::Title,
            SortArg::Size => LibrarySort::Size,
        }
    }
}

pub async fn run_library(args: LibraryArgs) -> Result<()> {
    let config = ScholarConfig::load_or_default()?;
    let library = Library::open(config.download_dir_path());

    match args.command {
        LibraryCommands::List { limit, sort } => run_list(&library, limit, sort),
        LibraryCommands::Stats => run_stats(&config, &library).await,
        LibraryCommands::Remove { reference, force } => run_remove(&library, &reference, force),
        LibraryCommands::Clean {
            older_than,
            empty,
            force,
        } => run_clean(&library, older_than, empty, force),
        LibraryCommands::Search { keyword } => run_search(&config, &library, &keyword).await,
        LibraryCommands::Unindex { paper_id } => run_unindex(&config, &paper_id).await,
    }
}

/// The store, unless only the in-memory fallback is available
async fn persistent_store(config: &ScholarConfig) -> Option<Arc<dyn PaperStore>> {
    if !config.database.is_configured() {
        return None;
    }
    let store = open_store(&config.database).await;
    (store.backend() != "memory").then_some(store)
}

fn print_entries(entries: &[LibraryEntry]) {
    println!("{:>3}  {:<60}  {:>9}  {}", "#", "File", "Size", "Modified");
    for (i, entry) in entries.iter().enumerate() {
        println!(
            "{:>3}  {:<60}  {:>9}  {}",
            i + 1,
            truncate(&entry.name, 60),
            format_size(entry.size),
            entry.modified.format("%Y-%m-%d %H:%M")
        );
    }
}

fn run_list(library: &Library, limit: usize, sort: SortArg) -> Result<()> {
    if !library.exists() {
        println!("Library is empty ({} does not exist yet)", library.dir().display());
        return Ok(());
    }
    let entries = library.list(sort.into(), Some(limit))?;
    if entries.is_empty() {
        println!("No papers downloaded yet.\n\nTry: acm search \"<keywords>\"");
        return Ok(());
    }
    println!("Library: {}\n", library.dir().display());
    print_entries(&entries);
    Ok(())
}

async fn run_stats(config: &ScholarConfig, library: &Library) -> Result<()> {
    let stats = library.stats()?;
    println!("Papers:    {}", stats.paper_count);
    println!("Size:      {}", format_size(stats.total_size));
    println!("Location:  {}", stats.location.display());

    match persistent_store(config).await {
        Some(store) => match store.stats().await {
            Ok(index) => {
                println!("\nIndexed ({}):", store.backend());
                println!("  Papers:  {}", index.paper_count);
                println!("  Chunks:  {}", index.chunk_count);
            }
            Err(e) => println!("\nIndex unavailable: {}", e),
        },
        None => println!("\nIndex: no database configured"),
    }
    Ok(())
}

fn run_remove(library: &Library, reference: &str, force: bool) -> Result<()> {
    let entry = library.resolve(reference)?;
    if !ui::confirm(&format!("Delete {}?", entry.name), force)? {
        println!("Cancelled.");
        return Ok(());
    }
    let removed = library.remove(reference)?;
    println!("✓ Deleted {}", removed.name);
    Ok(())
}

fn run_clean(library: &Library, older_than: Option<u32>, empty: bool, force: bool) -> Result<()> {
    let removed = match (older_than, empty) {
        (_, true) => {
            let count = library.stats()?.paper_count;
            if count == 0 {
                println!("Library is already empty.");
                return Ok(());
            }
            if !ui::confirm(&format!("Delete all {} papers?", count), force)? {
                println!("Cancelled.");
                return Ok(());
            }
            library.clean_all()?
        }
        (Some(days), false) => {
            if !ui::confirm(&format!("Delete papers older than {} days?", days), force)? {
                println!("Cancelled.");
                return Ok(());
            }
            library.clean_older_than(days)?
        }
        (None, false) => anyhow::bail!("Specify --older-than <DAYS> or --empty"),
    };
    println!("✓ Deleted {} paper(s)", removed);
    Ok(())
}

async fn run_search(config: &ScholarConfig, library: &Library, keyword: &str) -> Result<()> {
    let entries = library.search(keyword)?;
    if entries.is_empty() {
        println!("No downloaded papers match '{}'", keyword);
    } else {
        println!("Downloaded papers matching '{}':\n", keyword);
        print_entries(&entries);
    }

    if let Some(store) = persistent_store(config).await {
        let papers = store.search_papers(keyword, 20).await?;
        if !papers.is_empty() {
            println!("\nIndexed papers:");
            for paper in papers {
                let year = paper.year.map(|y| y.to_string()).unwrap_or_else(|| "N/A".into());
                println!("  {:<12} {} ({})", paper.paper_id, truncate(&paper.title, 70), year);
            }
        }
    }
    Ok(())
}

async fn run_unindex(config: &ScholarConfig, paper_id: &str) -> Result<()> {
    let Some(store) = persistent_store(config).await else {
        anyhow::bail!("No database configured\n\nRun: acm config set database.url ws://localhost:8000/rpc");
    };
    if store.delete_paper(paper_id).await? {
        println!("✓ Removed {} from the index", paper_id);
    } else {
        println!("{} is not indexed", paper_id);
    }
    Ok(())
}
