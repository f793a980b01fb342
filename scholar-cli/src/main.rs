//! acm - research assistant for ACM / OpenAlex papers
//!
//! Entry point for the `acm` command-line tool:
//! - OpenAlex search (`search`, `search-acm`, `last`, `interactive`)
//! - Open-access PDF download and indexing (`download`)
//! - Local library management (`library`)
//! - Question answering over papers (`chat`) and the usage data it records (`data`)
//! - The HTTP backend (`serve`) and its deployment checks (`deploy`)

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

mod commands;
mod config;
mod tracing_setup;
mod ui;

use tracing_setup::{init_tracing, TracingConfig};

#[derive(Parser, Debug)]
#[command(
    name = "acm",
    author,
    version,
    about = "Search, download, index and chat with academic papers",
    long_about = "Search OpenAlex for papers (with an ACM-only filter), download open-access PDFs, \
                  index them into SurrealDB, ask questions about one paper or the whole library, \
                  and run the HTTP backend used by the web frontend."
)]
struct Cli {
    /// Suppress progress spinners and bars (for scripts and pipes)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Debug logging to stderr (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage acm configuration (init, show, get, set, check, path)
    Config(config::ConfigArgs),
    /// Search papers on OpenAlex
    Search(scholar_search::SearchArgs),
    /// Search papers published by ACM
    SearchAcm(scholar_search::AcmSearchArgs),
    /// Show the results of the last search
    Last,
    /// Pick papers from the last search and download them
    Interactive(commands::search::InteractiveArgs),
    /// Download open-access PDFs (and index them)
    Download(commands::download::DownloadArgs),
    /// Manage downloaded papers
    Library(commands::library::LibraryArgs),
    /// Ask questions about papers
    Chat(commands::chat::ChatArgs),
    /// Usage data collected while reading (stats, export)
    Data(commands::data::DataArgs),
    /// Run the HTTP backend
    Serve(commands::serve::ServeArgs),
    /// Deployment helpers (env templates, link checks, probes)
    Deploy(commands::deploy::DeployArgs),
    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: Shell,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[tokio::main]
async fn main() -> Result<()> {
    scholar_core::load_dotenv();

    let cli = Cli::parse();
    init_tracing(&TracingConfig { debug: cli.debug }).ok();
    ui::init_quiet_mode(cli.quiet);

    match cli.command {
        Commands::Config(args) => config::run_config(args)?,
        Commands::Search(mut args) => {
            args.quiet = ui::is_quiet();
            scholar_search::run_search(args).await?
        }
        Commands::SearchAcm(mut args) => {
            args.quiet = ui::is_quiet();
            scholar_search::run_search_acm(args).await?
        }
        Commands::Last => commands::run_last()?,
        Commands::Interactive(args) => commands::run_interactive(args).await?,
        Commands::Download(args) => commands::run_download(args).await?,
        Commands::Library(args) => commands::run_library(args).await?,
        Commands::Chat(args) => commands::run_chat(args).await?,
        Commands::Data(args) => commands::run_data(args)?,
        Commands::Serve(args) => commands::run_serve(args).await?,
        Commands::Deploy(args) => commands::run_deploy(args).await?,
        Commands::Completions(args) => run_completions(args)?,
    }

    Ok(())
}

fn run_completions(args: CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{generate, Shell as CompletionShell};
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    let shell = match args.shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    };

    generate(shell, &mut cmd, bin_name, &mut io::stdout());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["acm", "search", "graph neural networks", "-q", "--debug"])
            .unwrap();
        assert!(cli.quiet);
        assert!(cli.debug);
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.query, "graph neural networks");
                assert_eq!(args.limit, 10);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_search_acm_is_kebab_case() {
        let cli = Cli::try_parse_from(["acm", "search-acm", "sigmod", "--year", "2023"]).unwrap();
        assert!(matches!(cli.command, Commands::SearchAcm(ref a) if a.year == Some(2023)));
    }
}
