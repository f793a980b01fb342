//! `acm chat`: questions and summaries over one paper or the whole library

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inquire::{InquireError, Text};
use scholar_chat::{ChatEngine, ChatMode, SourceRef, SummaryLength};
use scholar_core::config::ScholarConfig;
use scholar_index::{open_indexer, Indexer, PaperRecord};
use scholar_search::OpenAlexClient;
use serde_json::json;
use tracing::{debug, warn};

use crate::ui;

#[derive(Parser, Debug)]
pub struct ChatArgs {
    #[command(subcommand)]
    pub command: ChatCommands,
}

#[derive(Subcommand, Debug)]
pub enum ChatCommands {
    /// Start a conversation about one paper (or the library with --global)
    Start {
        /// OpenAlex id of the paper
        paper_id: Option<String>,

        /// Ask across the whole library instead
        #[arg(long, short)]
        global: bool,

        /// Model of the configured provider to use
        #[arg(long, short)]
        model: Option<String>,
    },
    /// Conversation in library-wide mode; switch papers with /paper <id>
    Interactive {
        /// Model of the configured provider to use
        #[arg(long, short)]
        model: Option<String>,
    },
    /// Ask a single question
    Ask {
        /// The question
        question: String,

        /// Restrict the answer to this paper
        #[arg(long, short)]
        paper: Option<String>,

        /// Ask across the whole library (default without --paper)
        #[arg(long, short, conflicts_with = "paper")]
        global: bool,

        /// Model of the configured provider to use
        #[arg(long, short)]
        model: Option<String>,

        /// Print the answer and its sources as JSON
        #[arg(long)]
        json: bool,
    },
    /// Summarise a paper
    Summarize {
        /// OpenAlex id of the paper
        paper_id: String,

        /// short, medium or long
        #[arg(long, short, default_value = "medium")]
        length: SummaryLength,

        /// Model of the configured provider to use
        #[arg(long, short)]
        model: Option<String>,
    },
}

pub async fn run_chat(args: ChatArgs) -> Result<()> {
    let config = load_chat_config()?;

    match args.command {
        ChatCommands::Start {
            paper_id,
            global,
            model,
        } => {
            let mut engine = build_engine(&config, model.as_deref()).await?;
            match (paper_id, global) {
                (_, true) => engine.set_mode(ChatMode::Global),
                (Some(id), false) => engine.load_paper(&id)?,
                (None, false) => anyhow::bail!("Give a paper id, or use --global to ask across the library"),
            }
            repl(&mut engine).await
        }
        ChatCommands::Interactive { model } => {
            let mut engine = build_engine(&config, model.as_deref()).await?;
            engine.set_mode(ChatMode::Global);
            repl(&mut engine).await
        }
        ChatCommands::Ask {
            question,
            paper,
            global: _,
            model,
            json,
        } => run_ask(&config, &question, paper.as_deref(), model.as_deref(), json).await,
        ChatCommands::Summarize {
            paper_id,
            length,
            model,
        } => run_summarize(&config, &paper_id, length, model.as_deref()).await,
    }
}

fn load_chat_config() -> Result<ScholarConfig> {
    let config = ScholarConfig::load()?;
    if !config.llm.has_credentials() {
        anyhow::bail!(
            "No API key configured for {}\n\nRun: acm config init",
            config.llm.provider()
        );
    }
    Ok(config)
}

async fn build_engine(config: &ScholarConfig, model: Option<&str>) -> Result<ChatEngine> {
    let indexer = open_indexer(config).await;
    let mut engine = ChatEngine::from_config(config, Some(indexer))?;
    if let Some(model) = model {
        engine.set_model(model)?;
    }
    Ok(engine)
}

async fn run_ask(
    config: &ScholarConfig,
    question: &str,
    paper: Option<&str>,
    model: Option<&str>,
    as_json: bool,
) -> Result<()> {
    let mut engine = build_engine(config, model).await?;
    match paper {
        Some(id) => engine.load_paper(id)?,
        None => engine.set_mode(ChatMode::Global),
    }

    let answer = ui::with_spinner_async("Thinking...", "Answered", engine.chat(question)).await;
    let sources = engine.last_sources().to_vec();
    engine.clear_context()?;
    let answer = answer?;

    if as_json {
        let out = json!({
            "question": question,
            "paper_id": paper,
            "model": engine.model_name(),
            "answer": answer,
            "sources": sources,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("\n{}\n", answer);
        print_sources(&sources);
    }
    Ok(())
}

/// Make sure the store knows the paper's title and abstract before summarising
async fn ensure_paper_record(config: &ScholarConfig, indexer: &Indexer, paper_id: &str) -> Result<()> {
    if indexer.store().get_paper(paper_id).await?.is_some() {
        return Ok(());
    }
    let client = OpenAlexClient::from_config(config)?;
    match client.get_work(paper_id).await {
        Ok(Some(work)) => {
            indexer
                .store()
                .upsert_paper(&PaperRecord::from_work(&work, None))
                .await?;
        }
        Ok(None) => warn!("{} not found on OpenAlex; summarising without metadata", paper_id),
        Err(e) => warn!("OpenAlex lookup failed: {:#}", e),
    }
    Ok(())
}

async fn run_summarize(
    config: &ScholarConfig,
    paper_id: &str,
    length: SummaryLength,
    model: Option<&str>,
) -> Result<()> {
    let indexer = open_indexer(config).await;
    ensure_paper_record(config, &indexer, paper_id).await?;

    let mut engine = ChatEngine::from_config(config, Some(indexer))?;
    if let Some(model) = model {
        engine.set_model(model)?;
    }
    engine.load_paper(paper_id)?;

    let summary = ui::with_spinner_async(
        format!("Summarising {} ({})...", paper_id, length),
        "Summary saved to the knowledge base",
        engine.summarize(length),
    )
    .await;
    engine.clear_context()?;
    println!("\n{}", summary?);
    Ok(())
}

fn print_sources(sources: &[SourceRef]) {
    if sources.is_empty() {
        println!("(no indexed excerpts were used)");
        return;
    }
    println!("Sources:");
    for source in sources {
        println!("  {}", source);
    }
}

fn print_help() {
    println!("Commands:");
    println!("  /paper <id>      focus on one paper");
    println!("  /global          ask across the whole library");
    println!("  /model <name>    switch model");
    println!("  /summary [len]   summarise the loaded paper (short, medium, long)");
    println!("  /source          show the excerpts behind the last answer");
    println!("  /reset           forget the conversation and the loaded paper");
    println!("  /clear           clear the screen");
    println!("  /exit            leave (also /quit, /q, Ctrl+C)");
}

fn prompt_label(engine: &ChatEngine) -> String {
    match (engine.mode(), engine.current_paper()) {
        (ChatMode::Paper, Some(id)) => format!("[{}] you>", id),
        _ => "[library] you>".to_string(),
    }
}

/// What a line typed at the chat prompt asks for
#[derive(Debug, PartialEq, Eq)]
enum ReplCommand<'a> {
    Exit,
    Help,
    Clear,
    Reset,
    Sources,
    Global,
    Paper(&'a str),
    Model(&'a str),
    Summary(&'a str),
    Unknown(&'a str),
    Question(&'a str),
}

fn parse_line(line: &str) -> Option<ReplCommand<'_>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(ReplCommand::Question(line));
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    Some(match name {
        "exit" | "quit" | "q" => ReplCommand::Exit,
        "help" | "?" => ReplCommand::Help,
        "clear" => ReplCommand::Clear,
        "reset" => ReplCommand::Reset,
        "source" | "sources" => ReplCommand::Sources,
        "global" => ReplCommand::Global,
        "paper" => ReplCommand::Paper(arg),
        "model" => ReplCommand::Model(arg),
        "summary" | "summarize" => ReplCommand::Summary(arg),
        _ => ReplCommand::Unknown(line),
    })
}

async fn repl(engine: &mut ChatEngine) -> Result<()> {
    if !ui::is_interactive() {
        anyhow::bail!("Chat needs a terminal\n\nFor scripts use: acm chat ask \"<question>\"");
    }

    println!("Chatting with {} - /help for commands\n", engine.model_name());

    loop {
        let line = match Text::new(&prompt_label(engine)).prompt() {
            Ok(line) => line,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(e) => return Err(e).context("Failed to read input"),
        };
        let Some(command) = parse_line(&line) else {
            continue;
        };

        match command {
            ReplCommand::Exit => break,
            ReplCommand::Help => print_help(),
            ReplCommand::Clear => print!("\x1B[2J\x1B[1;1H"),
            ReplCommand::Reset => {
                engine.clear_context()?;
                engine.set_mode(ChatMode::Global);
                println!("Conversation reset (library mode)");
            }
            ReplCommand::Sources => print_sources(engine.last_sources()),
            ReplCommand::Global => {
                engine.set_mode(ChatMode::Global);
                println!("Asking across the whole library");
            }
            ReplCommand::Paper("") => println!("Usage: /paper <id>"),
            ReplCommand::Paper(id) => match engine.load_paper(id) {
                Ok(()) => println!("Loaded {}", id),
                Err(e) => println!("✗ {}", e),
            },
            ReplCommand::Model("") => println!("Current model: {}", engine.model_name()),
            ReplCommand::Model(name) => match engine.set_model(name) {
                Ok(()) => println!("Switched to {}", engine.model_name()),
                Err(e) => println!("✗ {}", e),
            },
            ReplCommand::Summary(arg) => {
                let length = if arg.is_empty() {
                    Ok(SummaryLength::default())
                } else {
                    arg.parse::<SummaryLength>()
                };
                match length {
                    Ok(length) => match engine.summarize(length).await {
                        Ok(summary) => println!("\n{}\n", summary),
                        Err(e) => println!("✗ {}", e),
                    },
                    Err(e) => println!("✗ {}", e),
                }
            }
            ReplCommand::Unknown(line) => println!("Unknown command {} (/help)", line),
            ReplCommand::Question(question) => {
                debug!(concepts = ?ChatEngine::extract_concepts(question), "question");
                let pb = ui::spinner("Thinking...");
                let result = engine.chat(question).await;
                ui::clear(pb);
                match result {
                    Ok(answer) => println!("\n{}\n", answer),
                    Err(e) => println!("✗ {}", e),
                }
            }
        }
    }

    engine.clear_context()?;
    println!("Bye.");
    Ok(())
}
