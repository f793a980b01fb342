use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inquire::{Confirm, Password, Select, Text};
use scholar_core::config::{CheckStatus, LlmProvider, ScholarConfig, CONFIG_KEYS};

use crate::ui;

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Interactive setup of email, LLM provider, database and download directory
    Init(InitArgs),
    /// Show the effective configuration (secrets masked)
    Show,
    /// Get a config value by dot-notation key
    Get(GetArgs),
    /// Set a config value by dot-notation key
    Set(SetArgs),
    /// Check that everything needed is configured
    Check,
    /// Show config file path
    Path,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config without asking
    #[arg(long, short)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Dot-notation key (e.g. "llm.provider")
    pub key: String,
}

#[derive(Parser, Debug)]
pub struct SetArgs {
    /// Dot-notation key (e.g. "openalex.email")
    pub key: String,
    /// New value; an empty string unsets optional values
    pub value: String,
}

pub fn run_config(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Init(args) => run_init(args),
        ConfigCommands::Show => run_show(),
        ConfigCommands::Get(args) => run_get(args),
        ConfigCommands::Set(args) => run_set(args),
        ConfigCommands::Check => run_check(),
        ConfigCommands::Path => run_path(),
    }
}

fn run_init(args: InitArgs) -> Result<()> {
    let config_path = ScholarConfig::config_path();

    if !ui::is_interactive() {
        anyhow::bail!(
            "acm config init needs a terminal\n\nUse `acm config set <key> <value>` instead (keys: {})",
            CONFIG_KEYS.join(", ")
        );
    }

    if config_path.exists() && !args.force {
        let overwrite = Confirm::new(&format!(
            "Config already exists at {}. Update it?",
            config_path.display()
        ))
        .with_default(true)
        .prompt()
        .context("Failed to read confirmation")?;
        if !overwrite {
            return Ok(());
        }
    }

    let mut config = ScholarConfig::load_file()?;
    println!("\nACM Scholar setup\n");

    let email = Text::new("Email for the OpenAlex polite pool:")
        .with_help_message("Optional, but requests with a contact email are rate limited less")
        .with_default(config.openalex.email.as_deref().unwrap_or_default())
        .prompt()
        .context("Failed to get email")?;
    config.set("openalex.email", &email)?;

    let provider = Select::new("LLM provider:", LlmProvider::ALL.to_vec())
        .with_starting_cursor(
            LlmProvider::ALL
                .iter()
                .position(|p| *p == config.llm.provider())
                .unwrap_or(0),
        )
        .prompt()
        .context("Failed to get provider")?;
    config.llm.provider = Some(provider);

    if provider.requires_api_key() {
        let key = Password::new(&format!("{} API key:", provider))
            .without_confirmation()
            .with_help_message("Leave empty to keep the current key")
            .prompt()
            .context("Failed to get API key")?;
        if !key.trim().is_empty() {
            config.set("llm.api_key", &key)?;
        }
    }

    let model = Text::new("Model:")
        .with_default(&config.llm.effective_model())
        .prompt()
        .context("Failed to get model")?;
    config.set("llm.model", &model)?;

    let use_db = Confirm::new("Index papers into SurrealDB?")
        .with_default(config.database.is_configured())
        .with_help_message("Without a database, indexed chunks live in memory for one command")
        .prompt()
        .context("Failed to get database preference")?;
    if use_db {
        let url = Text::new("SurrealDB URL:")
            .with_default(
                config
                    .database
                    .url
                    .as_deref()
                    .unwrap_or("ws://localhost:8000/rpc"),
            )
            .prompt()
            .context("Failed to get database URL")?;
        config.set("database.url", &url)?;

        let user = Text::new("SurrealDB user:")
            .with_default(config.database.user.as_deref().unwrap_or("root"))
            .prompt()
            .context("Failed to get database user")?;
        config.set("database.user", &user)?;

        let password = Password::new("SurrealDB password:")
            .without_confirmation()
            .with_help_message("Leave empty to keep the current password")
            .prompt()
            .context("Failed to get database password")?;
        if !password.trim().is_empty() {
            config.set("database.password", &password)?;
        }
    }

    let dir = Text::new("Download directory:")
        .with_default(&config.download_dir_path().display().to_string())
        .prompt()
        .context("Failed to get download directory")?;
    config.set("download.directory", &dir)?;

    let saved = config.save()?;
    println!("\n✅ Created config at {}", saved.display());
    println!("\nNext: acm config check");
    Ok(())
}

fn run_show() -> Result<()> {
    let config = ScholarConfig::load_or_default()?;
    println!("Config: {}\n", ScholarConfig::config_path().display());
    for (name, value) in config.display_rows() {
        println!("  {:<22} {}", name, value);
    }
    Ok(())
}

fn run_get(args: GetArgs) -> Result<()> {
    let config = ScholarConfig::load_or_default()?;
    println!("{}", config.get(&args.key)?);
    Ok(())
}

fn run_set(args: SetArgs) -> Result<()> {
    // Write back only what is in the file, not values injected from the environment
    let mut config = ScholarConfig::load_file()?;
    config.set(&args.key, &args.value)?;
    let path = config.save()?;
    println!("✓ {} updated in {}", args.key, path.display());
    Ok(())
}

fn run_check() -> Result<()> {
    let config = ScholarConfig::load_or_default()?;
    let rows = config.check();

    for row in &rows {
        let mark = match row.status {
            CheckStatus::Ok => "✓",
            CheckStatus::Warn => "⚠",
            CheckStatus::Missing => "✗",
        };
        println!("{} {:<20} {}", mark, row.item, row.detail);
    }

    if rows.iter().any(|r| r.status == CheckStatus::Missing) {
        println!("\nRun: acm config init");
    }
    Ok(())
}

fn run_path() -> Result<()> {
    println!("{}", ScholarConfig::config_path().display());
    Ok(())
}
