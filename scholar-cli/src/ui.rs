//! Progress feedback and prompts shared by all commands
//!
//! Spinners and bars are suppressed when:
//! - `--quiet` is passed
//! - `ACM_QUIET=1` is set
//! - stderr is not a TTY (piped output)

use std::io::IsTerminal;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;

static QUIET_MODE: OnceLock<bool> = OnceLock::new();

/// Call once at startup with the --quiet flag value
pub fn init_quiet_mode(quiet_flag: bool) {
    let is_quiet = quiet_flag
        || std::env::var("ACM_QUIET").map(|v| v == "1").unwrap_or(false)
        || !std::io::stderr().is_terminal();

    QUIET_MODE.set(is_quiet).ok();
}

pub fn is_quiet() -> bool {
    *QUIET_MODE.get().unwrap_or(&false)
}

/// Whether prompts can be shown at all
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}

pub fn spinner(msg: impl Into<String>) -> Option<ProgressBar> {
    if is_quiet() {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.into());
    pb.enable_steady_tick(Duration::from_millis(80));
    Some(pb)
}

fn finish_with(pb: Option<ProgressBar>, msg: String) {
    if let Some(pb) = pb {
        if let Ok(style) = ProgressStyle::default_spinner().template("{msg}") {
            pb.set_style(style);
        }
        pb.finish_with_message(msg);
    }
}

pub fn finish_success(pb: Option<ProgressBar>, msg: impl Into<String>) {
    finish_with(pb, format!("✓ {}", msg.into()));
}

pub fn finish_error(pb: Option<ProgressBar>, msg: impl Into<String>) {
    finish_with(pb, format!("✗ {}", msg.into()));
}

pub fn clear(pb: Option<ProgressBar>) {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
}

/// Run a future under a spinner, reporting success or failure on completion
pub async fn with_spinner_async<T, E, F>(
    msg: impl Into<String>,
    success_msg: impl Into<String>,
    fut: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: std::future::Future<Output = Result<T, E>>,
{
    let pb = spinner(msg);
    match fut.await {
        Ok(value) => {
            finish_success(pb, success_msg);
            Ok(value)
        }
        Err(e) => {
            finish_error(pb, e.to_string());
            Err(e)
        }
    }
}

/// Ask for confirmation; `assume_yes` skips the prompt
///
/// Without a terminal the answer is "no" unless `assume_yes` is set.
pub fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    if !is_interactive() {
        return Ok(false);
    }
    Confirm::new(prompt)
        .with_default(false)
        .prompt()
        .context("Failed to read confirmation")
}
