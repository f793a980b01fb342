//! `acm deploy`: environment templates and checks for the hosted services
//!
//! The database, backend and frontend are configured separately; `check`
//! compares their env files offline and `probe` hits a running backend.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use reqwest::header::{ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN};
use scholar_core::config::ScholarConfig;
use scholar_core::deploy::{
    check_cors, check_database_link, check_frontend_link, normalize_url, passes, process_env,
    read_env_file, template, BackendEnv, DatabaseEnv, DeployService, EnvMap, Finding, FrontendEnv,
    Severity,
};
use serde_json::Value;

const PROBE_QUERY: &str = "deep learning";
const PROBE_LIMIT: u32 = 3;

#[derive(Parser, Debug)]
pub struct DeployArgs {
    #[command(subcommand)]
    pub command: DeployCommands,
}

#[derive(Subcommand, Debug)]
pub enum DeployCommands {
    /// Print the annotated environment template for a service
    Env {
        #[arg(value_enum)]
        service: ServiceArg,
    },
    /// Check that the services' variables agree with each other
    Check(CheckArgs),
    /// Call a running backend's health and search endpoints
    Probe(ProbeArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ServiceArg {
    Database,
    Backend,
    Frontend,
}

impl From<ServiceArg> for DeployService {
    fn from(arg: ServiceArg) -> Self {
        match arg {
            ServiceArg::Database => DeployService::Database,
            ServiceArg::Backend => DeployService::Backend,
            ServiceArg::Frontend => DeployService::Frontend,
        }
    }
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Database service env file
    #[arg(long, value_name = "FILE")]
    pub database_env: Option<PathBuf>,

    /// Backend service env file (default: this process's environment)
    #[arg(long, value_name = "FILE")]
    pub backend_env: Option<PathBuf>,

    /// Frontend service env file
    #[arg(long, value_name = "FILE")]
    pub frontend_env: Option<PathBuf>,

    /// Public address of the backend (default: server.public_url)
    #[arg(long, value_name = "URL")]
    pub backend_public_url: Option<String>,

    /// Browser origin of the frontend, checked against CORS_ORIGINS
    #[arg(long, value_name = "URL")]
    pub frontend_origin: Option<String>,
}

#[derive(Parser, Debug)]
pub struct ProbeArgs {
    /// Backend base address, e.g. https://backend.up.railway.app
    pub base_url: String,

    /// Also send a CORS request from this origin
    #[arg(long, value_name = "URL")]
    pub origin: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "15")]
    pub timeout: u64,
}

pub async fn run_deploy(args: DeployArgs) -> Result<()> {
    match args.command {
        DeployCommands::Env { service } => {
            print!("{}", template(service.into()));
            Ok(())
        }
        DeployCommands::Check(args) => run_check(args),
        DeployCommands::Probe(args) => run_probe(args).await,
    }
}

fn load_vars(path: Option<&Path>) -> Result<EnvMap> {
    match path {
        Some(path) => read_env_file(path).with_context(|| format!("Failed to read {}", path.display())),
        None => Ok(process_env()),
    }
}

fn print_findings(title: &str, findings: &[Finding]) {
    println!("{}", title);
    for finding in findings {
        let mark = match finding.severity {
            Severity::Ok => "✓",
            Severity::Warn => "⚠",
            Severity::Error => "✗",
        };
        println!("  {} {}", mark, finding.message);
    }
}

/// Every finding produced for the given service files
pub fn collect_findings(args: &CheckArgs, public_url: Option<&str>) -> Result<Vec<(&'static str, Vec<Finding>)>> {
    let backend = BackendEnv::from_vars(&load_vars(args.backend_env.as_deref())?);
    let mut sections = Vec::new();

    if let Some(path) = &args.database_env {
        let db = DatabaseEnv::from_vars(&load_vars(Some(path))?);
        sections.push(("Backend -> database", check_database_link(&db, &backend)));
    }

    if let Some(path) = &args.frontend_env {
        let frontend = FrontendEnv::from_vars(&load_vars(Some(path))?);
        let public_url = args
            .backend_public_url
            .as_deref()
            .or(public_url)
            .context("--backend-public-url is required to check the frontend link")?;
        sections.push(("Frontend -> backend", check_frontend_link(&frontend, public_url)));
    }

    if let Some(origin) = &args.frontend_origin {
        sections.push(("CORS", vec![check_cors(&backend, origin)]));
    }

    Ok(sections)
}

fn run_check(args: CheckArgs) -> Result<()> {
    let config = ScholarConfig::load_or_default()?;
    let sections = collect_findings(&args, config.server.public_url.as_deref())?;
    if sections.is_empty() {
        anyhow::bail!("Nothing to check\n\nPass --database-env, --frontend-env and/or --frontend-origin");
    }

    let mut ok = true;
    for (title, findings) in &sections {
        print_findings(title, findings);
        ok &= passes(findings);
    }

    if !ok {
        anyhow::bail!("Deployment check failed");
    }
    println!("\n✓ All checks passed");
    Ok(())
}

/// Outcome of one request made by `acm deploy probe`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub check: String,
    pub ok: bool,
    pub detail: String,
}

impl ProbeResult {
    fn new(check: impl Into<String>, ok: bool, detail: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            ok,
            detail: detail.into(),
        }
    }
}

/// Health, search and (optionally) CORS checks against a running backend
pub async fn probe(base_url: &str, origin: Option<&str>, timeout: Duration) -> Result<Vec<ProbeResult>> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let base = normalize_url(base_url);
    let mut results = Vec::new();

    let health_url = format!("{}/api/health", base);
    results.push(match client.get(&health_url).send().await {
        Ok(resp) if resp.status().is_success() => {
            let body: Value = resp.json().await.unwrap_or(Value::Null);
            let db = body["database"]["connected"].as_bool().unwrap_or(false);
            ProbeResult::new(
                "GET /api/health",
                body["status"] == "ok",
                format!("status={} database connected={}", body["status"], db),
            )
        }
        Ok(resp) => ProbeResult::new("GET /api/health", false, format!("HTTP {}", resp.status())),
        Err(e) => ProbeResult::new("GET /api/health", false, e.to_string()),
    });

    let search_url = format!("{}/api/agent/acm/search", base);
    let limit = PROBE_LIMIT.to_string();
    let search_check = format!("GET /api/agent/acm/search?query={}&limit={}", PROBE_QUERY.replace(' ', "+"), PROBE_LIMIT);
    results.push(
        match client
            .get(&search_url)
            .query(&[("query", PROBE_QUERY), ("limit", limit.as_str())])
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                let body: Value = resp.json().await.unwrap_or(Value::Null);
                match body["results"].as_array() {
                    Some(items) => ProbeResult::new(search_check, true, format!("{} results", items.len())),
                    None => ProbeResult::new(search_check, false, "response has no results array"),
                }
            }
            Ok(resp) => ProbeResult::new(search_check, false, format!("HTTP {}", resp.status())),
            Err(e) => ProbeResult::new(search_check, false, e.to_string()),
        },
    );

    if let Some(origin) = origin {
        let check = format!("CORS from {}", origin);
        results.push(match client.get(&health_url).header(ORIGIN, origin).send().await {
            Ok(resp) => {
                let allowed = resp
                    .headers()
                    .get(ACCESS_CONTROL_ALLOW_ORIGIN)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                match allowed {
                    Some(value) if value == "*" || normalize_url(&value) == normalize_url(origin) => {
                        ProbeResult::new(check, true, format!("allowed ({})", value))
                    }
                    Some(value) => ProbeResult::new(check, false, format!("allowed origin is {}", value)),
                    None => ProbeResult::new(check, false, "origin not allowed; add it to CORS_ORIGINS"),
                }
            }
            Err(e) => ProbeResult::new(check, false, e.to_string()),
        });
    }

    Ok(results)
}

async fn run_probe(args: ProbeArgs) -> Result<()> {
    let results = probe(
        &args.base_url,
        args.origin.as_deref(),
        Duration::from_secs(args.timeout),
    )
    .await?;

    println!("Probing {}", normalize_url(&args.base_url));
    for result in &results {
        let mark = if result.ok { "✓" } else { "✗" };
        println!("  {} {:<58} {}", mark, result.check, result.detail);
    }

    if results.iter().any(|r| !r.ok) {
        anyhow::bail!("Backend probe failed");
    }
    Ok(())
}
