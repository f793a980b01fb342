//! Configuration for the ACM Scholar toolchain
//!
//! One TOML file (`~/.acm-scholar/config.toml`, or `ACM_CONFIG_PATH`) layered
//! with `.env` files and deployment environment variables. The backend
//! service is normally configured by environment alone, so every value here
//! has a usable default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Directory name under $HOME holding config, history and usage data
pub const APP_DIR_NAME: &str = ".acm-scholar";

pub const DEFAULT_OPENALEX_URL: &str = "https://api.openalex.org";
pub const DEFAULT_DOWNLOAD_DIR: &str = "~/acm-papers/";
pub const DEFAULT_NAMESPACE: &str = "acm_scholar";
pub const DEFAULT_DATABASE: &str = "papers";
pub const DEFAULT_API_HOST: &str = "0.0.0.0";
pub const DEFAULT_API_PORT: u16 = 5055;

/// Keys accepted by `acm config get` / `acm config set`
pub const CONFIG_KEYS: &[&str] = &[
    "openalex.email",
    "openalex.base_url",
    "llm.provider",
    "llm.api_key",
    "llm.model",
    "llm.base_url",
    "database.url",
    "database.user",
    "database.password",
    "database.namespace",
    "database.database",
    "download.directory",
    "server.host",
    "server.port",
    "server.reload",
    "server.cors_origins",
    "server.public_url",
];

/// Application home: `ACM_HOME` or `~/.acm-scholar`
pub fn app_dir() -> PathBuf {
    if let Ok(dir) = env::var("ACM_HOME") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Load environment variables from .env files
///
/// Current directory first, then `~/.acm-scholar/.env`. dotenvy never
/// overwrites variables that are already set.
pub fn load_dotenv() {
    let mut loaded_from = Vec::new();

    if let Ok(path) = dotenvy::dotenv() {
        loaded_from.push(path.display().to_string());
    }

    let env_file = app_dir().join(".env");
    if env_file.exists() {
        match dotenvy::from_path(&env_file) {
            Ok(_) => loaded_from.push(env_file.display().to_string()),
            Err(e) => debug!("Failed to load {}: {}", env_file.display(), e),
        }
    }

    if loaded_from.is_empty() {
        debug!("No .env files found");
    } else {
        debug!("Loaded .env from: {}", loaded_from.join(", "));
    }
}

/// Expand `~/` to the home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "deepseek")]
    DeepSeek,
    Ollama,
}

impl LlmProvider {
    pub const ALL: [LlmProvider; 4] = [
        LlmProvider::Gemini,
        LlmProvider::OpenAi,
        LlmProvider::DeepSeek,
        LlmProvider::Ollama,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini",
            LlmProvider::OpenAi => "openai",
            LlmProvider::DeepSeek => "deepseek",
            LlmProvider::Ollama => "ollama",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini-1.5-pro",
            LlmProvider::OpenAi => "gpt-4",
            LlmProvider::DeepSeek => "deepseek-chat",
            LlmProvider::Ollama => "llama2",
        }
    }

    /// Ollama runs locally and needs no key
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, LlmProvider::Ollama)
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(LlmProvider::Gemini),
            "openai" => Ok(LlmProvider::OpenAi),
            "deepseek" => Ok(LlmProvider::DeepSeek),
            "ollama" => Ok(LlmProvider::Ollama),
            other => anyhow::bail!(
                "Unknown LLM provider '{}' (expected gemini, openai, deepseek or ollama)",
                other
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenAlexConfig {
    /// Contact email for the OpenAlex polite pool
    pub email: Option<String>,
    pub base_url: Option<String>,
}

impl OpenAlexConfig {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(DEFAULT_OPENALEX_URL)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: Option<LlmProvider>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// Override for OpenAI-compatible endpoints (self-hosted gateways, Ollama on another host)
    pub base_url: Option<String>,
}

impl LlmConfig {
    /// Configured provider, Gemini when unset
    pub fn provider(&self) -> LlmProvider {
        self.provider.unwrap_or(LlmProvider::Gemini)
    }

    pub fn effective_model(&self) -> String {
        self.model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.provider().default_model().to_string())
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// Whether chat / answering can be enabled
    pub fn has_credentials(&self) -> bool {
        self.api_key().is_some() || !self.provider().requires_api_key()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Websocket RPC address, e.g. `ws://surrealdb.railway.internal:8000/rpc`
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub namespace: Option<String>,
    pub database: Option<String>,
}

impl DatabaseConfig {
    pub fn is_configured(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    pub fn database(&self) -> &str {
        self.database.as_deref().unwrap_or(DEFAULT_DATABASE)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadConfig {
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    #[serde(default)]
    pub reload: bool,
    /// Origins allowed to call the API from a browser; `*` allows all
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Address the frontend uses to reach this backend
    pub public_url: Option<String>,
}

impl ServerSettings {
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_API_HOST)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_API_PORT)
    }
}

/// Centralized configuration for the acm toolchain
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScholarConfig {
    #[serde(default)]
    pub openalex: OpenAlexConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub server: ServerSettings,
}

/// Outcome of a single `config check` item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    Warn,
    Missing,
}

#[derive(Debug, Clone)]
pub struct CheckRow {
    pub item: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

impl ScholarConfig {
    /// Config file path: `ACM_CONFIG_PATH` or `~/.acm-scholar/config.toml`
    pub fn config_path() -> PathBuf {
        match env::var("ACM_CONFIG_PATH") {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => app_dir().join("config.toml"),
        }
    }

    /// Load config, failing with an actionable error when it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            anyhow::bail!(
                "Config not found at {:?}\n\nRun: acm config init",
                config_path
            );
        }

        let mut config = Self::read_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load config if present, defaults otherwise (env overrides applied either way)
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::config_path();
        let mut config = if config_path.exists() {
            Self::read_from(&config_path)?
        } else {
            debug!("No config at {:?}, using defaults", config_path);
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load the file as written, without environment overrides
    pub fn load_file() -> Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            Self::read_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {:?}", path))?;
        let mut config: Self =
            toml::from_str(&content).context("Failed to parse config file (invalid TOML)")?;
        config.expand_variables(|name| env::var(name).ok());
        Ok(config)
    }

    /// Save config to `config_path()`
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_path();
        self.save_to(&config_path)?;
        info!("Saved config to {}", config_path.display());
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(path, toml_str).context(format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable source
    ///
    /// Deployment variables (SURREAL_*, API_*, CORS_ORIGINS) win over the
    /// file. Provider keys only fill an empty `llm.api_key`.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(email) = get("OPENALEX_EMAIL") {
            self.openalex.email = Some(email);
        }
        if let Some(url) = get("OPENALEX_BASE_URL") {
            self.openalex.base_url = Some(url);
        }

        if let Some(provider) = get("LLM_PROVIDER").and_then(|p| p.parse().ok()) {
            self.llm.provider = Some(provider);
        }
        if let Some(model) = get("LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if let Some(key) = get("LLM_API_KEY") {
            self.llm.api_key = Some(key);
        } else if self.llm.api_key().is_none() {
            let provider_keys = [
                ("GEMINI_API_KEY", LlmProvider::Gemini),
                ("OPENAI_API_KEY", LlmProvider::OpenAi),
                ("DEEPSEEK_API_KEY", LlmProvider::DeepSeek),
            ];
            let wanted = self.llm.provider;
            let found = provider_keys.iter().find_map(|(name, provider)| {
                if wanted.is_some_and(|w| w != *provider) {
                    return None;
                }
                get(name).map(|key| (key, *provider))
            });
            if let Some((key, provider)) = found {
                self.llm.api_key = Some(key);
                self.llm.provider.get_or_insert(provider);
            }
        }

        if let Some(url) = get("SURREAL_URL") {
            self.database.url = Some(url);
        }
        if let Some(user) = get("SURREAL_USER") {
            self.database.user = Some(user);
        }
        if let Some(password) = get("SURREAL_PASSWORD") {
            self.database.password = Some(password);
        }
        if let Some(ns) = get("SURREAL_NAMESPACE") {
            self.database.namespace = Some(ns);
        }
        if let Some(db) = get("SURREAL_DATABASE") {
            self.database.database = Some(db);
        }

        if let Some(dir) = get("ACM_DOWNLOAD_DIR") {
            self.download.directory = Some(dir);
        }

        if let Some(host) = get("API_HOST") {
            self.server.host = Some(host);
        }
        if let Some(port) = get("API_PORT")
            .or_else(|| get("PORT"))
            .and_then(|p| p.trim().parse().ok())
        {
            self.server.port = Some(port);
        }
        if let Some(reload) = get("API_RELOAD") {
            self.server.reload = parse_bool(&reload);
        }
        if let Some(origins) = get("CORS_ORIGINS") {
            self.server.cors_origins = split_list(&origins);
        }
        if let Some(url) = get("API_PUBLIC_URL") {
            self.server.public_url = Some(url);
        }
    }

    /// Expand `${VAR}` references in string values
    fn expand_variables<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let expand = |value: &mut Option<String>| {
            if let Some(v) = value.as_mut() {
                *v = expand_string(v, &lookup);
            }
        };

        expand(&mut self.openalex.email);
        expand(&mut self.llm.api_key);
        expand(&mut self.llm.base_url);
        expand(&mut self.database.url);
        expand(&mut self.database.user);
        expand(&mut self.database.password);
        expand(&mut self.download.directory);
        expand(&mut self.server.public_url);
    }

    /// Directory holding downloaded PDFs (created if missing)
    pub fn download_dir(&self) -> Result<PathBuf> {
        let path = self.download_dir_path();
        if !path.exists() {
            fs::create_dir_all(&path)
                .context(format!("Failed to create {}", path.display()))?;
            info!("Created download directory: {}", path.display());
        }
        Ok(path)
    }

    /// Download directory without touching the filesystem
    pub fn download_dir_path(&self) -> PathBuf {
        expand_tilde(
            self.download
                .directory
                .as_deref()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or(DEFAULT_DOWNLOAD_DIR),
        )
    }

    /// Get a config value by dot-notation key
    pub fn get(&self, key: &str) -> Result<String> {
        let value = match key {
            "openalex.email" => self.openalex.email.clone(),
            "openalex.base_url" => Some(self.openalex.base_url().to_string()),
            "llm.provider" => self.llm.provider.map(|p| p.to_string()),
            "llm.api_key" => self.llm.api_key.clone(),
            "llm.model" => self.llm.model.clone(),
            "llm.base_url" => self.llm.base_url.clone(),
            "database.url" => self.database.url.clone(),
            "database.user" => self.database.user.clone(),
            "database.password" => self.database.password.clone(),
            "database.namespace" => Some(self.database.namespace().to_string()),
            "database.database" => Some(self.database.database().to_string()),
            "download.directory" => Some(self.download_dir_path().display().to_string()),
            "server.host" => Some(self.server.host().to_string()),
            "server.port" => Some(self.server.port().to_string()),
            "server.reload" => Some(self.server.reload.to_string()),
            "server.cors_origins" => Some(self.server.cors_origins.join(",")),
            "server.public_url" => self.server.public_url.clone(),
            _ => return Err(unknown_key(key)),
        };
        value.ok_or_else(|| anyhow::anyhow!("{} not set", key))
    }

    /// Set a config value by dot-notation key
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let owned = || Some(value.trim().to_string()).filter(|v| !v.is_empty());
        match key {
            "openalex.email" => self.openalex.email = owned(),
            "openalex.base_url" => self.openalex.base_url = owned(),
            "llm.provider" => self.llm.provider = Some(value.parse()?),
            "llm.api_key" => self.llm.api_key = owned(),
            "llm.model" => self.llm.model = owned(),
            "llm.base_url" => self.llm.base_url = owned(),
            "database.url" => self.database.url = owned(),
            "database.user" => self.database.user = owned(),
            "database.password" => self.database.password = owned(),
            "database.namespace" => self.database.namespace = owned(),
            "database.database" => self.database.database = owned(),
            "download.directory" => self.download.directory = owned(),
            "server.host" => self.server.host = owned(),
            "server.port" => {
                let port: u16 = value
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid port: {}", value))?;
                self.server.port = Some(port);
            }
            "server.reload" => self.server.reload = parse_bool(value),
            "server.cors_origins" => self.server.cors_origins = split_list(value),
            "server.public_url" => self.server.public_url = owned(),
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }

    /// Rows for `acm config show`, secrets masked
    pub fn display_rows(&self) -> Vec<(&'static str, String)> {
        let or_unset = |v: Option<&str>| v.map(str::to_string).unwrap_or_else(|| "not set".into());
        vec![
            ("OpenAlex email", or_unset(self.openalex.email.as_deref())),
            ("OpenAlex URL", self.openalex.base_url().to_string()),
            (
                "LLM provider",
                self.llm
                    .provider
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "not set".into()),
            ),
            ("LLM model", self.llm.effective_model()),
            (
                "LLM API key",
                self.llm.api_key().map(mask_secret).unwrap_or_else(|| "not set".into()),
            ),
            ("Database URL", or_unset(self.database.url.as_deref())),
            ("Database user", or_unset(self.database.user.as_deref())),
            (
                "Database password",
                self.database
                    .password
                    .as_deref()
                    .map(mask_secret)
                    .unwrap_or_else(|| "not set".into()),
            ),
            (
                "Namespace / database",
                format!("{} / {}", self.database.namespace(), self.database.database()),
            ),
            ("Download directory", self.download_dir_path().display().to_string()),
            (
                "API bind",
                format!("{}:{}", self.server.host(), self.server.port()),
            ),
            (
                "CORS origins",
                if self.server.cors_origins.is_empty() {
                    "localhost only".to_string()
                } else {
                    self.server.cors_origins.join(", ")
                },
            ),
        ]
    }

    /// Rows for `acm config check`
    pub fn check(&self) -> Vec<CheckRow> {
        let mut rows = Vec::new();

        rows.push(match self.openalex.email.as_deref() {
            Some(email) if !email.trim().is_empty() => CheckRow {
                item: "OpenAlex email",
                status: CheckStatus::Ok,
                detail: "configured".into(),
            },
            _ => CheckRow {
                item: "OpenAlex email",
                status: CheckStatus::Missing,
                detail: "not configured (requests leave the polite pool)".into(),
            },
        });

        rows.push(if self.llm.has_credentials() {
            CheckRow {
                item: "LLM API key",
                status: CheckStatus::Ok,
                detail: format!("configured ({})", self.llm.provider()),
            }
        } else {
            CheckRow {
                item: "LLM API key",
                status: CheckStatus::Warn,
                detail: "not configured (chat requires a key or a local ollama model)".into(),
            }
        });

        rows.push(if self.database.is_configured() {
            CheckRow {
                item: "SurrealDB",
                status: CheckStatus::Ok,
                detail: format!(
                    "configured ({} {}/{})",
                    self.database.url.as_deref().unwrap_or_default(),
                    self.database.namespace(),
                    self.database.database()
                ),
            }
        } else {
            CheckRow {
                item: "SurrealDB",
                status: CheckStatus::Warn,
                detail: "not configured (in-memory store will be used)".into(),
            }
        });

        let dir = self.download_dir_path();
        rows.push(if dir.exists() {
            CheckRow {
                item: "Download directory",
                status: CheckStatus::Ok,
                detail: format!("exists: {}", dir.display()),
            }
        } else {
            CheckRow {
                item: "Download directory",
                status: CheckStatus::Warn,
                detail: format!("will be created: {}", dir.display()),
            }
        });

        rows
    }
}

fn unknown_key(key: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Unknown config key: {}\nValid keys: {}",
        key,
        CONFIG_KEYS.join(", ")
    )
}

/// Expand `${NAME}` references; unknown variables expand to an empty string
pub fn expand_string<F>(s: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                result.push_str(&lookup(name).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    result.push_str(rest);
    result
}

pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Mask a secret for display, keeping the last four characters
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}
