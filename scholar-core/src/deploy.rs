//! Deployment contract for the three hosted services
//!
//! Frontend -> Backend (HTTP) -> Database (websocket RPC). Each service is
//! configured only through environment variables; nothing is discovered at
//! runtime, so every address and credential the deployer copies between
//! services can be checked here before anything is started.

use crate::config::{parse_bool, split_list, DEFAULT_API_HOST, DEFAULT_API_PORT, DEFAULT_DATABASE, DEFAULT_NAMESPACE};
use crate::error::{Result, ScholarError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use url::{Host, Url};

/// Origins allowed when `CORS_ORIGINS` is empty
pub const DEFAULT_LOCAL_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:5055",
    "http://127.0.0.1:5055",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
    Ws,
    Wss,
}

impl Protocol {
    pub fn is_websocket(&self) -> bool {
        matches!(self, Protocol::Ws | Protocol::Wss)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::Ws => "ws",
            Protocol::Wss => "wss",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Reachable only on the provider's private network
    Internal,
    Public,
}

/// One deployed service address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceEndpoint {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub visibility: Visibility,
}

impl ServiceEndpoint {
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let url = Url::parse(trimmed)
            .map_err(|e| ScholarError::invalid_endpoint(trimmed, e.to_string()))?;

        let protocol = match url.scheme() {
            "http" => Protocol::Http,
            "https" => Protocol::Https,
            "ws" => Protocol::Ws,
            "wss" => Protocol::Wss,
            other => {
                return Err(ScholarError::invalid_endpoint(
                    trimmed,
                    format!("unsupported scheme '{}'", other),
                ))
            }
        };

        let (host, visibility) = match url.host() {
            Some(Host::Domain(domain)) => {
                let domain = domain.to_ascii_lowercase();
                let visibility = domain_visibility(&domain);
                (domain, visibility)
            }
            Some(Host::Ipv4(ip)) => (ip.to_string(), ip_visibility(IpAddr::V4(ip))),
            Some(Host::Ipv6(ip)) => (ip.to_string(), ip_visibility(IpAddr::V6(ip))),
            None => return Err(ScholarError::invalid_endpoint(trimmed, "missing host")),
        };

        let port = url
            .port_or_known_default()
            .ok_or_else(|| ScholarError::invalid_endpoint(trimmed, "missing port"))?;

        Ok(Self {
            protocol,
            host,
            port,
            path: url.path().trim_end_matches('/').to_string(),
            visibility,
        })
    }

    /// `scheme://host[:port]`, omitting default ports
    pub fn origin(&self) -> String {
        let default_port = match self.protocol {
            Protocol::Http | Protocol::Ws => 80,
            Protocol::Https | Protocol::Wss => 443,
        };
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == default_port {
            format!("{}://{}", self.protocol.as_str(), host)
        } else {
            format!("{}://{}:{}", self.protocol.as_str(), host, self.port)
        }
    }
}

impl FromStr for ServiceEndpoint {
    type Err = ScholarError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.origin(), self.path)
    }
}

fn domain_visibility(domain: &str) -> Visibility {
    let single_label = !domain.contains('.');
    if domain == "localhost" || domain.ends_with(".internal") || single_label {
        Visibility::Internal
    } else {
        Visibility::Public
    }
}

fn ip_visibility(ip: IpAddr) -> Visibility {
    let internal = match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00,
    };
    if internal {
        Visibility::Internal
    } else {
        Visibility::Public
    }
}

/// Trim whitespace and trailing slashes so equal addresses compare equal
pub fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Username/password the backend uses against the database
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .finish()
    }
}

/// Variable source: process environment, dotenv file, or a literal map
pub type EnvMap = BTreeMap<String, String>;

pub fn process_env() -> EnvMap {
    std::env::vars().collect()
}

/// Read a dotenv-style file without touching the process environment
pub fn read_env_file(path: &Path) -> Result<EnvMap> {
    if !path.exists() {
        return Err(ScholarError::path_not_found(path));
    }
    let iter = dotenvy::from_path_iter(path).map_err(|e| ScholarError::config(e.to_string()))?;
    let mut vars = EnvMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| ScholarError::config(e.to_string()))?;
        vars.insert(key, value);
    }
    Ok(vars)
}

fn var(vars: &EnvMap, key: &str) -> Option<String> {
    vars.get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Database service: `SURREAL_USER`, `SURREAL_PASS`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseEnv {
    pub credentials: Credentials,
}

impl DatabaseEnv {
    pub fn from_vars(vars: &EnvMap) -> Self {
        Self {
            credentials: Credentials {
                user: var(vars, "SURREAL_USER"),
                password: var(vars, "SURREAL_PASS"),
            },
        }
    }
}

/// Backend service variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendEnv {
    pub host: String,
    pub port: u16,
    pub reload: bool,
    pub database_url: Option<String>,
    pub credentials: Credentials,
    pub namespace: String,
    pub database: String,
    pub llm_api_key: Option<String>,
    pub cors_origins: Vec<String>,
}

impl Default for BackendEnv {
    fn default() -> Self {
        Self {
            host: DEFAULT_API_HOST.to_string(),
            port: DEFAULT_API_PORT,
            reload: false,
            database_url: None,
            credentials: Credentials::default(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            llm_api_key: None,
            cors_origins: Vec::new(),
        }
    }
}

impl BackendEnv {
    pub fn from_vars(vars: &EnvMap) -> Self {
        let defaults = Self::default();
        Self {
            host: var(vars, "API_HOST").unwrap_or(defaults.host),
            port: var(vars, "API_PORT")
                .or_else(|| var(vars, "PORT"))
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            reload: var(vars, "API_RELOAD").is_some_and(|v| parse_bool(&v)),
            database_url: var(vars, "SURREAL_URL"),
            credentials: Credentials {
                user: var(vars, "SURREAL_USER"),
                password: var(vars, "SURREAL_PASSWORD"),
            },
            namespace: var(vars, "SURREAL_NAMESPACE").unwrap_or(defaults.namespace),
            database: var(vars, "SURREAL_DATABASE").unwrap_or(defaults.database),
            llm_api_key: var(vars, "GEMINI_API_KEY"),
            cors_origins: var(vars, "CORS_ORIGINS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
        }
    }

    /// Origins the backend will accept, after applying the localhost default
    pub fn effective_origins(&self) -> Vec<String> {
        if self.cors_origins.is_empty() {
            DEFAULT_LOCAL_ORIGINS.iter().map(|s| s.to_string()).collect()
        } else {
            self.cors_origins.clone()
        }
    }
}

/// Frontend service: `API_URL`, `NEXT_PUBLIC_API_URL`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontendEnv {
    pub api_url: Option<String>,
    pub public_api_url: Option<String>,
}

impl FrontendEnv {
    pub fn from_vars(vars: &EnvMap) -> Self {
        Self {
            api_url: var(vars, "API_URL"),
            public_api_url: var(vars, "NEXT_PUBLIC_API_URL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
}

impl Finding {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Ok,
            message: message.into(),
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warn,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

/// True when no finding is an error
pub fn passes(findings: &[Finding]) -> bool {
    findings.iter().all(|f| f.severity != Severity::Error)
}

/// Backend -> database: address shape and credential agreement
pub fn check_database_link(db: &DatabaseEnv, backend: &BackendEnv) -> Vec<Finding> {
    let mut findings = Vec::new();

    match backend.database_url.as_deref() {
        None => findings.push(Finding::error("SURREAL_URL is not set on the backend")),
        Some(url) => match ServiceEndpoint::parse(url) {
            Err(e) => findings.push(Finding::error(format!("SURREAL_URL: {}", e))),
            Ok(endpoint) if !endpoint.protocol.is_websocket() => findings.push(Finding::error(
                format!("SURREAL_URL must use ws:// or wss://, got {}://", endpoint.protocol.as_str()),
            )),
            Ok(endpoint) => {
                if endpoint.visibility == Visibility::Public {
                    findings.push(Finding::warn(format!(
                        "SURREAL_URL points at public host {}; use the private network address",
                        endpoint.host
                    )));
                }
                findings.push(Finding::ok(format!("database endpoint {}", endpoint)));
            }
        },
    }

    let provisioned = &db.credentials;
    let configured = &backend.credentials;

    match (&provisioned.user, &configured.user) {
        (None, _) => findings.push(Finding::error("SURREAL_USER is not set on the database")),
        (_, None) => findings.push(Finding::error("SURREAL_USER is not set on the backend")),
        (Some(a), Some(b)) if a != b => findings.push(Finding::error(format!(
            "SURREAL_USER mismatch: database has '{}', backend has '{}'",
            a, b
        ))),
        _ => findings.push(Finding::ok("SURREAL_USER matches")),
    }

    match (&provisioned.password, &configured.password) {
        (None, _) => findings.push(Finding::error("SURREAL_PASS is not set on the database")),
        (_, None) => findings.push(Finding::error("SURREAL_PASSWORD is not set on the backend")),
        (Some(a), Some(b)) if a != b => findings.push(Finding::error(
            "SURREAL_PASSWORD on the backend does not match SURREAL_PASS on the database",
        )),
        _ => findings.push(Finding::ok("database password matches")),
    }

    findings
}

/// Frontend -> backend: both API URLs must equal the backend's public address
pub fn check_frontend_link(frontend: &FrontendEnv, backend_public_url: &str) -> Vec<Finding> {
    let mut findings = Vec::new();

    let expected = normalize_url(backend_public_url);
    match ServiceEndpoint::parse(&expected) {
        Ok(endpoint) if endpoint.protocol.is_websocket() => {
            findings.push(Finding::error("backend public URL must be http:// or https://"));
        }
        Ok(endpoint) if endpoint.visibility == Visibility::Internal => {
            findings.push(Finding::warn(format!(
                "backend URL {} is not reachable from browsers",
                expected
            )));
        }
        Ok(_) => {}
        Err(e) => {
            findings.push(Finding::error(format!("backend public URL: {}", e)));
            return findings;
        }
    }

    for (key, value) in [
        ("API_URL", &frontend.api_url),
        ("NEXT_PUBLIC_API_URL", &frontend.public_api_url),
    ] {
        match value {
            None => findings.push(Finding::error(format!("{} is not set on the frontend", key))),
            Some(v) if normalize_url(v) != expected => findings.push(Finding::error(format!(
                "{} is '{}' but the backend is at '{}'",
                key, v, expected
            ))),
            Some(_) => findings.push(Finding::ok(format!("{} matches backend", key))),
        }
    }

    findings
}

/// Whether a browser on `frontend_origin` may call the backend
pub fn check_cors(backend: &BackendEnv, frontend_origin: &str) -> Finding {
    let origin = normalize_url(frontend_origin);
    let allowed = backend.effective_origins();

    if allowed.iter().any(|o| o == "*") {
        return Finding::warn("CORS_ORIGINS is '*': every origin is allowed");
    }
    if allowed.iter().any(|o| normalize_url(o) == origin) {
        return Finding::ok(format!("CORS allows {}", origin));
    }
    Finding::error(format!(
        "CORS_ORIGINS does not include {}; add it to the backend's CORS_ORIGINS",
        origin
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployService {
    Database,
    Backend,
    Frontend,
}

/// Annotated environment template for one service
pub fn template(service: DeployService) -> &'static str {
    match service {
        DeployService::Database => DATABASE_TEMPLATE,
        DeployService::Backend => BACKEND_TEMPLATE,
        DeployService::Frontend => FRONTEND_TEMPLATE,
    }
}

const DATABASE_TEMPLATE: &str = "\
# Database service (SurrealDB)
# Root credentials; copy both values to the backend's SURREAL_USER / SURREAL_PASSWORD
SURREAL_USER=root
SURREAL_PASS=change-me
";

const BACKEND_TEMPLATE: &str = "\
# Backend service (acm serve)
API_HOST=0.0.0.0
# Falls back to PORT when unset
API_PORT=5055
# Accepted but ignored by the compiled server
API_RELOAD=false

# Private network address of the database service
SURREAL_URL=ws://surrealdb.railway.internal:8000/rpc
# Must equal the database service's SURREAL_USER / SURREAL_PASS
SURREAL_USER=root
SURREAL_PASSWORD=change-me
SURREAL_NAMESPACE=acm_scholar
SURREAL_DATABASE=papers

# Optional: enables POST /api/agent/acm/ask
GEMINI_API_KEY=

# Comma-separated frontend origins, or * for any
CORS_ORIGINS=https://your-frontend.vercel.app
";

const FRONTEND_TEMPLATE: &str = "\
# Frontend service
# Both must equal the backend's public address
API_URL=https://your-backend.up.railway.app
NEXT_PUBLIC_API_URL=https://your-backend.up.railway.app
";

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> EnvMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn backend() -> BackendEnv {
        BackendEnv::from_vars(&vars(&[
            ("SURREAL_URL", "ws://surrealdb.railway.internal:8000/rpc"),
            ("SURREAL_USER", "root"),
            ("SURREAL_PASSWORD", "hunter2"),
            ("CORS_ORIGINS", "https://scholar.vercel.app/"),
        ]))
    }

    #[test]
    fn test_endpoint_parse() {
        let ep = ServiceEndpoint::parse("ws://surrealdb.railway.internal:8000/rpc").unwrap();
        assert_eq!(ep.protocol, Protocol::Ws);
        assert_eq!(ep.port, 8000);
        assert_eq!(ep.path, "/rpc");
        assert_eq!(ep.visibility, Visibility::Internal);

        let ep = ServiceEndpoint::parse("https://api.example.com/").unwrap();
        assert_eq!(ep.port, 443);
        assert_eq!(ep.visibility, Visibility::Public);
        assert_eq!(ep.to_string(), "https://api.example.com");

        let ep = ServiceEndpoint::parse("http://10.0.3.7:5055").unwrap();
        assert_eq!(ep.visibility, Visibility::Internal);
        assert_eq!(ep.origin(), "http://10.0.3.7:5055");

        assert!(ServiceEndpoint::parse("ftp://files.example.com").is_err());
        assert!(ServiceEndpoint::parse("not a url").is_err());
    }

    #[test]
    fn test_backend_defaults() {
        let env = BackendEnv::from_vars(&vars(&[("PORT", "8080")]));
        assert_eq!(env.host, "0.0.0.0");
        assert_eq!(env.port, 8080);
        assert_eq!(env.namespace, "acm_scholar");
        assert_eq!(env.database, "papers");
        assert_eq!(env.effective_origins().len(), DEFAULT_LOCAL_ORIGINS.len());
    }

    #[test]
    fn test_database_link_matches() {
        let db = DatabaseEnv::from_vars(&vars(&[("SURREAL_USER", "root"), ("SURREAL_PASS", "hunter2")]));
        let findings = check_database_link(&db, &backend());
        assert!(passes(&findings));
        assert!(findings.iter().all(|f| f.severity == Severity::Ok));
    }

    #[test]
    fn test_database_link_mismatch() {
        let db = DatabaseEnv::from_vars(&vars(&[("SURREAL_USER", "root"), ("SURREAL_PASS", "other")]));
        let findings = check_database_link(&db, &backend());
        assert!(!passes(&findings));
        assert!(findings.iter().all(|f| !f.message.contains("hunter2")));
    }

    #[test]
    fn test_database_link_rejects_http_and_warns_public() {
        let db = DatabaseEnv::from_vars(&vars(&[("SURREAL_USER", "root"), ("SURREAL_PASS", "hunter2")]));

        let mut env = backend();
        env.database_url = Some("http://surrealdb.railway.internal:8000".into());
        assert!(!passes(&check_database_link(&db, &env)));

        env.database_url = Some("wss://db.example.com/rpc".into());
        let findings = check_database_link(&db, &env);
        assert!(passes(&findings));
        assert!(findings.iter().any(|f| f.severity == Severity::Warn));
    }

    #[test]
    fn test_frontend_link() {
        let frontend = FrontendEnv::from_vars(&vars(&[
            ("API_URL", "https://acm.up.railway.app/"),
            ("NEXT_PUBLIC_API_URL", "https://acm.up.railway.app"),
        ]));
        assert!(passes(&check_frontend_link(&frontend, "https://acm.up.railway.app")));

        let stale = FrontendEnv {
            api_url: Some("https://acm.up.railway.app".into()),
            public_api_url: Some("http://localhost:5055".into()),
        };
        let findings = check_frontend_link(&stale, "https://acm.up.railway.app");
        assert!(!passes(&findings));
        assert!(findings
            .iter()
            .any(|f| f.severity == Severity::Error && f.message.contains("NEXT_PUBLIC_API_URL")));

        assert!(!passes(&check_frontend_link(&FrontendEnv::default(), "https://acm.up.railway.app")));
    }

    #[test]
    fn test_cors() {
        let env = backend();
        assert_eq!(check_cors(&env, "https://scholar.vercel.app").severity, Severity::Ok);
        assert_eq!(check_cors(&env, "https://evil.example").severity, Severity::Error);

        let open = BackendEnv {
            cors_origins: vec!["*".into()],
            ..BackendEnv::default()
        };
        assert_eq!(check_cors(&open, "https://anything.example").severity, Severity::Warn);

        let local = BackendEnv::default();
        assert_eq!(check_cors(&local, "http://localhost:3000").severity, Severity::Ok);
        assert_eq!(check_cors(&local, "https://scholar.vercel.app").severity, Severity::Error);
    }

    #[test]
    fn test_templates_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.env");
        std::fs::write(&path, template(DeployService::Backend)).unwrap();

        let env = BackendEnv::from_vars(&read_env_file(&path).unwrap());
        assert_eq!(env.port, 5055);
        assert!(env.llm_api_key.is_none());
        assert_eq!(env.cors_origins, vec!["https://your-frontend.vercel.app"]);

        assert!(read_env_file(&dir.path().join("missing.env")).is_err());
    }

    #[test]
    fn test_credentials_debug_masks_password() {
        let creds = Credentials {
            user: Some("root".into()),
            password: Some("hunter2".into()),
        };
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }
}
