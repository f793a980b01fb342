//! Listener settings for the backend service

use std::time::Duration;

use scholar_core::config::ScholarConfig;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    /// Accepted for compatibility with deployments that set `API_RELOAD`
    pub reload: bool,
    /// Allowed browser origins; empty means the localhost defaults, `*` allows all
    pub cors_origins: Vec<String>,
    pub timeout: Duration,
}

impl ServeConfig {
    /// From the `[server]` section after environment overrides
    pub fn from_config(config: &ScholarConfig) -> Self {
        Self {
            host: config.server.host().to_string(),
            port: config.server.port(),
            reload: config.server.reload,
            cors_origins: config.server.cors_origins.clone(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    pub fn with_host(mut self, host: Option<String>) -> Self {
        if let Some(host) = host.filter(|h| !h.trim().is_empty()) {
            self.host = host;
        }
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self::from_config(&ScholarConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_all_interfaces_on_5055() {
        let config = ServeConfig::default();
        assert_eq!(config.address(), "0.0.0.0:5055");
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn env_overrides_flow_through() {
        let mut scholar = ScholarConfig::default();
        scholar.apply_overrides_from(|key| match key {
            "PORT" => Some("8080".to_string()),
            "API_RELOAD" => Some("true".to_string()),
            "CORS_ORIGINS" => Some("https://app.example.com/, http://localhost:3000".to_string()),
            _ => None,
        });
        let config = ServeConfig::from_config(&scholar);
        assert_eq!(config.port, 8080);
        assert!(config.reload);
        assert_eq!(
            config.cors_origins,
            vec!["https://app.example.com", "http://localhost:3000"]
        );

        let config = config.with_port(Some(9000)).with_host(Some("127.0.0.1".into()));
        assert_eq!(config.address(), "127.0.0.1:9000");
    }
}
