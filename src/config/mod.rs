use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind: SocketAddr,
    /// Per-backend resolution deadline, in seconds.
    pub resolve_timeout: u64,
    pub download_retries: u32,
    pub user_agent: String,
    pub health: HealthConfig,
    pub backends: Vec<BackendConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub id: String,
    pub kind: BackendKind,
    /// Lower priority is tried first.
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Base URL of the instance to query; required for API-backed kinds.
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Scrape,
    Invidious,
    Piped,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            resolve_timeout: 10,
            download_retries: 3,
            // Some upstreams refuse obviously non-browser agents
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            health: HealthConfig::default(),
            backends: vec![
                BackendConfig {
                    id: "scrape".to_string(),
                    kind: BackendKind::Scrape,
                    priority: 10,
                    enabled: true,
                    endpoint: None,
                },
                BackendConfig {
                    id: "invidious".to_string(),
                    kind: BackendKind::Invidious,
                    priority: 20,
                    enabled: true,
                    endpoint: Some("https://yewtu.be".to_string()),
                },
                BackendConfig {
                    id: "piped".to_string(),
                    kind: BackendKind::Piped,
                    priority: 30,
                    enabled: true,
                    endpoint: Some("https://pipedapi.kavin.rocks".to_string()),
                },
            ],
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 30,
        }
    }
}

impl Config {
    /// Reads the TOML file when given, otherwise starts from defaults.
    /// `SERVER_PORT` in the environment overrides the configured port either
    /// way, matching how the container deployments set it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => Self::default(),
        };

        if let Ok(port) = std::env::var("SERVER_PORT") {
            let port: u16 = port.parse().context("SERVER_PORT must be a port number")?;
            config.bind.set_port(port);
        }

        Ok(config)
    }
}
