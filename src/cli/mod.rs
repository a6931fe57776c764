use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::backends::build_backends;
use crate::config::Config;
use crate::core::{BackendRegistry, Downloader, HealthPolicy, Orchestrator};
use crate::server::{create_app, AppState};

#[derive(Parser)]
#[command(name = "vidgate")]
#[command(about = "Media resolution gateway with backend failover")]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Socket address to listen on (overrides config)
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(bind) = self.bind {
            config.bind = bind;
        }

        let backends = build_backends(&config)?;
        let policy = HealthPolicy {
            failure_threshold: config.health.failure_threshold,
            cooldown: Duration::from_secs(config.health.cooldown_secs),
        };

        // Process-wide state: built once here, immutable afterwards apart
        // from the per-backend health records.
        let registry = Arc::new(BackendRegistry::new(backends, policy)?);
        anyhow::ensure!(!registry.is_empty(), "no backends enabled");
        info!(
            "Registered {} backends: {}",
            registry.len(),
            registry
                .snapshot()
                .iter()
                .map(|s| format!("{} (priority {})", s.id, s.priority))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let orchestrator = Arc::new(Orchestrator::new(
            registry,
            Duration::from_secs(config.resolve_timeout),
        ));
        let downloader = Arc::new(Downloader::new(&config.user_agent, config.download_retries));

        let app = create_app(AppState {
            orchestrator,
            downloader,
        });

        let listener = tokio::net::TcpListener::bind(config.bind)
            .await
            .with_context(|| format!("binding {}", config.bind))?;
        info!("Listening on {}", config.bind);

        axum::serve(listener, app).await?;

        Ok(())
    }
}
