use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use loancast::config::Config;
use loancast::metrics;
use loancast::ml::PredictionEngine;
use loancast::registry::{Registry, RegistrySlot};
use loancast::web::ApiServer;

#[derive(Parser)]
#[command(name = "loancast")]
#[command(about = "Loan sales forecasts from a registry of pre-trained models")]
struct Cli {
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Overrides `server.port` from the configuration.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "loancast=info,tower_http=info".into()))
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    info!("Starting loan sales prediction service");

    let metrics_handle = metrics::install_recorder();

    // serving without a registry is never allowed
    let registry = Registry::load(&config.registry).context("model registry failed to load")?;
    let slot = Arc::new(RegistrySlot::new());
    let registry = slot.install(registry)?;
    info!("Total models: {}", registry.total_models());

    let engine = PredictionEngine::new(slot, &config.data, &config.prediction);
    let server = ApiServer::new(engine, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.server.host, config.server.port))?;

    server.start(addr).await?;
    info!("Service stopped");
    Ok(())
}
