use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use apod_proxy::{
    config::Config,
    web::{AppState, WebServer},
};

#[derive(Parser)]
#[command(name = "apod-proxy")]
#[command(version)]
#[command(about = "A caching web front end for NASA's Astronomy Picture of the Day")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Cache directory (overrides config file and APOD_CACHE_DIR)
    #[arg(short = 'd', long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with specified level
    let log_filter = if cli.log_level == "trace" {
        format!("apod_proxy={},tower_http=trace", cli.log_level)
    } else {
        format!("apod_proxy={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting APOD Proxy v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    // Override config with CLI arguments
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(cache_dir) = cli.cache_dir {
        config.storage.cache_path = cache_dir;
    }

    info!("Using cache directory: {}", config.storage.cache_path.display());

    let state = AppState::from_config(config)?;
    if let Err(e) = state.apod_service.cache().scan().await {
        // Lookups read sidecars lazily, so a failed warm-up is not fatal
        warn!("Failed to scan cache directory: {}", e);
    }

    let web_server = WebServer::new(state)?;

    info!(
        "Starting web server on {}:{}",
        web_server.host(),
        web_server.port()
    );
    web_server.serve().await?;

    Ok(())
}
