//! issue-proxy
//!
//! Serves the open issues (or pull requests) of GitHub repositories as JSON,
//! fronting the GitHub REST API with a freshness cache and single-flight
//! fetches.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                     ISSUE PROXY                       │
//!   Request       │  ┌──────────┐   ┌──────────┐   hit                    │
//!   ──────────────┼─▶│   http   │──▶│  cache   │──────────────┐           │
//!                 │  │ handlers │   │freshness │              │           │
//!                 │  └──────────┘   └────┬─────┘              │           │
//!                 │                      │ miss               │           │
//!                 │                      ▼                    │           │
//!                 │                ┌──────────┐               │           │
//!                 │                │  dedup   │ one fetch     │           │
//!                 │                │single-fl.│ per key       │           │
//!                 │                └────┬─────┘               │           │
//!                 │                     ▼                     │           │
//!                 │                ┌──────────┐               │           │      GitHub
//!                 │                │ upstream │───────────────┼───────────┼────▶ REST API
//!                 │                │ paginate │               │           │
//!                 │                └──────────┘               │           │
//!   Response      │                                           ▼           │
//!   ◀─────────────┼────────────────────────────────── JSON + ETag         │
//!                 │                                                       │
//!                 │   config · observability · lifecycle                  │
//!                 └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use issue_proxy::config::{load_config, validate_config, ConfigError, ServiceConfig};
use issue_proxy::http::HttpServer;
use issue_proxy::lifecycle::Shutdown;
use issue_proxy::observability::{logging, metrics};
use issue_proxy::upstream::GitHubClient;

#[derive(Parser)]
#[command(name = "issue-proxy")]
#[command(about = "Cached proxy serving open GitHub issues as JSON", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if config.upstream.token.as_deref().map_or(true, str::is_empty) {
        config.upstream.token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_tracing(&config.observability.log_level);

    tracing::info!("issue-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        ttl_secs = config.cache.ttl_secs,
        capacity = config.cache.capacity,
        max_pages = config.upstream.max_pages,
        stale_on_error = config.cache.stale_on_error,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let client = Arc::new(GitHubClient::new(&config.upstream)?);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config, client);
    server.run(listener, shutdown_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
