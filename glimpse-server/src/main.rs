use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use glimpse_pipeline::MediaPipelineBuilder;
use glimpse_server::api::{self, AppState};
use glimpse_server::config::GlimpseConfig;
use glimpse_server::{factory, sweeper};

/// Glimpse ephemeral media server.
#[derive(Parser, Debug)]
#[command(name = "glimpse-server", about = "One-shot encrypted media sharing server")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "glimpse.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration from TOML file, defaults when absent, then apply
    // environment variable overrides on top.
    let config_found = Path::new(&cli.config).exists();
    let mut config: GlimpseConfig = if config_found {
        toml::from_str(&std::fs::read_to_string(&cli.config)?)?
    } else {
        toml::from_str("")?
    };
    config.apply_env();

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(config.logger.level.clone())
            }),
        )
        .init();

    if !config_found {
        info!(path = %cli.config, "config file not found, using defaults");
    }
    info!(version = env!("CARGO_PKG_VERSION"), "glimpse-server starting");

    let store = factory::create_store(&config.store).await?;
    let blobs = factory::create_blobs(&config.blob).await?;

    let pipeline = Arc::new(
        MediaPipelineBuilder::new()
            .store(store)
            .blobs(blobs)
            .pbkdf2_iterations(config.encryption.pbkdf2_iterations)
            .body_limit(config.server.body_limit)
            .build()?,
    );

    let (sweeper_handle, sweeper_shutdown) = sweeper::spawn_sweeper(
        Arc::clone(&pipeline),
        Duration::from_secs(config.sweep.interval_seconds),
        Duration::from_secs(config.sweep.timeout_seconds),
    );

    let app = api::router(AppState { pipeline }, config.server.body_limit);

    // Resolve the bind address (CLI overrides take precedence).
    let host = cli.host.unwrap_or(config.server.host);
    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "glimpse-server listening");

    // Serve with graceful shutdown on SIGINT / SIGTERM.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the sweeper within the shutdown budget.
    let _ = sweeper_shutdown.send(()).await;
    let budget = Duration::from_secs(config.server.shutdown_timeout_seconds);
    if tokio::time::timeout(budget, sweeper_handle).await.is_err() {
        warn!("sweeper did not stop within the shutdown budget");
    }

    info!("glimpse-server shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
