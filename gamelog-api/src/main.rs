//! gamelog-api - game log service
//!
//! Serves a hand-maintained spreadsheet of completed games as JSON and
//! fills in missing metascores from the review catalog.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use gamelog_api::jobs::AutoEnrichJob;
use gamelog_api::service::GameLog;
use gamelog_api::{build_router, AppState};
use gamelog_common::config::{load_toml_config, locate_config_file, Settings, TomlConfig};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for gamelog-api
#[derive(Parser, Debug)]
#[command(name = "gamelog-api")]
#[command(about = "Game log spreadsheet service with metascore enrichment")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "GAMELOG_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Spreadsheet to serve (overrides config)
    #[arg(short, long)]
    spreadsheet: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = match locate_config_file(args.config.as_deref())? {
        Some(path) => load_toml_config(&path)?,
        None => TomlConfig::default(),
    };
    let mut settings = Settings::from_environment(&toml_config)?;
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(path) = args.spreadsheet {
        settings.spreadsheet.path = path;
    }
    settings.validate()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting gamelog-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    settings.log_summary();

    let service = Arc::new(
        GameLog::open(&settings)
            .await
            .context("Failed to initialize game log service")?,
    );

    let auto_enrich = if settings.enrich.auto_enrich_on_startup {
        AutoEnrichJob::spawn(service.clone())
    } else {
        info!("Auto-enrichment disabled");
        AutoEnrichJob::disabled()
    };

    let app = build_router(AppState::new(service.clone(), auto_enrich));

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/api/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    service.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
