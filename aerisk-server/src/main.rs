//! aerisk-server - companion upload server
//!
//! Serves `/health`, `/models` and `/predict` locally so the CLI can be
//! exercised without the hosted prediction backend.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use aerisk_common::analysis::catalog_model_names;
use aerisk_server::{build_router, AppState};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for aerisk-server
#[derive(Parser, Debug)]
#[command(name = "aerisk-server")]
#[command(about = "Companion CSV upload server for Aerisk")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5000", env = "AERISK_SERVER_PORT")]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1", env = "AERISK_SERVER_BIND")]
    bind: IpAddr,

    /// Directory for stored uploads
    #[arg(long, default_value = "./uploads", env = "AERISK_UPLOADS_DIR")]
    uploads_dir: PathBuf,

    /// Model identifiers to offer (comma-separated)
    #[arg(long, env = "AERISK_SERVER_MODELS", value_delimiter = ',')]
    models: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aerisk_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any I/O
    info!(
        "Starting Aerisk upload server (aerisk-server) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let models: Vec<String> = {
        let configured: Vec<String> = args
            .models
            .iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if configured.is_empty() {
            catalog_model_names().into_iter().map(str::to_string).collect()
        } else {
            configured
        }
    };

    std::fs::create_dir_all(&args.uploads_dir).with_context(|| {
        format!("Failed to create uploads directory {}", args.uploads_dir.display())
    })?;
    info!("Uploads directory: {}", args.uploads_dir.display());
    info!("Models offered: {}", models.join(", "));

    let app = build_router(AppState::new(args.uploads_dir.clone(), models));

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
