//! foodlens-sr - Scan Resolution Microservice
//!
//! Resolves product scans (barcodes and packaging photos) into canonical
//! nutrition records with a derived health score, through a staged fallback
//! chain fronted by a persistent cache.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use foodlens_sr::config::{CliOverrides, Config};
use foodlens_sr::db::SqliteProductStore;
use foodlens_sr::resolver::{Resolver, StageTimeouts};
use foodlens_sr::services::{
    GeminiVisionClient, OpenFoodFactsRegistry, OpenFoodFactsSearch, TesseractCli,
};
use foodlens_sr::AppState;

/// Command-line arguments for foodlens-sr
#[derive(Parser, Debug)]
#[command(name = "foodlens-sr")]
#[command(about = "Scan resolution microservice for FoodLens")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database path
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// TOML config file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "foodlens_sr=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::load(CliOverrides {
        port: args.port,
        database: args.database,
        config_file: args.config,
    })?;

    info!("Starting foodlens-sr (Scan Resolver) on port {}", config.port);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", config.database.display());

    let db_pool = foodlens_sr::db::init_database_pool(&config.database).await?;
    info!("Database connection established");

    let store = SqliteProductStore::new(db_pool);
    let registry = OpenFoodFactsRegistry::new(
        &config.registry_base_url,
        &config.user_agent,
        config.registry_timeout,
    )?;
    let search = OpenFoodFactsSearch::new(
        &config.search_base_url,
        &config.user_agent,
        config.search_timeout,
    )?;
    let ocr_engine = TesseractCli::new(&config.tesseract_command);
    let vision = GeminiVisionClient::new(
        &config.gemini_base_url,
        &config.gemini_model,
        config.gemini_api_key.clone(),
        &config.user_agent,
        config.vision_timeout,
    )?;

    let resolver = Resolver::new(
        Arc::new(store),
        Arc::new(registry),
        Arc::new(search),
        Arc::new(ocr_engine),
        Arc::new(vision),
        StageTimeouts::from_config(&config),
    );
    info!("Resolution chain initialized");

    let state = AppState::new(Arc::new(resolver));
    let app = foodlens_sr::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);
    info!("Health check: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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
