//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! OESP Sync Server — thin entry point for the Axum HTTP service.
//!
//! All routing logic lives in `oesp_sync::http::create_router`. This binary
//! is responsible only for: CLI parsing, env config loading, store and state
//! wiring, server binding, and graceful shutdown.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use oesp_sync::{create_router, AppState, Config};

/// OESP Sync Server — boots the sync HTTP service.
#[derive(Parser)]
#[command(
    name = "oesp-sync-server",
    version = env!("CARGO_PKG_VERSION"),
    about = "OESP Sync Server — offline exchange, secured"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Run database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve().await,
        Commands::Migrate => migrate().await,
    }
}

async fn serve() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    #[cfg(feature = "postgres")]
    let mode = "persistent (postgres)";
    #[cfg(not(feature = "postgres"))]
    let mode = "in-memory";

    tracing::info!("oesp-sync-server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!("Port: {}", config.port);
    tracing::info!("Mode: {}", mode);
    tracing::info!("Max chunk bytes: {}", config.max_chunk_bytes);

    #[cfg(feature = "postgres")]
    let state = {
        let store = oesp_sync::PgStore::connect(&config.database_url).await?;
        AppState::new(Arc::new(store), config.clone())
    };

    #[cfg(not(feature = "postgres"))]
    let state = AppState::new(Arc::new(oesp_sync::MemoryStore::new()), config.clone());

    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;

    tracing::info!("Listening on 0.0.0.0:{}", config.port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down cleanly");

    Ok(())
}

async fn migrate() -> Result<()> {
    #[cfg(feature = "postgres")]
    {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
        let config = Config::from_env()?;
        let store = oesp_sync::PgStore::connect(&config.database_url).await?;
        store.run_migrations().await?;
        tracing::info!("Migrations complete");
        Ok(())
    }

    #[cfg(not(feature = "postgres"))]
    {
        Err(anyhow::anyhow!(
            "Built without postgres feature — migrations not available"
        ))
    }
}

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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}
