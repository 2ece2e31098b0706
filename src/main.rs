// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account API Server

use account_api::{config::Config, db::FirestoreDb, services::MediaService, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Account API");

    let db = if config.use_in_memory_store {
        tracing::warn!("Using in-memory user store; data is lost on restart");
        FirestoreDb::new_in_memory()
    } else {
        FirestoreDb::new(&config.gcp_project_id).await?
    };

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    tracing::info!(path = %config.upload_dir.display(), "Upload spool directory ready");

    let media = MediaService::new(&config.media);

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), db, media));

    // Build router
    let app = account_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("account_api=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
