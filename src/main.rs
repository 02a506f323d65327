// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::infrastructure::config::{load_settings, load_vetted_library, load_widget_catalog};
use crate::infrastructure::psa_http_repository::PsaHttpRepository;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let settings = load_settings()?;
    let catalog = load_widget_catalog(settings.engine.widgets_path.as_deref())?;
    let vetted = load_vetted_library(settings.engine.vetted_sql_path.as_deref())?;
    tracing::info!(
        "Loaded {} widget templates, {} layouts, {} vetted queries",
        catalog.templates().len(),
        catalog.layouts().len(),
        vetted.len()
    );
    if vetted.is_empty() {
        tracing::warn!("Vetted SQL library is empty; failed reports will have no fallback");
    }

    // Create repository (infrastructure layer)
    let repository = Arc::new(PsaHttpRepository::new(
        settings.remote.base_url.clone(),
        settings.remote.api_token.clone(),
        Duration::from_secs(settings.remote.timeout_secs),
    )?);

    // Create application state
    let state = Arc::new(AppState::new(
        repository,
        Arc::new(catalog),
        Arc::new(vetted),
        &settings.engine,
    ));

    // Start server
    let addr: SocketAddr = settings
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address {}", settings.server.bind_addr))?;
    tracing::info!("Starting psa-dashboard-engine on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router(state)).await?;

    Ok(())
}
