//! Process bootstrap: tracing, policy from the environment, HTTP server.

use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

use palisade::api::{AppState, router};
use palisade::audit::AuditLog;
use palisade::config::{PolicyBuilder, PolicyStore};
use palisade::gateway::ScanGateway;
use palisade::generate::HttpTextGenerator;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let policy = PolicyBuilder::new().with_env().build()?;
    tracing::info!(
        enabled = policy.enabled,
        remote_configured = policy.has_remote_credentials(),
        "scanning policy loaded",
    );

    let generator_url = std::env::var("PALISADE_GENERATOR_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:11434".to_owned());
    let model =
        std::env::var("PALISADE_MODEL").unwrap_or_else(|_| palisade::gateway::DEFAULT_MODEL.to_owned());

    let gateway = ScanGateway::builder(Arc::new(HttpTextGenerator::new(generator_url)))
        .policy(Arc::new(PolicyStore::with_config(policy)))
        .audit(Arc::new(AuditLog::in_memory()))
        .model(model)
        .build()?;

    let addr = std::env::var("PALISADE_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_owned());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "palisade gateway listening");

    axum::serve(listener, router(AppState::new(Arc::new(gateway))))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
