use std::sync::Arc;

use delivery_dispatch::api;
use delivery_dispatch::config::{Config, LogFormat};
use delivery_dispatch::error::AppError;
use delivery_dispatch::external::{
    Collaborators, InMemoryLocations, InMemoryOrders, LocalFileStorage,
};
use delivery_dispatch::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    init_tracing(&config);

    let external = Collaborators {
        orders: Arc::new(InMemoryOrders::new()),
        locations: Arc::new(InMemoryLocations::new()),
        storage: Arc::new(LocalFileStorage::new(config.proof_storage_dir.clone())),
    };
    if config.proof_storage_dir.is_none() {
        tracing::warn!("PROOF_STORAGE_DIR not set; proof uploads are recorded without files");
    }

    let shared_state = Arc::new(AppState::new(config.dispatch_settings(), external));
    let app = api::rest::router(shared_state);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        claim_radius_km = config.claim_radius_km,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

fn init_tracing(config: &Config) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);

    match config.log_format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
