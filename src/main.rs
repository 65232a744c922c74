use std::sync::Arc;

use gigpi::api;
use gigpi::config::{Config, LogFormat};
use gigpi::engine::sweeper::run_sweeper;
use gigpi::error::AppError;
use gigpi::state::AppState;
use gigpi::storage::{FileStorage, MemoryStorage, Storage};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Compact => subscriber.compact().init(),
        LogFormat::Json => subscriber.json().init(),
    }

    let storage: Arc<dyn Storage> = match &config.data_dir {
        Some(dir) => {
            let storage = FileStorage::open(dir)?;
            tracing::info!(data_dir = %dir.display(), "using file storage");
            Arc::new(storage)
        }
        None => {
            tracing::warn!("DATA_DIR not set; records will not survive a restart");
            Arc::new(MemoryStorage::new())
        }
    };

    let shared_state = Arc::new(AppState::new(
        storage,
        config.flow,
        config.pick_timeout,
        config.event_buffer_size,
    ));

    tokio::spawn(run_sweeper(shared_state.clone(), config.sweep_interval));

    let app = api::rest::router(shared_state.clone()).layer(api::rest::cors_layer(&config.cors_origins)?);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
