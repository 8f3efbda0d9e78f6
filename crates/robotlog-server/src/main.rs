//! Robot attribute registry server.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (`ROBOTLOG_CONFIG`, default `robotlog-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Open the configured store, running migrations for `PostgreSQL`
//! 4. Serve the HTTP API until `Ctrl-C`
//! 5. Close the store

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use robotlog_api::AppState;
use robotlog_core::{LogFormat, LoggingConfig, RegistryConfig, RetryPolicy};
use robotlog_store::{Registry, RobotStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::ServerError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "robotlog-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, store setup, or serving fails.
#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let config_path = std::env::var("ROBOTLOG_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = RegistryConfig::load_or_default(&config_path)?;

    init_tracing(&config.logging)?;

    info!(
        config = %config_path.display(),
        config_found = config_path.exists(),
        backend = ?config.storage.backend,
        host = config.server.host,
        port = config.server.port,
        max_conflict_retries = config.upsert.max_conflict_retries,
        "robotlog-server starting"
    );

    let store = RobotStore::open(&config.storage).await?;
    info!(backend = store.name(), "Store ready");

    let registry = Registry::with_retry(store.clone(), RetryPolicy::from_config(&config.upsert));
    let state = Arc::new(AppState::new(registry));

    let served = robotlog_api::start_server(&config.server, state).await;

    store.close().await;
    served?;

    info!("robotlog-server shutdown complete");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
fn init_tracing(logging: &LoggingConfig) -> Result<(), ServerError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level).map_err(|e| ServerError::Logging {
            level: logging.level.clone(),
            message: e.to_string(),
        })?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match logging.format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}
