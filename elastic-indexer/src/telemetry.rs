//! Tracing setup for hosts running the indexer.

use std::env;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::IndexerError;

const DEFAULT_FILTER: &str = "elastic_indexer=info,elastic_indexer_repository=info";

/// Install the global tracing subscriber.
///
/// The filter comes from `RUST_LOG`. `LOG_FORMAT=json` selects structured JSON
/// output; anything else gives pretty console output. Fails if a global
/// subscriber is already installed.
pub fn init_tracing() -> Result<(), IndexerError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
            .map_err(|e| IndexerError::config(format!("Failed to initialize tracing: {}", e)))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .try_init()
            .map_err(|e| IndexerError::config(format!("Failed to initialize tracing: {}", e)))?;
    }

    info!(
        service_name = "elastic-indexer",
        service_version = env!("CARGO_PKG_VERSION"),
        json = json,
        "Tracing initialized"
    );

    Ok(())
}
