//! Node binary for quire.
//!
//! Opens the configured store, checks that its schema matches this build,
//! attaches the property stores and per-setting tables, warms the setting
//! caches and keeps the refreshing ones current until shut down.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `quire.toml` and `QUIRE__*` variables
//! 2. Initialize structured logging (tracing)
//! 3. Connect to the configured backend
//! 4. Verify the schema version
//! 5. Attach property stores and declare configured properties
//! 6. Register built-in settings and attach their tables
//! 7. Load the setting caches
//! 8. Start the cache refreshers
//! 9. Wait for Ctrl+C
//! 10. Stop the refreshers and close the pool

mod config;
mod error;

use std::sync::Arc;

use quire_db::DataRegistry;
use quire_db::catalog::{SCHEMA_VERSION, property_stores};
use quire_settings::catalog::builtin_registry;
use quire_settings::refresh::spawn_refreshers;
use quire_settings::SettingCache;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{LoggingConfig, NodeConfig};
use crate::error::NodeError;

/// Application entry point for the node.
///
/// # Errors
///
/// Returns an error if any startup step fails or the shutdown signal
/// cannot be awaited.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is not up yet; errors surface via main.
    let config = NodeConfig::load()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(
        app = config.app,
        backend = config.data.backend,
        "quire-node starting"
    );

    run(config).await?;
    info!("quire-node stopped");
    Ok(())
}

/// Configure the global subscriber. `RUST_LOG` overrides the configured
/// level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

async fn run(config: NodeConfig) -> Result<(), NodeError> {
    // 3. Connect to the backend.
    let backend = config.data.resolve()?;
    let mut data = DataRegistry::connect(&config.app, &backend).await?;
    info!(dialect = data.dialect().as_str(), "Store connected");

    // 4. Verify the schema version before touching any other table.
    data.verify_version(SCHEMA_VERSION).await?;
    info!(version = SCHEMA_VERSION, "Schema version verified");

    // 5. Attach property stores and declare configured properties.
    for schema in property_stores() {
        data.attach_props(&schema).await?;
    }
    for decl in &config.properties {
        let names: Vec<&str> = decl.names.iter().map(String::as_str).collect();
        data.props(&decl.store)?
            .ensure_exists(&names, decl.shared)
            .await?;
        info!(
            store = decl.store,
            count = names.len(),
            shared = decl.shared,
            "Properties declared"
        );
    }

    // 6. Register built-in settings and attach their tables.
    let settings = builtin_registry()?;
    settings.attach_all(&mut data).await?;
    info!(settings = settings.len(), "Settings registered");

    // 7. Load the setting caches.
    let data = Arc::new(data);
    let cache = Arc::new(SettingCache::new());
    let loaded = settings.initialise_all(&data, &cache).await?;
    info!(loaded, "Setting caches loaded");

    // 8. Start the refreshers.
    let refreshers = spawn_refreshers(&settings, &data, &cache);

    // 9. Run until interrupted.
    info!("quire-node ready");
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down");

    // 10. Stop the refreshers and close the pool.
    for handle in &refreshers {
        handle.abort();
    }
    data.close().await;
    Ok(())
}
