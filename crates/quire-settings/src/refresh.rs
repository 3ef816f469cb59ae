//! Periodic cache refresh.
//!
//! Settings declared with a refresh interval have their whole table re-read
//! into the cache on that interval, which picks up writes made by other
//! processes or directly in the database. Failed refreshes are logged and
//! retried on the next tick; the previous map stays in place.

use std::sync::Arc;

use quire_db::DataRegistry;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cache::SettingCache;
use crate::registry::SettingRegistry;
use crate::setting::SettingSpec;

/// Spawn the refresh task for `spec`, or return `None` if it declares no
/// refresh interval.
///
/// The first refresh happens one interval after spawning; callers are
/// expected to have initialised the cache already.
pub fn spawn_refresher(
    spec: Arc<SettingSpec>,
    data: Arc<DataRegistry>,
    cache: Arc<SettingCache>,
) -> Option<JoinHandle<()>> {
    let period = spec.refresh_interval()?;

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match spec.initialise(&data, &cache).await {
                Ok(loaded) => {
                    tracing::debug!(setting = spec.id(), loaded, "Refreshed setting cache");
                }
                Err(e) => {
                    tracing::warn!(setting = spec.id(), error = %e, "Setting cache refresh failed");
                }
            }
        }
    }))
}

/// Spawn refresh tasks for every setting in `registry` that declares an
/// interval.
pub fn spawn_refreshers(
    registry: &SettingRegistry,
    data: &Arc<DataRegistry>,
    cache: &Arc<SettingCache>,
) -> Vec<JoinHandle<()>> {
    let handles: Vec<JoinHandle<()>> = registry
        .iter()
        .filter_map(|spec| spawn_refresher(Arc::clone(spec), Arc::clone(data), Arc::clone(cache)))
        .collect();
    tracing::info!(tasks = handles.len(), "Setting refreshers started");
    handles
}
