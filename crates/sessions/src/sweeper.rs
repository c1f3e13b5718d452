//! Periodic eviction of idle sessions.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::store::SessionStore;

/// Spawn a background task that sweeps `store` every `interval`.
///
/// The task runs until the returned handle is aborted or the runtime shuts
/// down.
pub fn spawn_sweeper(store: Arc<SessionStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let evicted = store.sweep_expired(Utc::now());
            debug!(evicted, remaining = store.len(), "Session sweep complete");
        }
    })
}
