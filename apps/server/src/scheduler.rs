//! Background purge of expired cache entries.
//!
//! Reads already evict lazily; this only bounds memory held by keys that are
//! never requested again.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, info};

use crate::main_lib::AppState;

pub fn start_cache_purge_scheduler(state: Arc<AppState>, period: Duration) {
    if period.is_zero() {
        info!("Cache purge scheduler disabled");
        return;
    }

    tokio::spawn(async move {
        info!("Cache purge scheduler started ({:?} interval)", period);
        let mut ticker = interval(period);
        // First tick completes immediately; nothing is cached yet.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = state.gateway.purge_expired();
            debug!("Cache purge removed {} expired entries", removed);
        }
    });
}
