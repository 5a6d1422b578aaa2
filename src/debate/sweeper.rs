use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::engine::DebateEngine;

/// Spawn the periodic deletion sweep. Rooms flagged for deletion whose grace
/// deadline has passed are torn down on each tick.
pub fn start_deletion_sweep(engine: Arc<DebateEngine>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(period_secs = period.as_secs(), "Deletion sweep started");

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so a fresh boot does
        // not sweep before anything can be scheduled.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let deleted = engine.sweep_expired().await;
            if deleted > 0 {
                tracing::info!(deleted = deleted, "Deletion sweep removed rooms");
            }
        }
    })
}
