use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use super::room::RoomId;

struct TimerEntry {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Owns at most one pending turn-timeout per room.
///
/// Cancel/fire races resolve deterministically: each `start` hands its
/// sleeper a globally unique generation, and the timeout body must claim
/// that generation (under the engine's room lock) before touching state. A
/// `cancel` or a newer `start` removes the entry, so a sleeper that already
/// escaped its sleep finds its claim rejected and does nothing.
pub struct TurnTimerManager {
    timers: Arc<RwLock<HashMap<RoomId, TimerEntry>>>,
    timeout: Duration,
    next_generation: AtomicU64,
}

impl TurnTimerManager {
    pub fn new(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            timers: Arc::new(RwLock::new(HashMap::new())),
            timeout,
            next_generation: AtomicU64::new(1),
        })
    }

    /// Schedule the timeout for a room, superseding any pending one. The
    /// callback receives the generation it must `try_claim` before acting.
    pub async fn start<F, Fut>(&self, room_id: RoomId, on_timeout: F)
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let timeout = self.timeout;

        let mut timers = self.timers.write().await;
        if let Some(old) = timers.remove(&room_id) {
            old.handle.abort();
            tracing::debug!(room_id = room_id, "Superseded pending turn timer");
        }

        let handle = tokio::spawn(async move {
            sleep(timeout).await;
            on_timeout(generation).await;
        });

        timers.insert(room_id, TimerEntry { generation, handle });
        tracing::debug!(
            room_id = room_id,
            generation = generation,
            timeout_secs = timeout.as_secs(),
            "Turn timer started"
        );
    }

    /// Cancel the pending timeout, if any. A no-op when the fire already
    /// claimed its generation.
    pub async fn cancel(&self, room_id: RoomId) {
        let mut timers = self.timers.write().await;
        if let Some(entry) = timers.remove(&room_id) {
            entry.handle.abort();
            tracing::debug!(room_id = room_id, "Turn timer cancelled");
        }
    }

    /// Called by the timeout body before it mutates anything. True exactly
    /// when this generation is still the live timer for the room; claiming
    /// removes the entry so a later cancel is a no-op.
    pub async fn try_claim(&self, room_id: RoomId, generation: u64) -> bool {
        let mut timers = self.timers.write().await;
        match timers.get(&room_id) {
            Some(entry) if entry.generation == generation => {
                timers.remove(&room_id);
                true
            }
            _ => false,
        }
    }

    pub async fn is_pending(&self, room_id: RoomId) -> bool {
        let timers = self.timers.read().await;
        timers.contains_key(&room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn manager(millis: u64) -> Arc<TurnTimerManager> {
        TurnTimerManager::new(Duration::from_millis(millis))
    }

    #[tokio::test]
    async fn test_fire_after_timeout() {
        let timers = manager(20);
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        let claimer = timers.clone();
        timers
            .start(1, move |generation| async move {
                if claimer.try_claim(1, generation).await {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;

        sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timers.is_pending(1).await);
    }

    #[tokio::test]
    async fn test_second_start_supersedes_first() {
        let timers = manager(20);
        let first_fired = Arc::new(AtomicUsize::new(0));
        let second_fired = Arc::new(AtomicUsize::new(0));

        let counter = first_fired.clone();
        let claimer = timers.clone();
        timers
            .start(1, move |generation| async move {
                if claimer.try_claim(1, generation).await {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;

        let counter = second_fired.clone();
        let claimer = timers.clone();
        timers
            .start(1, move |generation| async move {
                if claimer.try_claim(1, generation).await {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;

        sleep(Duration::from_millis(100)).await;
        assert_eq!(first_fired.load(Ordering::SeqCst), 0);
        assert_eq!(second_fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_prevents_fire() {
        let timers = manager(30);
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        let claimer = timers.clone();
        timers
            .start(1, move |generation| async move {
                if claimer.try_claim(1, generation).await {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;

        timers.cancel(1).await;
        sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_generation_cannot_claim() {
        let timers = manager(1000);

        timers.start(1, |_| async {}).await;
        let stale = 0;
        assert!(!timers.try_claim(1, stale).await);
        // The live entry is untouched by the failed claim.
        assert!(timers.is_pending(1).await);
        timers.cancel(1).await;
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let timers = manager(10);

        timers.start(7, |_| async {}).await;
        let generation = {
            let map = timers.timers.read().await;
            map.get(&7).map(|e| e.generation).unwrap()
        };

        assert!(timers.try_claim(7, generation).await);
        // Second claim of the same generation loses.
        assert!(!timers.try_claim(7, generation).await);
    }

    #[tokio::test]
    async fn test_rooms_are_independent() {
        let timers = manager(1000);
        timers.start(1, |_| async {}).await;
        timers.start(2, |_| async {}).await;

        timers.cancel(1).await;
        assert!(!timers.is_pending(1).await);
        assert!(timers.is_pending(2).await);
        timers.cancel(2).await;
    }
}
