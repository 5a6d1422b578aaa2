use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::RwLock;

use super::room::{RoomId, UserId};

/// One (user, room) presence record. Reactivated in place on re-entry so a
/// user has at most one record per room.
#[derive(Debug, Clone)]
pub struct PresenceRecord {
    pub entered_at: SystemTime,
    pub exited_at: Option<SystemTime>,
    pub active: bool,
}

/// Result of an `enter` call.
#[derive(Debug, Clone, Copy)]
pub struct EnterOutcome {
    /// False when the user was already active (idempotent re-enter).
    pub changed: bool,
    /// True only on the very first entry of this user into this room.
    pub first_visit: bool,
    /// Active records for the room after the call.
    pub active_count: u32,
}

/// Result of a `leave` call.
#[derive(Debug, Clone, Copy)]
pub struct LeaveOutcome {
    /// False when the user was not active (no-op leave).
    pub changed: bool,
    pub active_count: u32,
}

/// Tracks who is present in each room, independent of debater seats.
///
/// The active count is always recomputed from the ledger; nothing increments
/// or decrements a counter on its own, so the count cannot drift from the
/// records.
pub struct PresenceTracker {
    records: Arc<RwLock<HashMap<(UserId, RoomId), PresenceRecord>>>,
}

impl PresenceTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub async fn enter(&self, user_id: UserId, room_id: RoomId) -> EnterOutcome {
        let mut records = self.records.write().await;
        let key = (user_id, room_id);

        let (changed, first_visit) = match records.get_mut(&key) {
            Some(record) if record.active => (false, false),
            Some(record) => {
                record.active = true;
                record.entered_at = SystemTime::now();
                record.exited_at = None;
                (true, false)
            }
            None => {
                records.insert(
                    key,
                    PresenceRecord {
                        entered_at: SystemTime::now(),
                        exited_at: None,
                        active: true,
                    },
                );
                (true, true)
            }
        };

        let active_count = Self::count_active(&records, room_id);
        if changed {
            tracing::debug!(user_id = user_id, room_id = room_id, count = active_count, "Presence enter");
        }
        EnterOutcome {
            changed,
            first_visit,
            active_count,
        }
    }

    pub async fn leave(&self, user_id: UserId, room_id: RoomId) -> LeaveOutcome {
        let mut records = self.records.write().await;
        let key = (user_id, room_id);

        let changed = match records.get_mut(&key) {
            Some(record) if record.active => {
                record.active = false;
                record.exited_at = Some(SystemTime::now());
                true
            }
            _ => false,
        };

        let active_count = Self::count_active(&records, room_id);
        if changed {
            tracing::debug!(user_id = user_id, room_id = room_id, count = active_count, "Presence leave");
        }
        LeaveOutcome {
            changed,
            active_count,
        }
    }

    pub async fn record(&self, user_id: UserId, room_id: RoomId) -> Option<PresenceRecord> {
        let records = self.records.read().await;
        records.get(&(user_id, room_id)).cloned()
    }

    pub async fn active_count(&self, room_id: RoomId) -> u32 {
        let records = self.records.read().await;
        Self::count_active(&records, room_id)
    }

    /// Drop every record for a room. Called when the sweep deletes it.
    pub async fn purge_room(&self, room_id: RoomId) {
        let mut records = self.records.write().await;
        records.retain(|(_, r), _| *r != room_id);
    }

    fn count_active(records: &HashMap<(UserId, RoomId), PresenceRecord>, room_id: RoomId) -> u32 {
        records
            .iter()
            .filter(|((_, r), record)| *r == room_id && record.active)
            .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enter_is_idempotent() {
        let tracker = PresenceTracker::new();

        let first = tracker.enter(1, 100).await;
        assert!(first.changed);
        assert!(first.first_visit);
        assert_eq!(first.active_count, 1);

        let second = tracker.enter(1, 100).await;
        assert!(!second.changed);
        assert!(!second.first_visit);
        assert_eq!(second.active_count, 1);
    }

    #[tokio::test]
    async fn test_enter_enter_leave_enter_counts_one() {
        let tracker = PresenceTracker::new();
        tracker.enter(1, 100).await;
        tracker.enter(1, 100).await;
        tracker.leave(1, 100).await;
        let outcome = tracker.enter(1, 100).await;

        assert!(outcome.changed);
        // Reactivation, not a new record, so not a new visit.
        assert!(!outcome.first_visit);
        assert_eq!(outcome.active_count, 1);
    }

    #[tokio::test]
    async fn test_record_timestamps() {
        let tracker = PresenceTracker::new();
        tracker.enter(1, 100).await;

        let first = tracker.record(1, 100).await.unwrap();
        assert!(first.active);
        assert!(first.exited_at.is_none());

        tracker.leave(1, 100).await;
        let exited = tracker.record(1, 100).await.unwrap();
        assert!(!exited.active);
        assert!(exited.exited_at.is_some());

        // Re-entry re-stamps the entry time and clears the exit.
        tracker.enter(1, 100).await;
        let reentered = tracker.record(1, 100).await.unwrap();
        assert!(reentered.active);
        assert!(reentered.exited_at.is_none());
        assert!(reentered.entered_at >= first.entered_at);
    }

    #[tokio::test]
    async fn test_leave_while_inactive_is_noop() {
        let tracker = PresenceTracker::new();
        let outcome = tracker.leave(1, 100).await;
        assert!(!outcome.changed);
        assert_eq!(outcome.active_count, 0);

        tracker.enter(1, 100).await;
        tracker.leave(1, 100).await;
        let again = tracker.leave(1, 100).await;
        assert!(!again.changed);
    }

    #[tokio::test]
    async fn test_counts_are_per_room() {
        let tracker = PresenceTracker::new();
        tracker.enter(1, 100).await;
        tracker.enter(2, 100).await;
        tracker.enter(1, 200).await;

        assert_eq!(tracker.active_count(100).await, 2);
        assert_eq!(tracker.active_count(200).await, 1);

        tracker.leave(2, 100).await;
        assert_eq!(tracker.active_count(100).await, 1);
    }

    #[tokio::test]
    async fn test_purge_room_clears_records() {
        let tracker = PresenceTracker::new();
        tracker.enter(1, 100).await;
        tracker.enter(2, 100).await;
        tracker.purge_room(100).await;
        assert_eq!(tracker.active_count(100).await, 0);

        // Entering again after a purge is a fresh first visit.
        let outcome = tracker.enter(1, 100).await;
        assert!(outcome.first_visit);
    }
}
