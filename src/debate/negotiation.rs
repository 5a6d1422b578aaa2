use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::room::{RoomId, UserId};
use crate::error::{DebateError, Result};

/// An outstanding mutual end-of-debate request.
#[derive(Debug, Clone, Copy)]
pub struct PendingEndRequest {
    pub requested_by: UserId,
}

/// Owns the at-most-one pending end-request invariant per room. The guard
/// checks that need room state (debate started, sender is a debater, sender
/// is not the requester) live in the engine; this tracker only arbitrates
/// the slot.
pub struct EndNegotiationTracker {
    pending: Arc<RwLock<HashMap<RoomId, PendingEndRequest>>>,
}

impl EndNegotiationTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pending: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Record a new request; fails when one is already outstanding.
    pub async fn begin(&self, room_id: RoomId, requested_by: UserId) -> Result<()> {
        let mut pending = self.pending.write().await;
        if pending.contains_key(&room_id) {
            return Err(DebateError::RequestInFlight);
        }
        pending.insert(room_id, PendingEndRequest { requested_by });
        tracing::info!(room_id = room_id, requested_by = requested_by, "End-of-debate requested");
        Ok(())
    }

    pub async fn pending_for(&self, room_id: RoomId) -> Option<PendingEndRequest> {
        let pending = self.pending.read().await;
        pending.get(&room_id).copied()
    }

    /// Take and clear the pending request, if any.
    pub async fn resolve(&self, room_id: RoomId) -> Option<PendingEndRequest> {
        let mut pending = self.pending.write().await;
        pending.remove(&room_id)
    }

    /// Drop any pending request without caring whether one existed. Used by
    /// terminal transitions and room teardown.
    pub async fn clear(&self, room_id: RoomId) {
        let mut pending = self.pending.write().await;
        if pending.remove(&room_id).is_some() {
            tracing::debug!(room_id = room_id, "Cleared pending end-of-debate request");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_request_per_room() {
        let tracker = EndNegotiationTracker::new();
        tracker.begin(1, 10).await.unwrap();

        assert!(matches!(
            tracker.begin(1, 20).await,
            Err(DebateError::RequestInFlight)
        ));
        // Other rooms are unaffected.
        tracker.begin(2, 10).await.unwrap();
    }

    #[tokio::test]
    async fn test_resolve_clears_the_slot() {
        let tracker = EndNegotiationTracker::new();
        tracker.begin(1, 10).await.unwrap();

        let taken = tracker.resolve(1).await.unwrap();
        assert_eq!(taken.requested_by, 10);
        assert!(tracker.pending_for(1).await.is_none());

        // Slot is free again.
        tracker.begin(1, 20).await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let tracker = EndNegotiationTracker::new();
        tracker.clear(1).await;
        tracker.begin(1, 10).await.unwrap();
        tracker.clear(1).await;
        tracker.clear(1).await;
        assert!(tracker.pending_for(1).await.is_none());
    }
}
