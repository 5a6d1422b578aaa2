use std::time::{Instant, SystemTime};

pub type RoomId = i64;
pub type UserId = i64;

/// One debate session. The engine is the only component that mutates the
/// turn/readiness/active/seat fields; everything else sees clones.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub title: String,
    pub topic: String,
    pub keywords: Vec<String>,
    /// Seat A is always the room creator.
    pub debater_a: UserId,
    /// Seat B stays empty until someone claims it.
    pub debater_b: Option<UserId>,
    pub debater_a_ready: bool,
    pub debater_b_ready: bool,
    pub started: bool,
    pub active: bool,
    /// Holds the floor; only meaningful while `started`.
    pub current_turn_user_id: Option<UserId>,
    pub current_participants: u32,
    pub total_visits: u64,
    pub scheduled_for_deletion: bool,
    pub deletion_time: Option<Instant>,
    pub created_at: SystemTime,
}

impl Room {
    pub fn new(id: RoomId, title: String, topic: String, keywords: Vec<String>, creator: UserId) -> Self {
        Self {
            id,
            title,
            topic,
            keywords,
            debater_a: creator,
            debater_b: None,
            debater_a_ready: false,
            debater_b_ready: false,
            started: false,
            active: true,
            current_turn_user_id: None,
            current_participants: 0,
            total_visits: 0,
            scheduled_for_deletion: false,
            deletion_time: None,
            created_at: SystemTime::now(),
        }
    }

    pub fn is_debater(&self, user_id: UserId) -> bool {
        self.debater_a == user_id || self.debater_b == Some(user_id)
    }

    pub fn holds_turn(&self, user_id: UserId) -> bool {
        self.current_turn_user_id == Some(user_id)
    }

    /// The seat opposite `user_id`, when both seats are filled and `user_id`
    /// occupies one of them.
    pub fn other_debater(&self, user_id: UserId) -> Option<UserId> {
        let b = self.debater_b?;
        if user_id == self.debater_a {
            Some(b)
        } else if user_id == b {
            Some(self.debater_a)
        } else {
            None
        }
    }

    /// Hand the floor to the opposite seat. No-op when the current holder is
    /// unset or has no opponent.
    pub fn flip_turn(&mut self) {
        if let Some(holder) = self.current_turn_user_id {
            if let Some(next) = self.other_debater(holder) {
                self.current_turn_user_id = Some(next);
            }
        }
    }

    /// Readiness is cleared whenever a debate ends or a debater leaves.
    pub fn clear_ready(&mut self) {
        self.debater_a_ready = false;
        self.debater_b_ready = false;
    }

    /// Forced end: departure mid-debate or a negotiated conclusion.
    pub fn end_debate(&mut self) {
        self.started = false;
        self.clear_ready();
        self.current_turn_user_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Room {
        let mut r = Room::new(1, "T".into(), "X".into(), vec![], 10);
        r.debater_b = Some(20);
        r
    }

    #[test]
    fn test_other_debater() {
        let r = room();
        assert_eq!(r.other_debater(10), Some(20));
        assert_eq!(r.other_debater(20), Some(10));
        assert_eq!(r.other_debater(99), None);
    }

    #[test]
    fn test_other_debater_with_empty_seat() {
        let mut r = room();
        r.debater_b = None;
        assert_eq!(r.other_debater(10), None);
    }

    #[test]
    fn test_flip_turn() {
        let mut r = room();
        r.started = true;
        r.current_turn_user_id = Some(10);
        r.flip_turn();
        assert_eq!(r.current_turn_user_id, Some(20));
        r.flip_turn();
        assert_eq!(r.current_turn_user_id, Some(10));
    }

    #[test]
    fn test_end_debate_clears_turn_and_ready() {
        let mut r = room();
        r.started = true;
        r.debater_a_ready = true;
        r.debater_b_ready = true;
        r.current_turn_user_id = Some(10);

        r.end_debate();

        assert!(!r.started);
        assert!(!r.debater_a_ready);
        assert!(!r.debater_b_ready);
        assert_eq!(r.current_turn_user_id, None);
    }
}
