use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use rand::Rng;
use tokio::sync::RwLock;

use crate::debate::room::{Room, RoomId, UserId};
use crate::error::{DebateError, Result};

/// A resolved user identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub handle: String,
}

/// Handle → identity resolution. Registration itself (credentials, sessions)
/// lives outside this server; the directory only maps display handles to
/// stable ids.
pub struct UserDirectory {
    by_handle: Arc<RwLock<HashMap<String, UserId>>>,
    by_id: Arc<RwLock<HashMap<UserId, String>>>,
    next_id: Arc<RwLock<UserId>>,
}

impl UserDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            by_handle: Arc::new(RwLock::new(HashMap::new())),
            by_id: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(RwLock::new(1)),
        })
    }

    pub async fn resolve(&self, handle: &str) -> Result<User> {
        let by_handle = self.by_handle.read().await;
        by_handle
            .get(handle)
            .map(|id| User {
                id: *id,
                handle: handle.to_string(),
            })
            .ok_or_else(|| DebateError::UserNotFound(handle.to_string()))
    }

    pub async fn handle_of(&self, user_id: UserId) -> Option<String> {
        let by_id = self.by_id.read().await;
        by_id.get(&user_id).cloned()
    }

    /// Resolve a handle, registering it on first sight. Used by the HTTP
    /// entry points so the protocol engine itself only ever resolves.
    pub async fn get_or_register(&self, handle: &str) -> User {
        {
            let by_handle = self.by_handle.read().await;
            if let Some(id) = by_handle.get(handle) {
                return User {
                    id: *id,
                    handle: handle.to_string(),
                };
            }
        }

        let mut by_handle = self.by_handle.write().await;
        let mut by_id = self.by_id.write().await;
        // Re-check under the write lock; a racing register may have won.
        if let Some(id) = by_handle.get(handle) {
            return User {
                id: *id,
                handle: handle.to_string(),
            };
        }

        let mut next_id = self.next_id.write().await;
        let id = *next_id;
        *next_id += 1;
        by_handle.insert(handle.to_string(), id);
        by_id.insert(id, handle.to_string());
        tracing::info!(handle = %handle, user_id = id, "Registered user");
        User {
            id,
            handle: handle.to_string(),
        }
    }
}

/// In-memory room persistence. The engine drives everything through
/// load/save, so swapping a durable store in later only touches this type.
pub struct RoomStore {
    rooms: Arc<RwLock<HashMap<RoomId, Room>>>,
}

impl RoomStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Generate a random room ID
    fn generate_room_id() -> RoomId {
        let mut rng = rand::thread_rng();
        rng.gen_range(100_000..999_999)
    }

    pub async fn create(
        &self,
        title: String,
        topic: String,
        keywords: Vec<String>,
        creator: UserId,
    ) -> Result<Room> {
        let mut rooms = self.rooms.write().await;

        let mut room_id = Self::generate_room_id();
        while rooms.contains_key(&room_id) {
            room_id = Self::generate_room_id();
        }

        let room = Room::new(room_id, title, topic, keywords, creator);
        rooms.insert(room_id, room.clone());

        tracing::info!(room_id = room_id, creator = creator, "Room created");
        Ok(room)
    }

    pub async fn load(&self, room_id: RoomId) -> Result<Room> {
        let rooms = self.rooms.read().await;
        rooms
            .get(&room_id)
            .cloned()
            .ok_or(DebateError::RoomNotFound(room_id))
    }

    pub async fn save(&self, room: &Room) -> Result<()> {
        let mut rooms = self.rooms.write().await;
        rooms.insert(room.id, room.clone());
        Ok(())
    }

    pub async fn remove(&self, room_id: RoomId) -> Result<()> {
        let mut rooms = self.rooms.write().await;
        if rooms.remove(&room_id).is_none() {
            return Err(DebateError::RoomNotFound(room_id));
        }
        tracing::info!(room_id = room_id, "Room removed");
        Ok(())
    }

    pub async fn list(&self) -> Vec<Room> {
        let rooms = self.rooms.read().await;
        rooms.values().cloned().collect()
    }

    pub async fn find_pending_deletion(&self) -> Vec<Room> {
        let rooms = self.rooms.read().await;
        rooms
            .values()
            .filter(|r| r.scheduled_for_deletion)
            .cloned()
            .collect()
    }
}

/// A persisted debate-floor message (statements plus system notices).
#[derive(Debug, Clone)]
pub struct DebateMessage {
    pub room_id: RoomId,
    pub kind: String,
    pub content: String,
    pub sender: String,
    pub summary: Option<String>,
    pub created_at: SystemTime,
}

impl DebateMessage {
    pub fn new(room_id: RoomId, kind: &str, content: &str, sender: &str) -> Self {
        Self {
            room_id,
            kind: kind.to_string(),
            content: content.to_string(),
            sender: sender.to_string(),
            summary: None,
            created_at: SystemTime::now(),
        }
    }
}

/// A persisted spectator chat line.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub user_id: UserId,
    pub text: String,
    recorded_at: Instant,
}

/// Append-only log of debate and spectator messages, per room.
pub struct MessageLog {
    debate: Arc<RwLock<HashMap<RoomId, Vec<DebateMessage>>>>,
    chat: Arc<RwLock<HashMap<RoomId, Vec<ChatMessage>>>>,
}

impl MessageLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            debate: Arc::new(RwLock::new(HashMap::new())),
            chat: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub async fn append_debate(&self, message: DebateMessage) -> Result<()> {
        let mut debate = self.debate.write().await;
        debate.entry(message.room_id).or_default().push(message);
        Ok(())
    }

    pub async fn append_chat(&self, room_id: RoomId, user_id: UserId, text: &str) -> Result<()> {
        let mut chat = self.chat.write().await;
        chat.entry(room_id).or_default().push(ChatMessage {
            user_id,
            text: text.to_string(),
            recorded_at: Instant::now(),
        });
        Ok(())
    }

    /// Best-effort duplicate probe: an identical (text, room, sender) triple
    /// recorded inside the window. Approximate by design, not an idempotency
    /// key.
    pub async fn chat_exists_within(
        &self,
        room_id: RoomId,
        user_id: UserId,
        text: &str,
        window: Duration,
    ) -> bool {
        let chat = self.chat.read().await;
        chat.get(&room_id)
            .map(|messages| {
                messages.iter().rev().any(|m| {
                    m.user_id == user_id && m.text == text && m.recorded_at.elapsed() < window
                })
            })
            .unwrap_or(false)
    }

    /// Record the summary produced for the most recently appended message of
    /// a room.
    pub async fn attach_latest_summary(&self, room_id: RoomId, summary: &str) {
        let mut debate = self.debate.write().await;
        if let Some(message) = debate.get_mut(&room_id).and_then(|m| m.last_mut()) {
            message.summary = Some(summary.to_string());
        }
    }

    pub async fn debate_history(&self, room_id: RoomId) -> Vec<DebateMessage> {
        let debate = self.debate.read().await;
        debate.get(&room_id).cloned().unwrap_or_default()
    }

    pub async fn chat_history(&self, room_id: RoomId) -> Vec<String> {
        let chat = self.chat.read().await;
        chat.get(&room_id)
            .map(|messages| messages.iter().map(|m| m.text.clone()).collect())
            .unwrap_or_default()
    }

    /// Drop everything recorded for a room. Called when the sweep deletes it.
    pub async fn purge_room(&self, room_id: RoomId) {
        self.debate.write().await.remove(&room_id);
        self.chat.write().await.remove(&room_id);
    }
}
