use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use super::room::Room;

/// Inbound message types understood by the engine. Anything else arriving on
/// the wire maps to `Unknown` and is logged and dropped by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Chat,
    Debate,
    Ready,
    Forfeit,
    Exit,
    Ack,
    DebateEndRequest,
    DebateEndAccept,
    DebateEndReject,
    #[serde(other)]
    Unknown,
}

impl MessageKind {
    /// FORFEIT / EXIT / ACK all terminate the debate unconditionally.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageKind::Forfeit | MessageKind::Exit | MessageKind::Ack)
    }

    /// CHAT and DEBATE are both turn-holder statements on the debate floor.
    pub fn is_statement(&self) -> bool {
        matches!(self, MessageKind::Chat | MessageKind::Debate)
    }
}

/// The protocol envelope as it arrives from the real-time transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub content: String,
    pub sender: String,
    pub room_id: i64,
}

/// Outbound envelope broadcast on the room-scoped topics. Mirrors the inbound
/// shape so clients decode one frame format everywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub sender: String,
    pub room_id: i64,
}

impl ServerEvent {
    pub fn new(
        kind: impl Into<String>,
        content: impl Into<String>,
        sender: impl Into<String>,
        room_id: i64,
    ) -> Self {
        Self {
            kind: kind.into(),
            content: content.into(),
            sender: sender.into(),
            room_id,
        }
    }

    /// System-originated notice (start/end/turn/error and friends).
    pub fn system(kind: impl Into<String>, content: impl Into<String>, room_id: i64) -> Self {
        Self::new(kind, content, "System", room_id)
    }
}

/// Full room-state snapshot published on the status topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatus {
    pub room_id: i64,
    pub title: String,
    pub topic: String,
    pub keywords: Vec<String>,
    pub debater_a: Option<String>,
    pub debater_b: Option<String>,
    pub debater_a_ready: bool,
    pub debater_b_ready: bool,
    pub started: bool,
    pub active: bool,
    pub ended: bool,
    pub current_turn: Option<String>,
    pub current_participants: u32,
    pub total_visits: u64,
    /// Creation time as Unix seconds.
    pub created_at: u64,
}

impl RoomStatus {
    /// Snapshot a room, with seat ids already resolved to display handles.
    /// `ended` is explicit because a negotiated end reports `ended=true`
    /// while the room itself is still briefly active.
    pub fn snapshot(
        room: &Room,
        debater_a: Option<String>,
        debater_b: Option<String>,
        current_turn: Option<String>,
        ended: bool,
    ) -> Self {
        Self {
            room_id: room.id,
            title: room.title.clone(),
            topic: room.topic.clone(),
            keywords: room.keywords.clone(),
            debater_a,
            debater_b,
            debater_a_ready: room.debater_a_ready,
            debater_b_ready: room.debater_b_ready,
            started: room.started,
            active: room.active,
            ended,
            current_turn,
            current_participants: room.current_participants,
            total_visits: room.total_visits,
            created_at: room
                .created_at
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }
}

/// Active-participant count published on the participants topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantCount {
    pub room_id: i64,
    pub count: u32,
}

/// One frame on a broadcast topic.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    Event(ServerEvent),
    Status(RoomStatus),
    Participants(ParticipantCount),
}

/// Room-scoped topic names, one per outbound channel.
pub mod topics {
    pub fn room(room_id: i64) -> String {
        format!("room/{}", room_id)
    }

    pub fn error(room_id: i64) -> String {
        format!("error/{}", room_id)
    }

    pub fn summary(room_id: i64) -> String {
        format!("summary/{}", room_id)
    }

    pub fn turn(room_id: i64) -> String {
        format!("turn/{}", room_id)
    }

    pub fn chat(room_id: i64) -> String {
        format!("chat/{}", room_id)
    }

    pub fn status(room_id: i64) -> String {
        format!("room/{}/status", room_id)
    }

    pub fn participants(room_id: i64) -> String {
        format!("room/{}/participants", room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_envelope_decodes() {
        let raw = r#"{"type":"CHAT","content":"hello","sender":"alice","roomId":7}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.kind, MessageKind::Chat);
        assert_eq!(msg.content, "hello");
        assert_eq!(msg.sender, "alice");
        assert_eq!(msg.room_id, 7);
    }

    #[test]
    fn test_end_negotiation_kinds_decode() {
        let raw = r#"{"type":"DEBATE_END_REQUEST","content":"","sender":"bob","roomId":1}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.kind, MessageKind::DebateEndRequest);
    }

    #[test]
    fn test_unknown_type_maps_to_unknown() {
        let raw = r#"{"type":"DANCE","content":"","sender":"bob","roomId":1}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.kind, MessageKind::Unknown);
    }

    #[test]
    fn test_missing_content_defaults_empty() {
        let raw = r#"{"type":"READY","sender":"bob","roomId":1}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.content, "");
    }

    #[test]
    fn test_terminal_classification() {
        assert!(MessageKind::Forfeit.is_terminal());
        assert!(MessageKind::Ack.is_terminal());
        assert!(!MessageKind::Chat.is_terminal());
        assert!(MessageKind::Debate.is_statement());
    }

    #[test]
    fn test_server_event_wire_shape() {
        let event = ServerEvent::system("TURN", "alice", 3);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "TURN");
        assert_eq!(json["sender"], "System");
        assert_eq!(json["roomId"], 3);
    }

    #[test]
    fn test_topic_names() {
        assert_eq!(topics::room(5), "room/5");
        assert_eq!(topics::status(5), "room/5/status");
        assert_eq!(topics::participants(5), "room/5/participants");
        assert_eq!(topics::chat(5), "chat/5");
    }
}
