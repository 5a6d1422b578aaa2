use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, RwLock};

use super::negotiation::EndNegotiationTracker;
use super::presence::PresenceTracker;
use super::protocol::{
    topics, ClientMessage, MessageKind, Outbound, ParticipantCount, RoomStatus, ServerEvent,
};
use super::room::{Room, RoomId};
use super::summarizer::Summarizer;
use super::timer::TurnTimerManager;
use crate::broadcast::Broadcaster;
use crate::config::DebateConfig;
use crate::error::{DebateError, Result};
use crate::storage::{DebateMessage, MessageLog, RoomStore, User, UserDirectory};

/// The debate-room protocol engine.
///
/// Receives inbound protocol messages, validates them against room state,
/// mutates the room, and drives the timers, negotiation tracker, presence
/// ledger and broadcaster. It is the only component that mutates a room's
/// turn/readiness/active/seat fields, and every mutation for a given room
/// runs under that room's mutex so a chat message and a firing timeout can
/// never interleave.
pub struct DebateEngine {
    rooms: Arc<RoomStore>,
    users: Arc<UserDirectory>,
    messages: Arc<MessageLog>,
    broadcaster: Arc<Broadcaster>,
    timers: Arc<TurnTimerManager>,
    negotiations: Arc<EndNegotiationTracker>,
    presence: Arc<PresenceTracker>,
    summarizer: Arc<dyn Summarizer>,
    room_locks: RwLock<HashMap<RoomId, Arc<Mutex<()>>>>,
    config: DebateConfig,
}

impl DebateEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rooms: Arc<RoomStore>,
        users: Arc<UserDirectory>,
        messages: Arc<MessageLog>,
        broadcaster: Arc<Broadcaster>,
        timers: Arc<TurnTimerManager>,
        negotiations: Arc<EndNegotiationTracker>,
        presence: Arc<PresenceTracker>,
        summarizer: Arc<dyn Summarizer>,
        config: DebateConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            rooms,
            users,
            messages,
            broadcaster,
            timers,
            negotiations,
            presence,
            summarizer,
            room_locks: RwLock::new(HashMap::new()),
            config,
        })
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    pub fn rooms(&self) -> &Arc<RoomStore> {
        &self.rooms
    }

    pub fn users(&self) -> &Arc<UserDirectory> {
        &self.users
    }

    pub fn messages(&self) -> &Arc<MessageLog> {
        &self.messages
    }

    /// The mutex serializing every state mutation for a room.
    async fn room_lock(&self, room_id: RoomId) -> Arc<Mutex<()>> {
        {
            let locks = self.room_locks.read().await;
            if let Some(lock) = locks.get(&room_id) {
                return lock.clone();
            }
        }
        let mut locks = self.room_locks.write().await;
        locks
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn drop_room_lock(&self, room_id: RoomId) {
        let mut locks = self.room_locks.write().await;
        locks.remove(&room_id);
    }

    // ---------------------------------------------------------------------
    // Inbound dispatch (debate channel)
    // ---------------------------------------------------------------------

    /// Route one inbound protocol message. Validation failures are reported
    /// on the room's error topic and leave state unchanged; lookup failures
    /// surface to the caller.
    pub async fn dispatch(self: &Arc<Self>, msg: ClientMessage) -> Result<()> {
        if msg.kind == MessageKind::Unknown {
            tracing::warn!(room_id = msg.room_id, sender = %msg.sender, "Dropping message of unknown type");
            return Ok(());
        }

        let sender = self.users.resolve(&msg.sender).await?;

        let lock = self.room_lock(msg.room_id).await;
        let _guard = lock.lock().await;

        let room = self.rooms.load(msg.room_id).await?;
        let room_id = room.id;

        let result = match msg.kind {
            kind if kind.is_statement() => self.handle_statement(&sender, room, &msg).await,
            kind if kind.is_terminal() => self.handle_terminal(&sender, room, msg.kind).await,
            MessageKind::Ready => self.handle_ready(&sender, room).await,
            MessageKind::DebateEndRequest => self.handle_end_request(&sender, room).await,
            MessageKind::DebateEndAccept => self.handle_end_accept(&sender, room).await,
            MessageKind::DebateEndReject => self.handle_end_reject(&sender, room).await,
            _ => Ok(()),
        };

        match result {
            Err(e) if e.is_validation() => {
                tracing::debug!(room_id = room_id, sender = %sender.handle, error = %e, "Rejected protocol message");
                self.broadcaster
                    .publish(
                        &topics::error(room_id),
                        Outbound::Event(ServerEvent::system("ERROR", e.to_string(), room_id)),
                    )
                    .await;
                Ok(())
            }
            other => other,
        }
    }

    /// CHAT / DEBATE: a turn-holder statement on the debate floor.
    async fn handle_statement(
        self: &Arc<Self>,
        sender: &User,
        mut room: Room,
        msg: &ClientMessage,
    ) -> Result<()> {
        if !room.started {
            return Err(DebateError::NotStarted);
        }
        if !room.holds_turn(sender.id) {
            return Err(DebateError::WrongTurn);
        }

        // The statement consumes the running turn timer.
        self.timers.cancel(room.id).await;

        let kind = if msg.kind == MessageKind::Debate {
            "DEBATE"
        } else {
            "CHAT"
        };
        self.messages
            .append_debate(DebateMessage::new(room.id, kind, &msg.content, &sender.handle))
            .await?;

        self.broadcaster
            .publish(
                &topics::room(room.id),
                Outbound::Event(ServerEvent::new(kind, &msg.content, &sender.handle, room.id)),
            )
            .await;

        // Summaries are optional: a failed summarizer call loses the summary,
        // never the statement.
        match self.summarizer.summarize(&msg.content).await {
            Ok(summary) => {
                self.messages.attach_latest_summary(room.id, &summary).await;
                self.broadcaster
                    .publish(
                        &topics::summary(room.id),
                        Outbound::Event(ServerEvent::new("SUMMARY", summary, "AI", room.id)),
                    )
                    .await;
            }
            Err(e) => {
                tracing::error!(room_id = room.id, error = %e, "Summarizer failed, skipping summary");
            }
        }

        room.flip_turn();
        self.rooms.save(&room).await?;
        self.announce_turn(&room).await;
        self.start_turn_timer(room.id).await;

        tracing::info!(room_id = room.id, sender = %sender.handle, "Statement accepted, turn flipped");
        Ok(())
    }

    /// READY: toggle the sender's ready flag; both flags up starts the debate.
    async fn handle_ready(self: &Arc<Self>, sender: &User, mut room: Room) -> Result<()> {
        if room.started {
            return Err(DebateError::AlreadyStarted);
        }

        let mut changed = false;
        if sender.id == room.debater_a && !room.debater_a_ready {
            room.debater_a_ready = true;
            changed = true;
        } else if room.debater_b == Some(sender.id) && !room.debater_b_ready {
            room.debater_b_ready = true;
            changed = true;
        }

        if changed {
            self.broadcaster
                .publish(
                    &topics::room(room.id),
                    Outbound::Event(ServerEvent::system(
                        "READY",
                        format!("{} is ready.", sender.handle),
                        room.id,
                    )),
                )
                .await;
        }

        if room.debater_a_ready && room.debater_b_ready && !room.started {
            room.started = true;
            room.current_turn_user_id = Some(room.debater_a);

            self.messages
                .append_debate(DebateMessage::new(room.id, "INFO", "The debate has started", "System"))
                .await?;
            self.rooms.save(&room).await?;

            let first = self
                .users
                .handle_of(room.debater_a)
                .await
                .unwrap_or_default();
            self.broadcaster
                .publish(
                    &topics::room(room.id),
                    Outbound::Event(ServerEvent::system(
                        "START",
                        format!("The debate has started. {} goes first.", first),
                        room.id,
                    )),
                )
                .await;

            self.start_turn_timer(room.id).await;
            tracing::info!(room_id = room.id, first_turn = %first, "Debate started");
            return Ok(());
        }

        self.rooms.save(&room).await?;
        Ok(())
    }

    /// FORFEIT / EXIT / ACK: unconditional end of the debate.
    async fn handle_terminal(
        &self,
        sender: &User,
        mut room: Room,
        kind: MessageKind,
    ) -> Result<()> {
        let reason = match kind {
            MessageKind::Forfeit => format!("{} forfeited the debate.", sender.handle),
            MessageKind::Exit => format!("{} left the debate room.", sender.handle),
            _ => "The debate has ended.".to_string(),
        };

        room.active = false;
        room.end_debate();
        self.rooms.save(&room).await?;

        self.messages
            .append_debate(DebateMessage::new(room.id, "END", &reason, "System"))
            .await?;
        self.broadcaster
            .publish(
                &topics::room(room.id),
                Outbound::Event(ServerEvent::system("END", reason, room.id)),
            )
            .await;

        self.timers.cancel(room.id).await;
        self.negotiations.clear(room.id).await;

        tracing::info!(room_id = room.id, kind = ?kind, sender = %sender.handle, "Debate ended");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // End-negotiation sub-protocol
    // ---------------------------------------------------------------------

    async fn handle_end_request(&self, sender: &User, room: Room) -> Result<()> {
        if !room.started {
            return Err(DebateError::NotStarted);
        }
        if !room.is_debater(sender.id) {
            return Err(DebateError::NotDebater);
        }
        self.negotiations.begin(room.id, sender.id).await?;

        let notice = format!("{} requested to end the debate.", sender.handle);
        self.messages
            .append_debate(DebateMessage::new(room.id, "SYSTEM", &notice, "System"))
            .await?;
        self.broadcaster
            .publish(
                &topics::room(room.id),
                Outbound::Event(ServerEvent::new(
                    "DEBATE_END_REQUEST",
                    notice,
                    &sender.handle,
                    room.id,
                )),
            )
            .await;
        Ok(())
    }

    async fn handle_end_accept(&self, sender: &User, mut room: Room) -> Result<()> {
        let pending = self
            .negotiations
            .pending_for(room.id)
            .await
            .ok_or(DebateError::NoPendingRequest)?;
        if !room.is_debater(sender.id) {
            return Err(DebateError::NotDebater);
        }
        if pending.requested_by == sender.id {
            return Err(DebateError::SelfDecisionNotAllowed);
        }

        self.negotiations.resolve(room.id).await;
        room.end_debate();
        self.timers.cancel(room.id).await;
        self.rooms.save(&room).await?;

        let notice = format!("{} accepted. The debate has ended.", sender.handle);
        self.messages
            .append_debate(DebateMessage::new(room.id, "END", &notice, "System"))
            .await?;
        self.broadcaster
            .publish(
                &topics::room(room.id),
                Outbound::Event(ServerEvent::new(
                    "DEBATE_END_ACCEPT",
                    notice,
                    &sender.handle,
                    room.id,
                )),
            )
            .await;

        let status = self.status_of(&room, true).await;
        self.broadcaster
            .publish(&topics::status(room.id), Outbound::Status(status))
            .await;

        tracing::info!(room_id = room.id, accepted_by = %sender.handle, "Negotiated end of debate");
        Ok(())
    }

    async fn handle_end_reject(&self, sender: &User, room: Room) -> Result<()> {
        let pending = self
            .negotiations
            .pending_for(room.id)
            .await
            .ok_or(DebateError::NoPendingRequest)?;
        if !room.is_debater(sender.id) {
            return Err(DebateError::NotDebater);
        }
        if pending.requested_by == sender.id {
            return Err(DebateError::SelfDecisionNotAllowed);
        }

        // The debate continues untouched: turn, timer and readiness all stay.
        self.negotiations.resolve(room.id).await;
        self.broadcaster
            .publish(
                &topics::room(room.id),
                Outbound::Event(ServerEvent::new(
                    "DEBATE_END_REJECT",
                    format!("{} rejected the end-of-debate request.", sender.handle),
                    &sender.handle,
                    room.id,
                )),
            )
            .await;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Turn timeout
    // ---------------------------------------------------------------------

    // Boxed to break the recursive-async `Send` inference cycle: the timer
    // callback calls `handle_turn_timeout`, which re-arms the timer via
    // `start_turn_timer`. An explicit `Send` future type breaks the loop.
    fn start_turn_timer(
        self: &Arc<Self>,
        room_id: RoomId,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        let this = self.clone();
        Box::pin(async move {
            let engine = this.clone();
            this.timers
                .start(room_id, move |generation| async move {
                    if let Err(e) = engine.handle_turn_timeout(room_id, generation).await {
                        tracing::error!(room_id = room_id, error = %e, "Turn timeout handler failed");
                    }
                })
                .await;
        })
    }

    /// Timeout body. Claims its generation under the room lock so it can
    /// never race a statement handler that already consumed the timer.
    async fn handle_turn_timeout(self: &Arc<Self>, room_id: RoomId, generation: u64) -> Result<()> {
        let lock = self.room_lock(room_id).await;
        let _guard = lock.lock().await;

        if !self.timers.try_claim(room_id, generation).await {
            return Ok(());
        }

        let mut room = match self.rooms.load(room_id).await {
            Ok(room) => room,
            // Room deleted while the timer slept.
            Err(_) => return Ok(()),
        };
        if !room.started {
            return Ok(());
        }

        let holder = match room.current_turn_user_id {
            Some(id) => self.users.handle_of(id).await.unwrap_or_default(),
            None => String::new(),
        };
        let notice = format!("{} ran out of time; the turn is forfeited.", holder);

        self.messages
            .append_debate(DebateMessage::new(room_id, "SYSTEM", &notice, "System"))
            .await?;
        self.broadcaster
            .publish(
                &topics::room(room_id),
                Outbound::Event(ServerEvent::system("SYSTEM", notice, room_id)),
            )
            .await;

        room.flip_turn();
        self.rooms.save(&room).await?;
        self.announce_turn(&room).await;
        self.start_turn_timer(room_id).await;

        tracing::info!(room_id = room_id, forfeited_by = %holder, "Turn forfeited by timeout");
        Ok(())
    }

    async fn announce_turn(&self, room: &Room) {
        let next = match room.current_turn_user_id {
            Some(id) => self.users.handle_of(id).await.unwrap_or_default(),
            None => return,
        };
        self.broadcaster
            .publish(
                &topics::turn(room.id),
                Outbound::Event(ServerEvent::system("TURN", next, room.id)),
            )
            .await;
    }

    // ---------------------------------------------------------------------
    // Spectator chat (bypasses turn validation entirely)
    // ---------------------------------------------------------------------

    pub async fn dispatch_chat(&self, msg: ClientMessage) -> Result<()> {
        let room = self.rooms.load(msg.room_id).await?;

        // Unknown senders are dropped without an error event.
        let user = match self.users.resolve(&msg.sender).await {
            Ok(user) => user,
            Err(_) => {
                tracing::debug!(room_id = room.id, sender = %msg.sender, "Dropping chat from unknown sender");
                return Ok(());
            }
        };

        let line = format!("{}: {}", msg.sender, msg.content);
        if self
            .messages
            .chat_exists_within(room.id, user.id, &line, self.config.duplicate_window)
            .await
        {
            tracing::debug!(room_id = room.id, sender = %msg.sender, "Suppressed duplicate chat message");
            return Ok(());
        }

        // Persist first; a failed persist drops the message rather than
        // notifying spectators of a line that was never recorded.
        if let Err(e) = self.messages.append_chat(room.id, user.id, &line).await {
            tracing::error!(room_id = room.id, error = %e, "Failed to persist chat message");
            return Ok(());
        }

        self.broadcaster
            .publish(
                &topics::chat(room.id),
                Outbound::Event(ServerEvent::new("CHAT", &msg.content, &user.handle, room.id)),
            )
            .await;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Room lifecycle: creation, seats, presence, departure, deletion
    // ---------------------------------------------------------------------

    pub async fn create_room(
        &self,
        title: String,
        topic: String,
        keywords: Vec<String>,
        creator: &User,
    ) -> Result<RoomStatus> {
        let room = self.rooms.create(title, topic, keywords, creator.id).await?;
        Ok(self.status_of(&room, false).await)
    }

    pub async fn room_status(&self, room_id: RoomId) -> Result<RoomStatus> {
        let room = self.rooms.load(room_id).await?;
        let ended = !room.active;
        Ok(self.status_of(&room, ended).await)
    }

    pub async fn list_rooms(&self) -> Vec<RoomStatus> {
        let mut statuses = Vec::new();
        for room in self.rooms.list().await {
            let ended = !room.active;
            statuses.push(self.status_of(&room, ended).await);
        }
        statuses
    }

    /// Claim the second debater seat.
    pub async fn join_as_debater_b(&self, room_id: RoomId, user: &User) -> Result<RoomStatus> {
        let lock = self.room_lock(room_id).await;
        let _guard = lock.lock().await;

        let mut room = self.rooms.load(room_id).await?;
        if !room.active {
            return Err(DebateError::RoomInactive(room_id));
        }
        // Joining a room you already debate in is a no-op.
        if room.debater_a == user.id || room.debater_b == Some(user.id) {
            return Ok(self.status_of(&room, false).await);
        }
        if room.debater_b.is_some() {
            return Err(DebateError::RoomFull);
        }

        room.debater_b = Some(user.id);
        self.rooms.save(&room).await?;

        self.broadcaster
            .publish(
                &topics::room(room_id),
                Outbound::Event(ServerEvent::system(
                    "SYSTEM",
                    format!("{} joined as debater B.", user.handle),
                    room_id,
                )),
            )
            .await;
        let status = self.status_of(&room, false).await;
        self.broadcaster
            .publish(&topics::status(room_id), Outbound::Status(status.clone()))
            .await;

        tracing::info!(room_id = room_id, debater_b = %user.handle, "Debater B seated");
        Ok(status)
    }

    /// A participant enters the room (spectator or debater alike).
    pub async fn enter_room(&self, room_id: RoomId, user: &User) -> Result<u32> {
        let lock = self.room_lock(room_id).await;
        let _guard = lock.lock().await;

        let mut room = self.rooms.load(room_id).await?;
        let outcome = self.presence.enter(user.id, room_id).await;
        if !outcome.changed {
            return Ok(outcome.active_count);
        }

        room.current_participants = outcome.active_count;
        if outcome.first_visit && !room.is_debater(user.id) {
            room.total_visits += 1;
        }
        self.rooms.save(&room).await?;
        self.announce_participants(room_id, outcome.active_count).await;
        Ok(outcome.active_count)
    }

    /// A participant leaves. Spectator departure only adjusts presence; a
    /// seated debater's departure tears debate state down as well.
    pub async fn leave_room(&self, room_id: RoomId, user: &User) -> Result<()> {
        let lock = self.room_lock(room_id).await;
        let _guard = lock.lock().await;

        let mut room = self.rooms.load(room_id).await?;

        if room.debater_b == Some(user.id) {
            return self.debater_b_leave(room, user).await;
        }

        if room.debater_a == user.id {
            // Owner departure never deletes the room here; deletion is an
            // explicit owner operation. Pending timers and negotiation state
            // still come down.
            self.timers.cancel(room_id).await;
            self.negotiations.clear(room_id).await;
        }

        let outcome = self.presence.leave(user.id, room_id).await;
        if outcome.changed {
            room.current_participants = outcome.active_count;
            self.rooms.save(&room).await?;
            self.announce_participants(room_id, outcome.active_count).await;
        }
        Ok(())
    }

    /// Debater B leaving clears the seat; mid-debate it forces an end and
    /// schedules the room for deletion after the grace period.
    async fn debater_b_leave(&self, mut room: Room, user: &User) -> Result<()> {
        let room_id = room.id;
        let was_started = room.started;

        room.debater_b = None;
        room.debater_b_ready = false;

        let outcome = self.presence.leave(user.id, room_id).await;
        if outcome.changed {
            room.current_participants = outcome.active_count;
        }

        if was_started {
            room.end_debate();
            room.scheduled_for_deletion = true;
            room.deletion_time = Some(Instant::now() + self.config.deletion_grace);

            self.timers.cancel(room_id).await;
            self.negotiations.clear(room_id).await;
        }

        self.rooms.save(&room).await?;

        if was_started {
            let grace_mins = self.config.deletion_grace.as_secs() / 60;
            self.broadcaster
                .publish(
                    &topics::room(room_id),
                    Outbound::Event(ServerEvent::system(
                        "SYSTEM",
                        format!(
                            "Debater B {} left. The debate is over; the room will be deleted in {} minutes.",
                            user.handle, grace_mins
                        ),
                        room_id,
                    )),
                )
                .await;
            self.broadcaster
                .publish(
                    &topics::room(room_id),
                    Outbound::Event(ServerEvent::system("INFO", "The debate has ended.", room_id)),
                )
                .await;
        } else {
            self.broadcaster
                .publish(
                    &topics::room(room_id),
                    Outbound::Event(ServerEvent::system(
                        "SYSTEM",
                        format!("{} left the debater B seat.", user.handle),
                        room_id,
                    )),
                )
                .await;
        }

        let status = self.status_of(&room, was_started).await;
        self.broadcaster
            .publish(&topics::status(room_id), Outbound::Status(status))
            .await;
        if outcome.changed {
            self.announce_participants(room_id, outcome.active_count).await;
        }

        tracing::info!(room_id = room_id, debater_b = %user.handle, forced_end = was_started, "Debater B left");
        Ok(())
    }

    /// Owner-only immediate room deletion.
    pub async fn delete_room(&self, room_id: RoomId, user: &User) -> Result<()> {
        let lock = self.room_lock(room_id).await;
        let _guard = lock.lock().await;

        let room = self.rooms.load(room_id).await?;
        if room.debater_a != user.id {
            return Err(DebateError::NotOwner);
        }

        self.broadcaster
            .publish(
                &topics::room(room_id),
                Outbound::Event(ServerEvent::system(
                    "SYSTEM",
                    "The host closed the room.",
                    room_id,
                )),
            )
            .await;
        self.teardown_room(room_id).await?;
        tracing::info!(room_id = room_id, owner = %user.handle, "Room deleted by owner");
        Ok(())
    }

    /// Delete rooms whose post-departure grace period has expired. Invoked
    /// by the periodic sweep; callable directly from tests.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut deleted = 0;

        for room in self.rooms.find_pending_deletion().await {
            let due = room.deletion_time.map(|t| t <= now).unwrap_or(false);
            if !due {
                continue;
            }

            let lock = self.room_lock(room.id).await;
            let _guard = lock.lock().await;

            // Re-check under the lock; the room may have been deleted or
            // rescued since the scan.
            match self.rooms.load(room.id).await {
                Ok(current)
                    if current.scheduled_for_deletion
                        && current.deletion_time.map(|t| t <= now).unwrap_or(false) =>
                {
                    if let Err(e) = self.teardown_room(room.id).await {
                        tracing::error!(room_id = room.id, error = %e, "Sweep failed to delete room");
                    } else {
                        deleted += 1;
                        tracing::info!(room_id = room.id, "Sweep deleted room");
                    }
                }
                _ => {}
            }
        }
        deleted
    }

    async fn teardown_room(&self, room_id: RoomId) -> Result<()> {
        self.timers.cancel(room_id).await;
        self.negotiations.clear(room_id).await;
        self.presence.purge_room(room_id).await;
        self.messages.purge_room(room_id).await;
        self.rooms.remove(room_id).await?;
        self.drop_room_lock(room_id).await;
        Ok(())
    }

    async fn announce_participants(&self, room_id: RoomId, count: u32) {
        self.broadcaster
            .publish(
                &topics::participants(room_id),
                Outbound::Participants(ParticipantCount { room_id, count }),
            )
            .await;
    }

    async fn status_of(&self, room: &Room, ended: bool) -> RoomStatus {
        let debater_a = self.users.handle_of(room.debater_a).await;
        let debater_b = match room.debater_b {
            Some(id) => self.users.handle_of(id).await,
            None => None,
        };
        let current_turn = match room.current_turn_user_id {
            Some(id) => self.users.handle_of(id).await,
            None => None,
        };
        RoomStatus::snapshot(room, debater_a, debater_b, current_turn, ended)
    }
}
