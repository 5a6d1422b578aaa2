use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use warp::ws::{Message, WebSocket};

use crate::debate::protocol::{topics, ClientMessage, Outbound, ServerEvent};
use crate::debate::DebateEngine;

/// Debate-channel connection: subscribes to every topic of one room and
/// feeds inbound protocol messages to the engine.
pub async fn handle_debate_socket(websocket: WebSocket, room_id: i64, engine: Arc<DebateEngine>) {
    tracing::info!(room_id = room_id, "New debate WebSocket connection");

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // Spawn task to send messages to client
    let sender_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sender.send(message).await {
                tracing::error!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    // Full snapshot on join, so a late subscriber starts from current state.
    match engine.room_status(room_id).await {
        Ok(status) => send_frame(&tx, &Outbound::Status(status)),
        Err(e) => {
            tracing::warn!(room_id = room_id, error = %e, "Rejecting connection to unknown room");
            send_frame(
                &tx,
                &Outbound::Event(ServerEvent::system("ERROR", e.to_string(), room_id)),
            );
            // Let the sender drain the error frame before closing.
            drop(tx);
            let _ = sender_task.await;
            return;
        }
    }

    let debate_topics = [
        topics::room(room_id),
        topics::error(room_id),
        topics::summary(room_id),
        topics::turn(room_id),
        topics::status(room_id),
        topics::participants(room_id),
    ];
    let forward_tasks = subscribe_and_forward(&engine, &debate_topics, tx.clone()).await;

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(message) => handle_inbound(&engine, room_id, message, &tx, false).await,
            Err(e) => {
                tracing::error!(error = %e, "WebSocket error");
                break;
            }
        }
    }

    for task in forward_tasks {
        task.abort();
    }
    sender_task.abort();
    tracing::info!(room_id = room_id, "Debate WebSocket connection closed");
}

/// Spectator-chat connection: chat topic only, no turn validation on the way
/// in.
pub async fn handle_chat_socket(websocket: WebSocket, room_id: i64, engine: Arc<DebateEngine>) {
    tracing::info!(room_id = room_id, "New chat WebSocket connection");

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let sender_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sender.send(message).await {
                tracing::error!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    let chat_topics = [topics::chat(room_id)];
    let forward_tasks = subscribe_and_forward(&engine, &chat_topics, tx.clone()).await;

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(message) => handle_inbound(&engine, room_id, message, &tx, true).await,
            Err(e) => {
                tracing::error!(error = %e, "WebSocket error");
                break;
            }
        }
    }

    for task in forward_tasks {
        task.abort();
    }
    sender_task.abort();
    tracing::info!(room_id = room_id, "Chat WebSocket connection closed");
}

/// One forwarding task per subscribed topic, each draining a broadcast
/// receiver into this connection's sender.
async fn subscribe_and_forward(
    engine: &Arc<DebateEngine>,
    topic_names: &[String],
    tx: mpsc::UnboundedSender<Message>,
) -> Vec<JoinHandle<()>> {
    let mut tasks = Vec::with_capacity(topic_names.len());
    for topic in topic_names {
        let mut receiver = engine.broadcaster().subscribe(topic).await;
        let tx = tx.clone();
        let topic = topic.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(frame) => send_frame(&tx, &frame),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(topic = %topic, skipped = skipped, "Slow subscriber dropped frames");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }
    tasks
}

async fn handle_inbound(
    engine: &Arc<DebateEngine>,
    room_id: i64,
    message: Message,
    tx: &mpsc::UnboundedSender<Message>,
    spectator_chat: bool,
) {
    let Ok(text) = message.to_str() else {
        return;
    };
    tracing::debug!(room_id = room_id, "Received message: {}", text);

    let parsed = match serde_json::from_str::<ClientMessage>(text) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::error!(error = %e, raw_message = %text, "Failed to parse protocol message");
            return;
        }
    };

    // The connection is scoped to one room; a mismatched envelope is a
    // client bug, not a routing instruction.
    if parsed.room_id != room_id {
        tracing::warn!(
            connection_room = room_id,
            message_room = parsed.room_id,
            "Dropping message addressed to a different room"
        );
        return;
    }

    let result = if spectator_chat {
        engine.dispatch_chat(parsed).await
    } else {
        engine.dispatch(parsed).await
    };

    if let Err(e) = result {
        // Lookup failures go back to this caller only; everything else was
        // already routed or logged downstream.
        tracing::warn!(room_id = room_id, error = %e, "Dispatch failed");
        send_frame(
            tx,
            &Outbound::Event(ServerEvent::system("ERROR", e.to_string(), room_id)),
        );
    }
}

fn send_frame(tx: &mpsc::UnboundedSender<Message>, frame: &Outbound) {
    match serde_json::to_string(frame) {
        Ok(text) => {
            let _ = tx.send(Message::text(text));
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize outbound frame");
        }
    }
}
