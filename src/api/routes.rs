use std::convert::Infallible;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::Filter;

use super::websocket;
use crate::debate::DebateEngine;
use crate::error::DebateError;

#[derive(Debug, Deserialize)]
struct CreateRoomRequest {
    title: String,
    topic: String,
    #[serde(default)]
    keywords: Vec<String>,
    nickname: String,
}

#[derive(Debug, Deserialize)]
struct NicknameRequest {
    nickname: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageDto {
    #[serde(rename = "type")]
    kind: String,
    content: String,
    sender: String,
    summary: Option<String>,
    /// Unix seconds.
    created_at: u64,
}

/// The full route tree: both WebSocket channels plus the HTTP entry points
/// the engine operations need.
pub fn debate_routes(
    engine: Arc<DebateEngine>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    debate_websocket_route(engine.clone())
        .or(chat_websocket_route(engine.clone()))
        .or(health_check())
        .or(list_rooms(engine.clone()))
        .or(create_room(engine.clone()))
        .or(get_room(engine.clone()))
        .or(room_messages(engine.clone()))
        .or(room_chat_history(engine.clone()))
        .or(join_room(engine.clone()))
        .or(enter_room(engine.clone()))
        .or(leave_room(engine.clone()))
        .or(delete_room(engine))
}

/// Turn-protocol channel, one connection per room.
pub fn debate_websocket_route(
    engine: Arc<DebateEngine>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("ws" / "debate" / i64)
        .and(warp::ws())
        .and(with_engine(engine))
        .map(|room_id: i64, ws: warp::ws::Ws, engine: Arc<DebateEngine>| {
            ws.on_upgrade(move |websocket| {
                websocket::handle_debate_socket(websocket, room_id, engine)
            })
        })
}

/// Spectator-chat channel; bypasses turn validation entirely.
pub fn chat_websocket_route(
    engine: Arc<DebateEngine>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("ws" / "chat" / i64)
        .and(warp::ws())
        .and(with_engine(engine))
        .map(|room_id: i64, ws: warp::ws::Ws, engine: Arc<DebateEngine>| {
            ws.on_upgrade(move |websocket| {
                websocket::handle_chat_socket(websocket, room_id, engine)
            })
        })
}

pub fn health_check() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("health").and(warp::get()).map(|| {
        warp::reply::json(&serde_json::json!({
            "status": "healthy",
            "service": "Debate Server",
            "version": "1.0.0"
        }))
    })
}

fn list_rooms(
    engine: Arc<DebateEngine>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "rooms")
        .and(warp::get())
        .and(with_engine(engine))
        .and_then(|engine: Arc<DebateEngine>| async move {
            ok_json(&engine.list_rooms().await)
        })
}

fn create_room(
    engine: Arc<DebateEngine>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "rooms")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_engine(engine))
        .and_then(|req: CreateRoomRequest, engine: Arc<DebateEngine>| async move {
            let user = engine.users().get_or_register(&req.nickname).await;
            match engine
                .create_room(req.title, req.topic, req.keywords, &user)
                .await
            {
                Ok(status) => ok_json(&status),
                Err(e) => error_reply(e),
            }
        })
}

fn get_room(
    engine: Arc<DebateEngine>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "rooms" / i64)
        .and(warp::get())
        .and(with_engine(engine))
        .and_then(|room_id: i64, engine: Arc<DebateEngine>| async move {
            match engine.room_status(room_id).await {
                Ok(status) => ok_json(&status),
                Err(e) => error_reply(e),
            }
        })
}

fn room_messages(
    engine: Arc<DebateEngine>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "rooms" / i64 / "messages")
        .and(warp::get())
        .and(with_engine(engine))
        .and_then(|room_id: i64, engine: Arc<DebateEngine>| async move {
            if let Err(e) = engine.room_status(room_id).await {
                return error_reply(e);
            }
            let messages: Vec<MessageDto> = engine
                .messages()
                .debate_history(room_id)
                .await
                .into_iter()
                .map(|m| MessageDto {
                    kind: m.kind,
                    content: m.content,
                    sender: m.sender,
                    summary: m.summary,
                    created_at: m
                        .created_at
                        .duration_since(std::time::UNIX_EPOCH)
                        .map(|d| d.as_secs())
                        .unwrap_or(0),
                })
                .collect();
            ok_json(&messages)
        })
}

fn room_chat_history(
    engine: Arc<DebateEngine>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "rooms" / i64 / "chat")
        .and(warp::get())
        .and(with_engine(engine))
        .and_then(|room_id: i64, engine: Arc<DebateEngine>| async move {
            if let Err(e) = engine.room_status(room_id).await {
                return error_reply(e);
            }
            ok_json(&engine.messages().chat_history(room_id).await)
        })
}

fn join_room(
    engine: Arc<DebateEngine>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "rooms" / i64 / "join")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_engine(engine))
        .and_then(
            |room_id: i64, req: NicknameRequest, engine: Arc<DebateEngine>| async move {
                let user = engine.users().get_or_register(&req.nickname).await;
                match engine.join_as_debater_b(room_id, &user).await {
                    Ok(status) => ok_json(&status),
                    Err(e) => error_reply(e),
                }
            },
        )
}

fn enter_room(
    engine: Arc<DebateEngine>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "rooms" / i64 / "enter")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_engine(engine))
        .and_then(
            |room_id: i64, req: NicknameRequest, engine: Arc<DebateEngine>| async move {
                let user = engine.users().get_or_register(&req.nickname).await;
                match engine.enter_room(room_id, &user).await {
                    Ok(count) => ok_json(&serde_json::json!({
                        "roomId": room_id,
                        "count": count
                    })),
                    Err(e) => error_reply(e),
                }
            },
        )
}

fn leave_room(
    engine: Arc<DebateEngine>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "rooms" / i64 / "leave")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_engine(engine))
        .and_then(
            |room_id: i64, req: NicknameRequest, engine: Arc<DebateEngine>| async move {
                match engine.users().resolve(&req.nickname).await {
                    Ok(user) => match engine.leave_room(room_id, &user).await {
                        Ok(()) => ok_json(&serde_json::json!({ "status": "ok" })),
                        Err(e) => error_reply(e),
                    },
                    Err(e) => error_reply(e),
                }
            },
        )
}

fn delete_room(
    engine: Arc<DebateEngine>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "rooms" / i64)
        .and(warp::delete())
        .and(warp::body::json())
        .and(with_engine(engine))
        .and_then(
            |room_id: i64, req: NicknameRequest, engine: Arc<DebateEngine>| async move {
                match engine.users().resolve(&req.nickname).await {
                    Ok(user) => match engine.delete_room(room_id, &user).await {
                        Ok(()) => ok_json(&serde_json::json!({ "status": "deleted" })),
                        Err(e) => error_reply(e),
                    },
                    Err(e) => error_reply(e),
                }
            },
        )
}

fn with_engine(
    engine: Arc<DebateEngine>,
) -> impl Filter<Extract = (Arc<DebateEngine>,), Error = Infallible> + Clone {
    warp::any().map(move || engine.clone())
}

type ReplyResult = Result<warp::reply::WithStatus<warp::reply::Json>, Infallible>;

fn ok_json<T: Serialize>(value: &T) -> ReplyResult {
    Ok(warp::reply::with_status(
        warp::reply::json(value),
        StatusCode::OK,
    ))
}

fn error_reply(e: DebateError) -> ReplyResult {
    let status = match &e {
        DebateError::RoomNotFound(_) | DebateError::UserNotFound(_) => StatusCode::NOT_FOUND,
        DebateError::NotOwner => StatusCode::FORBIDDEN,
        e if e.is_validation() => StatusCode::BAD_REQUEST,
        DebateError::RoomInactive(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({ "error": e.to_string() })),
        status,
    ))
}
