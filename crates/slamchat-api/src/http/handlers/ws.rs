//! WebSocket handler for live room traffic.
//!
//! `/ws/rooms/{id}` upgrades an HTTP connection for an active member. Once
//! connected, the handler:
//!
//! - Sends an `enter` event carrying the one-shot first-visit flag.
//! - Forwards every message published to the room as a `message` event,
//!   re-checking membership first. Once the user has exited (through HTTP
//!   or another socket) it sends a `ROOM_NOT_SUBSCRIBED` error and closes.
//! - Accepts `send`, `read` and `ping` commands from the client.
//!
//! A lagging client skips the events it missed and keeps going; it can
//! recover them through the catch-up endpoint.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use slamchat_types::error::ChatError;
use slamchat_types::message::{MessageId, MessagePayload};
use slamchat_types::room::{room_topic, RoomId, UserId};

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthenticatedUser;
use crate::state::AppState;

/// Incoming command from a WebSocket client.
///
/// Unknown or malformed frames are logged and ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsCommand {
    Send { content: String },
    /// Advance the read index to `message_id`.
    Read { message_id: MessageId },
    Ping,
}

/// Outgoing event pushed to the client.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsEvent {
    Enter {
        room_id: RoomId,
        topic: String,
        first_visit: bool,
    },
    Message(MessagePayload),
    Error {
        code: &'static str,
        message: String,
    },
    Pong,
}

/// Upgrade to a WebSocket after checking the caller is an active member.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(room_id): Path<RoomId>,
) -> Result<impl IntoResponse, AppError> {
    if state
        .chat_service
        .is_subscribed(user_id, room_id)
        .await?
        .is_none()
    {
        return Err(ChatError::RoomNotSubscribed.into());
    }

    Ok(ws.on_upgrade(move |socket| handle_ws_connection(socket, state, user_id, room_id)))
}

async fn handle_ws_connection(socket: WebSocket, state: AppState, user_id: UserId, room_id: RoomId) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Subscribe before the enter event so nothing published in between is missed.
    let mut room_rx = state.chat_service.subscribe(room_id);

    let enter = match state.chat_service.is_first_visit(user_id, room_id).await {
        Ok(first_visit) => WsEvent::Enter {
            room_id,
            topic: room_topic(room_id),
            first_visit,
        },
        Err(err) => error_event(AppError::from(err)),
    };
    if send_event(&mut ws_sender, &enter).await.is_err() {
        return;
    }
    tracing::debug!(user_id, room_id, "WebSocket joined room");

    loop {
        tokio::select! {
            event = room_rx.recv() => {
                match event {
                    Ok(payload) => match message_event(&state, user_id, room_id, payload).await {
                        Ok(message) => {
                            if send_event(&mut ws_sender, &message).await.is_err() {
                                break;
                            }
                        }
                        Err(error) => {
                            let _ = send_event(&mut ws_sender, &error).await;
                            let _ = ws_sender.send(Message::Close(None)).await;
                            break;
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(user_id, room_id, skipped, "WebSocket subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            frame = ws_receiver.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = process_command(&text, &state, user_id, room_id).await {
                            if send_event(&mut ws_sender, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!("WebSocket receive error: {err}");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!(user_id, room_id, "WebSocket connection closed");
}

/// The event for a published message, or the error to close with when the
/// user is no longer an active member of the room.
async fn message_event(
    state: &AppState,
    user_id: UserId,
    room_id: RoomId,
    payload: MessagePayload,
) -> Result<WsEvent, WsEvent> {
    match state.chat_service.is_subscribed(user_id, room_id).await {
        Ok(Some(_)) => Ok(WsEvent::Message(payload)),
        Ok(None) => {
            tracing::debug!(user_id, room_id, "Membership gone, closing WebSocket");
            Err(error_event(ChatError::RoomNotSubscribed.into()))
        }
        Err(err) => {
            tracing::warn!(user_id, room_id, error = %err, "Membership check failed, closing WebSocket");
            Err(error_event(err.into()))
        }
    }
}

/// Run one client command. Returns the event to send back, if any.
///
/// A sent message is not echoed here: it reaches this client through the
/// room subscription like every other member's.
async fn process_command(
    text: &str,
    state: &AppState,
    user_id: UserId,
    room_id: RoomId,
) -> Option<WsEvent> {
    let command: WsCommand = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(err) => {
            tracing::warn!(raw = %text, error = %err, "Ignoring malformed WebSocket command");
            return None;
        }
    };

    match command {
        WsCommand::Send { content } => state
            .chat_service
            .send_message(user_id, room_id, &content)
            .await
            .err()
            .map(|err| error_event(err.into())),
        WsCommand::Read { message_id } => state
            .chat_service
            .update_read_index(user_id, room_id, message_id)
            .await
            .err()
            .map(|err| error_event(err.into())),
        WsCommand::Ping => Some(WsEvent::Pong),
    }
}

fn error_event(err: AppError) -> WsEvent {
    let (_, code, message) = err.parts();
    WsEvent::Error { code, message }
}

async fn send_event(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    event: &WsEvent,
) -> Result<(), ()> {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(err) => {
            tracing::warn!("Failed to serialize WebSocket event: {err}");
            return Ok(());
        }
    };
    ws_sender
        .send(Message::Text(json.into()))
        .await
        .map_err(|err| {
            tracing::debug!("Failed to send WebSocket event: {err}");
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let send: WsCommand = serde_json::from_str(r#"{"type":"send","content":"gg"}"#).unwrap();
        assert!(matches!(send, WsCommand::Send { ref content } if content == "gg"));

        let read: WsCommand = serde_json::from_str(r#"{"type":"read","message_id":12}"#).unwrap();
        assert!(matches!(read, WsCommand::Read { message_id: 12 }));

        let ping: WsCommand = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(ping, WsCommand::Ping));

        assert!(serde_json::from_str::<WsCommand>(r#"{"type":"cancel"}"#).is_err());
    }

    #[tokio::test]
    async fn test_exited_member_stops_receiving() {
        use slamchat_types::config::ChatConfig;
        use slamchat_types::room::{NewRoom, RoomType};

        let dir = tempfile::tempdir().unwrap();
        let state = AppState::with_config(dir.path().to_path_buf(), ChatConfig::default())
            .await
            .unwrap();
        let room_id = state
            .chat_service
            .create_room_for_match(
                &NewRoom {
                    room_type: RoomType::Direct,
                    source_key: Some(2),
                    participants: vec![1, 2],
                    name: "direct".to_string(),
                    image_url: None,
                },
                &[],
            )
            .await
            .unwrap();
        let mut room_rx = state.chat_service.subscribe(room_id);

        state.chat_service.send_message(1, room_id, "before").await.unwrap();
        let before = room_rx.recv().await.unwrap();
        assert!(matches!(
            message_event(&state, 2, room_id, before).await,
            Ok(WsEvent::Message(ref payload)) if payload.content == "before"
        ));

        state.chat_service.exit(2, room_id, None).await.unwrap();
        state.chat_service.send_message(1, room_id, "after").await.unwrap();
        let after = room_rx.recv().await.unwrap();

        assert!(matches!(
            message_event(&state, 2, room_id, after.clone()).await,
            Err(WsEvent::Error { code: "ROOM_NOT_SUBSCRIBED", .. })
        ));
        assert!(matches!(
            message_event(&state, 1, room_id, after).await,
            Ok(WsEvent::Message(_))
        ));
    }

    #[test]
    fn test_event_wire_format() {
        let enter = serde_json::to_value(WsEvent::Enter {
            room_id: 5,
            topic: room_topic(5),
            first_visit: true,
        })
        .unwrap();
        assert_eq!(enter["type"], "enter");
        assert_eq!(enter["topic"], "/sub/chat/room/5");
        assert_eq!(enter["first_visit"], true);

        let message = serde_json::to_value(WsEvent::Message(MessagePayload {
            message_id: 9,
            room_id: 5,
            sender_id: 2,
            content: "next game?".to_string(),
            creation_time: "2024-01-15 09:30:05".to_string(),
        }))
        .unwrap();
        assert_eq!(message["type"], "message");
        assert_eq!(message["message_id"], 9);
        assert_eq!(message["content"], "next game?");

        let error = serde_json::to_value(error_event(ChatError::RoomNotSubscribed.into())).unwrap();
        assert_eq!(error["type"], "error");
        assert_eq!(error["code"], "ROOM_NOT_SUBSCRIBED");
    }
}
