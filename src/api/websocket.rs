use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};

use crate::error::QuizError;
use crate::game::messages::{ClientMessage, ServerEvent};
use crate::game::{GameCoordinator, GameRoom};

/// Host session. The socket is attached only after the host id checks
/// out against the room; rejected connections get one error frame and
/// are closed without ever touching the registry.
pub async fn handle_host_connection(
    websocket: WebSocket,
    coordinator: Arc<GameCoordinator>,
    room_code: String,
    host_id: String,
) {
    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let room = match coordinator.connect_host(&room_code, &host_id, tx.clone()).await {
        Ok(room) => room,
        Err(err) => {
            tracing::warn!(room_code = %room_code, host_id = %host_id, error = %err, "Host connection rejected");
            let _ = ws_sender.send(rejection_frame(&err)).await;
            let _ = ws_sender.close().await;
            return;
        }
    };

    // Writer task: the registry only ever enqueues onto the channel
    let sender_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sender.send(message).await {
                tracing::debug!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(message) => {
                if message.is_close() {
                    break;
                }
                handle_host_frame(&coordinator, &room, &tx, message).await;
            }
            Err(e) => {
                tracing::debug!(room_code = %room.code, error = %e, "Host WebSocket error");
                break;
            }
        }
    }

    coordinator.disconnect_host(&room.code).await;
    sender_task.abort();
}

/// Player session. Players must have joined over HTTP first; unknown ids
/// are turned away before registration.
pub async fn handle_player_connection(
    websocket: WebSocket,
    coordinator: Arc<GameCoordinator>,
    room_code: String,
    player_id: String,
) {
    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let room = match coordinator
        .connect_player(&room_code, &player_id, tx.clone())
        .await
    {
        Ok(room) => room,
        Err(err) => {
            tracing::warn!(room_code = %room_code, player_id = %player_id, error = %err, "Player connection rejected");
            let _ = ws_sender.send(rejection_frame(&err)).await;
            let _ = ws_sender.close().await;
            return;
        }
    };

    let sender_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sender.send(message).await {
                tracing::debug!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(message) => {
                if message.is_close() {
                    break;
                }
                handle_player_frame(&coordinator, &room, &player_id, &tx, message).await;
            }
            Err(e) => {
                tracing::debug!(room_code = %room.code, player_id = %player_id, error = %e, "Player WebSocket error");
                break;
            }
        }
    }

    coordinator.disconnect_player(&room.code, &player_id).await;
    sender_task.abort();
}

async fn handle_host_frame(
    coordinator: &GameCoordinator,
    room: &GameRoom,
    tx: &mpsc::UnboundedSender<Message>,
    message: Message,
) {
    let Ok(text) = message.to_str() else {
        return; // ping/pong/binary frames
    };
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(command) => coordinator.handle_host_message(room, command).await,
        Err(e) => {
            tracing::debug!(room_code = %room.code, error = %e, "Unparseable host message");
            send_parse_error(tx);
        }
    }
}

async fn handle_player_frame(
    coordinator: &GameCoordinator,
    room: &GameRoom,
    player_id: &str,
    tx: &mpsc::UnboundedSender<Message>,
    message: Message,
) {
    let Ok(text) = message.to_str() else {
        return;
    };
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(command) => {
            coordinator
                .handle_player_message(room, player_id, command)
                .await
        }
        Err(e) => {
            tracing::debug!(room_code = %room.code, player_id = %player_id, error = %e, "Unparseable player message");
            send_parse_error(tx);
        }
    }
}

/// Malformed frames are answered on the same connection and otherwise
/// ignored; they never tear the session down.
fn send_parse_error(tx: &mpsc::UnboundedSender<Message>) {
    let event = ServerEvent::Error {
        message: "Unrecognized message".to_string(),
        error_code: "INVALID_MESSAGE".to_string(),
    };
    if let Ok(json) = serde_json::to_string(&event) {
        let _ = tx.send(Message::text(json));
    }
}

fn rejection_frame(err: &QuizError) -> Message {
    let event = ServerEvent::Error {
        message: err.to_string(),
        error_code: err.code().to_string(),
    };
    match serde_json::to_string(&event) {
        Ok(json) => Message::text(json),
        Err(_) => Message::text("{\"type\":\"error\"}"),
    }
}
