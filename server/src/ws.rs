use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::game_loop::{WorldBroadcast, WorldCommand};
use crate::protocol::{ClientMsg, ServerMsg};

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub world_tx: mpsc::Sender<WorldCommand>,
    pub broadcast_tx: broadcast::Sender<WorldBroadcast>,
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, app_state))
}

fn to_command(msg: ClientMsg) -> WorldCommand {
    match msg {
        ClientMsg::Start { category, name } => WorldCommand::Start { category, name },
        ClientMsg::Catch { x, y } => WorldCommand::Catch { x, y },
        ClientMsg::Accelerate => WorldCommand::Accelerate,
        ClientMsg::RoomState(snapshot) => WorldCommand::RoomState(snapshot),
        ClientMsg::SetCheck { enabled } => WorldCommand::SetCheck(enabled),
        ClientMsg::Leave => WorldCommand::Leave,
    }
}

async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let (mut sink, mut stream) = socket.split();

    // Subscribe before joining so nothing published after the welcome is missed
    let mut broadcast_rx = app_state.broadcast_tx.subscribe();

    let (resp_tx, resp_rx) = oneshot::channel();
    if app_state
        .world_tx
        .send(WorldCommand::Join { response: resp_tx })
        .await
        .is_err()
    {
        tracing::error!("Failed to send Join command");
        return;
    }

    let welcome = match resp_rx.await {
        Ok(welcome) => welcome,
        Err(_) => {
            tracing::error!("Failed to receive welcome");
            return;
        }
    };

    tracing::info!("Collaborator connected");

    let welcome_json = match serde_json::to_string(&ServerMsg::Welcome(welcome)) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to encode welcome: {}", e);
            return;
        }
    };
    if sink.send(Message::Text(welcome_json.into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            // Collaborator -> World
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMsg>(&text) {
                            Ok(client_msg) => {
                                if app_state.world_tx.send(to_command(client_msg)).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => tracing::debug!("Ignoring malformed message: {}", e),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {} // Ignore ping/pong/binary
                }
            }

            // World -> Collaborator (broadcast)
            result = broadcast_rx.recv() => {
                match result {
                    Ok(broadcast) => {
                        let json = match broadcast {
                            WorldBroadcast::Frame(msg) => serde_json::to_string(&ServerMsg::Frame(msg)),
                            WorldBroadcast::Message(msg) => serde_json::to_string(&msg),
                        };

                        if let Ok(json) = json {
                            if sink.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Collaborator lagged by {} messages", n);
                        // Frames are full snapshots, the next one catches up
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::info!("Collaborator disconnected");
}
