//! Integration tests for the stardust host.
//!
//! These tests start a real host instance and connect via WebSocket
//! to verify end-to-end behavior.

use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use stardust_server::protocol::{
    ClientMsg, FrameMsg, Intent, PlayerState, RoomSnapshot, ServerMsg,
};
use stardust_shared::config::WorldConfig;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Start a test host on a random available port and return the WebSocket URL.
async fn start_test_server() -> String {
    use stardust_server::config::HostConfig;
    use stardust_server::game_loop::{run_world_loop, WorldBroadcast, WorldCommand};
    use stardust_server::ws::AppState;

    // Find an available port
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener); // Release the port so the host can bind to it

    let host_config = HostConfig {
        listen_addr: addr.to_string(),
        frame_rate_hz: 60,
        broadcast_rate_hz: 15,
        intent_interval_ms: 500,
        rng_seed: 12345,
    };
    // Quiet world: no bots, black holes or resource spawning
    let world_config = WorldConfig {
        bot_count: 0,
        black_hole_count: 0,
        dust_density: 0.0,
        planet_target: 0,
        ..WorldConfig::default()
    };

    let (world_tx, world_rx) = mpsc::channel::<WorldCommand>(256);
    let (broadcast_tx, _) = broadcast::channel::<WorldBroadcast>(64);

    let app_state = AppState {
        world_tx,
        broadcast_tx: broadcast_tx.clone(),
    };

    let listen_addr = host_config.listen_addr.clone();
    tokio::spawn(async move {
        run_world_loop(world_rx, broadcast_tx, host_config, world_config).await;
    });

    let app = axum::Router::new()
        .route("/ws", axum::routing::get(stardust_server::ws::ws_handler))
        .with_state(app_state);

    tokio::spawn(async move {
        let listener = TcpListener::bind(&listen_addr).await.unwrap();
        axum::serve(listener, app).await.unwrap();
    });

    // Give the host time to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("ws://{}/ws", addr)
}

async fn connect(url: &str) -> WsStream {
    let (ws, _) = connect_async(url).await.expect("Failed to connect");
    ws
}

/// Read the next text message and parse as ServerMsg.
async fn recv_msg(ws: &mut WsStream) -> ServerMsg {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(&text).expect("Failed to parse server message");
            }
            Some(Ok(_)) => continue, // Skip ping/pong
            Some(Err(e)) => panic!("WebSocket error: {}", e),
            None => panic!("WebSocket closed unexpectedly"),
        }
    }
}

/// Read the next text message with a timeout.
async fn recv_msg_timeout(ws: &mut WsStream, timeout: Duration) -> Option<ServerMsg> {
    tokio::time::timeout(timeout, recv_msg(ws)).await.ok()
}

async fn send(ws: &mut WsStream, msg: &ClientMsg) {
    let json = serde_json::to_string(msg).unwrap();
    ws.send(Message::Text(json.into())).await.unwrap();
}

/// Wait up to `attempts` messages for a frame matching `pred`.
async fn wait_for_frame(
    ws: &mut WsStream,
    attempts: usize,
    pred: impl Fn(&FrameMsg) -> bool,
) -> Option<FrameMsg> {
    for _ in 0..attempts {
        if let Some(ServerMsg::Frame(frame)) =
            recv_msg_timeout(ws, Duration::from_millis(300)).await
        {
            if pred(&frame) {
                return Some(frame);
            }
        }
    }
    None
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_connect_and_receive_welcome() {
    let url = start_test_server().await;
    let mut ws = connect(&url).await;

    match recv_msg(&mut ws).await {
        ServerMsg::Welcome(welcome) => {
            assert_eq!(welcome.protocol_version, 1);
            assert!(welcome.self_key.is_none(), "no game started yet");
            assert_eq!(welcome.config.bot_count, 0);
        }
        other => panic!("Expected Welcome, got {:?}", other),
    }
}

#[tokio::test]
async fn test_start_creates_followed_player() {
    let url = start_test_server().await;
    let mut ws = connect(&url).await;
    let _welcome = recv_msg(&mut ws).await;

    send(
        &mut ws,
        &ClientMsg::Start {
            category: "red_dwarf".to_string(),
            name: "ana".to_string(),
        },
    )
    .await;

    let frame = wait_for_frame(&mut ws, 40, |f| f.followed.is_some())
        .await
        .expect("frame with a followed player");
    let followed = frame.followed.clone().unwrap();
    let star = frame
        .players
        .iter()
        .find(|p| p.key == followed)
        .expect("followed player listed");
    assert_eq!(star.name, "ana");
    assert_eq!(star.category, "red_dwarf");
    assert!(!star.dead);
}

#[tokio::test]
async fn test_catch_produces_destination_intent() {
    let url = start_test_server().await;
    let mut ws = connect(&url).await;
    let _welcome = recv_msg(&mut ws).await;

    send(
        &mut ws,
        &ClientMsg::Start {
            category: "yellow_dwarf".to_string(),
            name: "bo".to_string(),
        },
    )
    .await;
    send(&mut ws, &ClientMsg::Catch { x: 1.0, y: 0.0 }).await;

    // Intents go out every 500ms
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    let mut found = None;
    while tokio::time::Instant::now() < deadline {
        if let Some(ServerMsg::Intent(msg)) =
            recv_msg_timeout(&mut ws, Duration::from_millis(300)).await
        {
            found = Some(msg);
            break;
        }
    }
    let msg = found.expect("intent within the cadence");
    assert_eq!(
        msg.intent,
        Intent::Destination {
            destination: [1.0, 0.0]
        }
    );
}

#[tokio::test]
async fn test_room_state_mirrors_remote_player() {
    let url = start_test_server().await;
    let mut ws = connect(&url).await;
    let _welcome = recv_msg(&mut ws).await;

    let mut players = HashMap::new();
    players.insert(
        "remote1".to_string(),
        PlayerState {
            name: "cy".to_string(),
            position: Some([5.0, 5.0]),
            ..PlayerState::default()
        },
    );
    send(
        &mut ws,
        &ClientMsg::RoomState(RoomSnapshot {
            players,
            ..RoomSnapshot::default()
        }),
    )
    .await;

    let frame = wait_for_frame(&mut ws, 40, |f| f.players.iter().any(|p| p.key == "remote1"))
        .await
        .expect("remote player in a frame");
    let star = frame.players.iter().find(|p| p.key == "remote1").unwrap();
    assert_eq!(star.position, [5.0, 5.0]);

    // An empty snapshot removes it again
    send(&mut ws, &ClientMsg::RoomState(RoomSnapshot::default())).await;
    let frame = wait_for_frame(&mut ws, 40, |f| f.players.is_empty()).await;
    assert!(frame.is_some(), "remote player removed after empty snapshot");
}

#[tokio::test]
async fn test_malformed_message_is_ignored() {
    let url = start_test_server().await;
    let mut ws = connect(&url).await;
    let _welcome = recv_msg(&mut ws).await;

    let bogus = r#"{"type":"warp"}"#.to_string();
    ws.send(Message::Text(bogus.into())).await.unwrap();

    // Connection stays up and frames keep coming
    let frame = wait_for_frame(&mut ws, 10, |_| true).await;
    assert!(frame.is_some());
}
