use axum::routing::get;
use axum::Router;
use stardust_server::config::HostConfig;
use stardust_server::game_loop::{run_world_loop, WorldBroadcast, WorldCommand};
use stardust_server::ws::{ws_handler, AppState};
use stardust_shared::config::WorldConfig;
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = match HostConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid host configuration: {}", e);
            std::process::exit(1);
        }
    };
    let world_config = WorldConfig::default();

    // Validate configuration before starting
    if let Err(e) = config.validate() {
        eprintln!("Invalid host configuration: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = world_config.validate() {
        eprintln!("Invalid world configuration: {}", e);
        std::process::exit(1);
    }

    let listen_addr = config.listen_addr.clone();

    let (world_tx, world_rx) = mpsc::channel::<WorldCommand>(256);
    let (broadcast_tx, _) = broadcast::channel::<WorldBroadcast>(64);

    // Spawn world loop
    let bc_tx = broadcast_tx.clone();
    tokio::spawn(async move {
        run_world_loop(world_rx, bc_tx, config, world_config).await;
    });

    // Axum app
    let app_state = AppState {
        world_tx,
        broadcast_tx,
    };
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    tracing::info!("Starting stardust host on {}", listen_addr);

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", listen_addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
