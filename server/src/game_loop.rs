use crate::category;
use crate::config::HostConfig;
use crate::map_sync;
use crate::protocol::{self, FrameMsg, RoomSnapshot, ServerMsg, WelcomeMsg, PROTOCOL_VERSION};
use crate::tile_map::TileMap;
use stardust_shared::config::WorldConfig;
use stardust_shared::vec2::Vec2;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Commands from collaborator connections to the world task
pub enum WorldCommand {
    Join {
        response: oneshot::Sender<WelcomeMsg>,
    },
    Start {
        category: String,
        name: String,
    },
    Catch {
        x: f64,
        y: f64,
    },
    Accelerate,
    RoomState(RoomSnapshot),
    SetCheck(bool),
    Leave,
}

/// Broadcasts from the world task to every connection
#[derive(Debug, Clone)]
pub enum WorldBroadcast {
    Frame(FrameMsg),
    /// Intent or event, already in wire form.
    Message(ServerMsg),
}

/// Run the world loop. Owns the `TileMap`.
pub async fn run_world_loop(
    mut cmd_rx: mpsc::Receiver<WorldCommand>,
    broadcast_tx: broadcast::Sender<WorldBroadcast>,
    host_config: HostConfig,
    world_config: WorldConfig,
) {
    let mut world = TileMap::new(world_config, host_config.rng_seed);
    world.set_intent_interval(host_config.intent_interval_secs());

    let dt = 1.0 / host_config.frame_rate_hz as f64;
    let broadcast_every_n = host_config.broadcast_every() as u64;
    let mut tick_count: u64 = 0;
    let mut sent_grid_version: Option<u64> = None;

    let mut tick_interval = tokio::time::interval(Duration::from_secs_f64(dt));
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                world.update(dt);

                for event in world.drain_events() {
                    let _ = broadcast_tx.send(WorldBroadcast::Message(protocol::event_msg(event)));
                }

                // Frames at a lower rate; the grid only when it changed
                tick_count += 1;
                if tick_count % broadcast_every_n == 0 {
                    let version = world.grid().version();
                    let include_grid = sent_grid_version != Some(version);
                    sent_grid_version = Some(version);
                    let msg = protocol::frame_msg(&world, include_grid);
                    let _ = broadcast_tx.send(WorldBroadcast::Frame(msg));
                }
            }

            Some(cmd) = cmd_rx.recv() => {
                match cmd {
                    WorldCommand::Join { response } => {
                        let welcome = WelcomeMsg {
                            protocol_version: PROTOCOL_VERSION,
                            server_version: env!("CARGO_PKG_VERSION").to_string(),
                            self_key: world.local_player().map(|k| k.to_string()),
                            config: world.config().clone(),
                        };
                        let _ = response.send(welcome);
                        // New viewers need the full height field
                        sent_grid_version = None;
                    }
                    WorldCommand::Start { category, name } => {
                        let category = category::by_name(&category).unwrap_or_else(|| {
                            tracing::warn!("Unknown category {:?}, picking one", category);
                            category::CATEGORIES[1]
                        });
                        if world.start_game(category, &name).is_none() {
                            tracing::warn!("Could not start a game for {}", name);
                        }
                    }
                    WorldCommand::Catch { x, y } => {
                        let raw = Vec2::new(x, y);
                        if raw.is_finite() {
                            world.catch_input(raw);
                        }
                    }
                    WorldCommand::Accelerate => {
                        if let Some(key) = world.local_player().cloned() {
                            world.accelerate(&key);
                        }
                    }
                    WorldCommand::RoomState(snapshot) => {
                        map_sync::reconcile(&mut world, &snapshot);
                    }
                    WorldCommand::SetCheck(enabled) => world.set_check(enabled),
                    WorldCommand::Leave => world.leave_game(),
                }
            }

            else => break,
        }
    }

    tracing::info!("World loop ended");
}
