//! Reconciles room snapshots into the local world.
//!
//! Snapshots are authoritative for remote entities only. Keys present in the
//! room but unknown locally are created, remote keys the room no longer lists
//! are removed, and keys on both sides get their optional fields applied.
//! Local and bot stars are never touched.

use crate::category::{self, Category};
use crate::entity::EntityKey;
use crate::star::Control;
use crate::tile_map::{PlanetSpawn, PlayerSpawn, TileMap};
use stardust_shared::protocol::{PlayerState, RoomSnapshot};
use stardust_shared::vec2::Vec2;

/// Counts of what one `reconcile` call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub removed: usize,
    pub updated: usize,
    /// Entities the world refused (pool exhausted or key taken).
    pub rejected: usize,
}

const DEFAULT_CATEGORY: &str = "yellow_dwarf";

fn category_for(state: &PlayerState) -> Category {
    state
        .category
        .as_deref()
        .and_then(category::by_name)
        .or_else(|| category::by_name(DEFAULT_CATEGORY))
        .unwrap_or(category::CATEGORIES[1])
}

/// Apply one snapshot. Planets go first so the players' attachment lists
/// can refer to planets created in the same pass.
pub fn reconcile(world: &mut TileMap, snapshot: &RoomSnapshot) -> SyncReport {
    let mut report = SyncReport::default();
    sync_black_holes(world, snapshot, &mut report);
    sync_planets(world, snapshot, &mut report);
    sync_players(world, snapshot, &mut report);
    tracing::debug!(
        "Room sync: {} created, {} removed, {} updated, {} rejected",
        report.created,
        report.removed,
        report.updated,
        report.rejected
    );
    report
}

fn sync_black_holes(world: &mut TileMap, snapshot: &RoomSnapshot, report: &mut SyncReport) {
    for key in world.remote_black_hole_keys() {
        if !snapshot.black_holes.contains_key(key.as_str()) && world.remove_black_hole(&key) {
            report.removed += 1;
        }
    }
    for (key, state) in &snapshot.black_holes {
        let key = EntityKey::from(key.as_str());
        let position = Vec2::from_array(state.position);
        if world.black_hole(&key).is_some() {
            world.set_black_hole_position(&key, position);
            report.updated += 1;
        } else if world.spawn_black_hole(Some(key), position, true).is_some() {
            report.created += 1;
        } else {
            report.rejected += 1;
        }
    }
}

fn sync_planets(world: &mut TileMap, snapshot: &RoomSnapshot, report: &mut SyncReport) {
    for key in world.remote_planet_keys() {
        if !snapshot.planets.contains_key(key.as_str()) && world.remove_planet(&key) {
            report.removed += 1;
        }
    }
    for (key, state) in &snapshot.planets {
        let key = EntityKey::from(key.as_str());
        let position = Vec2::from_array(state.position);
        if world.planets().contains(&key) {
            world.set_planet_position(&key, position);
            report.updated += 1;
            continue;
        }
        let spawn = PlanetSpawn {
            key: Some(key.clone()),
            position,
            size: state.size,
            remote: true,
        };
        match world.add_planet(spawn) {
            Some(_) => report.created += 1,
            None => {
                tracing::warn!("No pooled planet left for remote planet {}", key);
                report.rejected += 1;
            }
        }
    }
}

fn sync_players(world: &mut TileMap, snapshot: &RoomSnapshot, report: &mut SyncReport) {
    for key in world.remote_player_keys() {
        if !snapshot.players.contains_key(key.as_str()) && world.remove_player(&key) {
            report.removed += 1;
        }
    }

    for (key, state) in &snapshot.players {
        let key = EntityKey::from(key.as_str());
        match world.player(&key).map(|star| star.is_remote()) {
            Some(false) => continue,
            Some(true) => {
                apply_player(world, &key, state);
                report.updated += 1;
            }
            None => {
                let spawn = PlayerSpawn {
                    key: Some(key.clone()),
                    name: state.name.clone(),
                    category: category_for(state),
                    position: state.position.map(Vec2::from_array).unwrap_or_default(),
                    size: state.size.unwrap_or(world.config().start_size),
                    control: Control::Remote,
                };
                if world.create_player(spawn).is_some() {
                    apply_player(world, &key, state);
                    report.created += 1;
                } else {
                    report.rejected += 1;
                }
            }
        }
    }
}

fn apply_player(world: &mut TileMap, key: &EntityKey, state: &PlayerState) {
    if let Some(size) = state.size {
        world.set_player_size(key, size);
    }
    if let Some(position) = state.position {
        world.set_player_position(key, Vec2::from_array(position));
    }
    if let Some(destination) = state.destination {
        world.steer(key, Vec2::from_array(destination));
    }
    for planet in &state.planets {
        let planet = EntityKey::from(planet.as_str());
        if !world.capture_planet(key, &planet) {
            tracing::debug!("Remote planet {} for {} not attached", planet, key);
        }
    }
}
