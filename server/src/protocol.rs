//! Wire conversions from world state to host messages.

pub use stardust_shared::protocol::*;

use crate::black_hole::BlackHole;
use crate::entity::Body;
use crate::gravity_grid::GravityGrid;
use crate::star::Star;
use crate::tile_map::{TileMap, WorldEvent};
use stardust_shared::vec2::Vec2;

#[inline]
fn position2(v: Vec2) -> [f64; 2] {
    [round2(v.x), round2(v.y)]
}

pub fn star_wire(star: &Star) -> StarWire {
    StarWire {
        key: star.key().to_string(),
        name: star.name.clone(),
        category: star.category.name.to_string(),
        position: position2(star.body.position),
        size: round2(star.body.size),
        color: star.color(),
        visible: star.visible,
        dead: star.is_dead(),
        planets: star.planets.iter().map(|k| k.to_string()).collect(),
        absorbing: star.absorption.absorbing().map(|k| k.to_string()),
    }
}

pub fn black_hole_wire(bh: &BlackHole) -> BlackHoleWire {
    BlackHoleWire {
        key: bh.key().to_string(),
        position: position2(bh.body.position),
        gravity_field: round2(bh.gravity_field),
        depth: round2(bh.depth),
    }
}

pub fn body_wire(body: &Body) -> BodyWire {
    BodyWire {
        key: body.key.to_string(),
        position: position2(body.position),
        size: round2(body.size),
    }
}

pub fn grid_wire(grid: &GravityGrid) -> GridWire {
    GridWire {
        center: position2(grid.center()),
        step: grid.step(),
        detail: grid.detail() as u32,
        heights: grid.heights().iter().map(|h| *h as f32).collect(),
    }
}

/// Snapshot of everything a renderer draws.
pub fn frame_msg(world: &TileMap, include_grid: bool) -> FrameMsg {
    FrameMsg {
        frame: world.frame() as u32,
        followed: world.player_to_follow().map(|k| k.to_string()),
        players: world.players().map(star_wire).collect(),
        black_holes: world.black_holes().map(black_hole_wire).collect(),
        planets: world.planets().iter().map(|p| body_wire(&p.body)).collect(),
        dusts: world.dusts().iter().map(|d| body_wire(&d.body)).collect(),
        grid: include_grid.then(|| grid_wire(world.grid())),
    }
}

pub fn event_msg(event: WorldEvent) -> ServerMsg {
    let (kind, key, detail) = match event {
        WorldEvent::Intent { key, intent } => {
            return ServerMsg::Intent(IntentMsg {
                key: key.to_string(),
                intent,
            });
        }
        WorldEvent::Sound { name, key } => (EventKind::Sound, key, Some(name.to_string())),
        WorldEvent::Show(key) => (EventKind::Show, Some(key), None),
        WorldEvent::Hide(key) => (EventKind::Hide, Some(key), None),
        WorldEvent::Died { key, cause } => (EventKind::Died, Some(key), Some(cause.to_string())),
        WorldEvent::Captured { by, key } => (EventKind::Captured, Some(by), Some(key.to_string())),
    };
    ServerMsg::Event(EventMsg {
        kind,
        key: key.map(|k| k.to_string()),
        detail,
    })
}
