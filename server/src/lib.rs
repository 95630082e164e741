//! Stardust simulation core and host.
//!
//! This module exposes the world components for use in tests and binaries.

pub mod animation;
pub mod black_hole;
pub mod bot;
pub mod category;
pub mod config;
pub mod easing;
pub mod entity;
pub mod game_loop;
pub mod gravity_grid;
pub mod intent;
pub mod map_sync;
pub mod move_catcher;
pub mod pool;
pub mod protocol;
pub mod satellite;
pub mod star;
pub mod tile_map;
pub mod ws;
