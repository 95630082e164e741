//! Outbound intents for the local player.
//!
//! While a game is started, every interval produces one intent: the raw
//! heading when it changed since the last send, otherwise the position so
//! the room can correct drift.

use stardust_shared::protocol::Intent;
use stardust_shared::vec2::Vec2;

pub const DEFAULT_INTERVAL: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct IntentEmitter {
    interval: f64,
    clock: f64,
    started: bool,
    last_destination: Option<Vec2>,
}

impl Default for IntentEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl IntentEmitter {
    pub fn new(interval: f64) -> Self {
        Self {
            interval,
            clock: 0.0,
            started: false,
            last_destination: None,
        }
    }

    pub fn start(&mut self) {
        self.started = true;
        self.clock = 0.0;
        self.last_destination = None;
    }

    pub fn stop(&mut self) {
        self.started = false;
    }

    pub fn tick(&mut self, dt: f64, position: Vec2, destination: Vec2) -> Option<Intent> {
        if !self.started {
            return None;
        }
        self.clock += dt;
        if self.clock < self.interval {
            return None;
        }
        self.clock = 0.0;

        if self.last_destination != Some(destination) {
            self.last_destination = Some(destination);
            Some(Intent::Destination {
                destination: destination.to_array(),
            })
        } else {
            Some(Intent::Position {
                position: position.to_array(),
            })
        }
    }
}
