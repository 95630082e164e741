//! Black holes: wandering sinks that drain any star inside their reach.

use crate::animation::AnimationId;
use crate::easing::Curve;
use crate::entity::{Body, EntityKey};
use crate::move_catcher::MoveCatcher;
use stardust_shared::vec2::Vec2;

pub const INTRO_STEPS: f64 = 120.0;

#[derive(Debug, Clone)]
pub struct BlackHole {
    pub body: Body,
    /// Grows from 0 to `target_gravity_field` during the intro.
    pub gravity_field: f64,
    pub depth: f64,
    pub target_gravity_field: f64,
    pub target_depth: f64,
    pub catcher: MoveCatcher,
    pub intro: Option<AnimationId>,
    /// Mirrored from the room; the room decides its lifetime.
    pub remote: bool,
    wander_clock: f64,
}

impl BlackHole {
    pub fn new(key: EntityKey, position: Vec2, size: f64, gravity_field: f64, depth: f64) -> Self {
        let mut catcher = MoveCatcher::new();
        catcher.subscribe(key.clone());
        Self {
            body: Body::new(key, position, size),
            gravity_field: 0.0,
            depth: 0.0,
            target_gravity_field: gravity_field,
            target_depth: depth,
            catcher,
            intro: None,
            remote: false,
            wander_clock: 0.0,
        }
    }

    pub fn key(&self) -> &EntityKey {
        &self.body.key
    }

    pub fn reach(&self, gravity_ratio: f64) -> f64 {
        self.gravity_field * gravity_ratio
    }

    /// Intro progress; `fraction` past 1 holds the final values.
    pub fn apply_intro(&mut self, fraction: f64) {
        let eased = Curve::QuadOut.ease(fraction);
        self.gravity_field = self.target_gravity_field * eased;
        self.depth = self.target_depth * eased;
    }

    /// True once every `interval` seconds.
    pub fn wander_due(&mut self, dt: f64, interval: f64) -> bool {
        self.wander_clock += dt;
        if self.wander_clock >= interval {
            self.wander_clock -= interval;
            return true;
        }
        false
    }
}
