//! Stars: the local player, bots and remote players.

use crate::animation::AnimationId;
use crate::category::{temperature_color, Category};
use crate::entity::{gravity_field, Absorption, Body, EntityKey};
use crate::move_catcher::MoveCatcher;
use stardust_shared::vec2::Vec2;

/// Who steers a star.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Local,
    Bot,
    Remote,
}

#[derive(Debug, Clone)]
pub struct Star {
    pub body: Body,
    pub name: String,
    pub category: Category,
    pub temperature: f64,
    pub gravity: f64,
    pub velocity: f64,
    pub max_planet: usize,
    /// Captured planets, in capture order.
    pub planets: Vec<EntityKey>,
    pub absorption: Absorption,
    pub catcher: MoveCatcher,
    pub control: Control,
    pub visible: bool,
    /// Running boost animation, if any.
    pub accelerating: Option<AnimationId>,
    boost: f64,
    is_dead: bool,
}

impl Star {
    pub fn new(
        key: EntityKey,
        name: impl Into<String>,
        category: Category,
        position: Vec2,
        size: f64,
        control: Control,
    ) -> Self {
        let mut catcher = MoveCatcher::new();
        catcher.subscribe(key.clone());
        Self {
            body: Body::new(key, position, size),
            name: name.into(),
            category,
            temperature: category.temperature,
            gravity: category.gravity,
            velocity: category.velocity,
            max_planet: category.planet_count,
            planets: Vec::new(),
            absorption: Absorption::default(),
            catcher,
            control,
            visible: true,
            accelerating: None,
            boost: 1.0,
            is_dead: false,
        }
    }

    pub fn key(&self) -> &EntityKey {
        &self.body.key
    }

    pub fn gravity_field(&self, gravity_ratio: f64) -> f64 {
        gravity_field(self.body.size, self.gravity, gravity_ratio)
    }

    /// Distance within which this star captures planets and absorbs stars.
    pub fn reach(&self, gravity_ratio: f64) -> f64 {
        self.gravity_field(gravity_ratio) * gravity_ratio
    }

    pub fn color(&self) -> u32 {
        temperature_color(self.temperature)
    }

    pub fn is_dead(&self) -> bool {
        self.is_dead
    }

    pub(crate) fn mark_dead(&mut self) {
        self.is_dead = true;
    }

    pub fn is_bot(&self) -> bool {
        self.control == Control::Bot
    }

    pub fn is_remote(&self) -> bool {
        self.control == Control::Remote
    }

    pub fn can_capture_planet(&self) -> bool {
        !self.is_dead && self.accelerating.is_none() && self.planets.len() < self.max_planet
    }

    pub fn boost(&self) -> f64 {
        self.boost
    }

    pub(crate) fn set_boost(&mut self, boost: f64) {
        self.boost = boost.max(1.0);
    }

    /// World units moved per unit of catcher step. Bigger stars are slower.
    pub fn speed(&self, move_scale: f64) -> f64 {
        self.velocity * move_scale * self.absorption.velocity_multiplier() * self.boost
            / self.body.size.max(0.1).sqrt()
    }
}
