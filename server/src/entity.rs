//! Shared entity capabilities: keys, bodies and absorption state.
//!
//! Stars, black holes and satellites are separate record types composed
//! from these pieces; the world keeps each kind in its own table.

use rand::distributions::Alphanumeric;
use rand::Rng;
use stardust_shared::vec2::Vec2;
use std::fmt;

const KEY_LEN: usize = 9;

/// Unique string identifier of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Random 9-character alphanumeric key.
    pub fn random(rng: &mut impl Rng) -> Self {
        let key: String = rng
            .sample_iter(&Alphanumeric)
            .take(KEY_LEN)
            .map(char::from)
            .collect();
        Self(key.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Position-bearing part of every entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub key: EntityKey,
    pub position: Vec2,
    pub size: f64,
}

impl Body {
    pub fn new(key: EntityKey, position: Vec2, size: f64) -> Self {
        Self {
            key,
            position,
            size,
        }
    }
}

/// `sqrt(size × gravity) × ratio`. Negative sizes count as zero.
pub fn gravity_field(size: f64, gravity: f64, ratio: f64) -> f64 {
    (size.max(0.0) * gravity.max(0.0)).sqrt() * ratio
}

/// Who is draining a star.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Absorber {
    Player(EntityKey),
    BlackHole(EntityKey),
}

/// What changed when a black hole took hold of a star.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlackHoleCapture {
    /// Target the star was absorbing, now released.
    pub released_target: Option<EntityKey>,
    /// Player that was absorbing the star, which must stop.
    pub previous_absorber: Option<EntityKey>,
}

/// Absorption state machine of one star.
///
/// A star absorbs at most one target and is absorbed by at most one
/// absorber. Absorbing something and being held by a black hole never
/// happen together.
#[derive(Debug, Clone)]
pub struct Absorption {
    absorbing: Option<EntityKey>,
    absorbed_by: Option<Absorber>,
    velocity_multiplier: f64,
    absorb_clock: f64,
    drain_clock: f64,
}

impl Default for Absorption {
    fn default() -> Self {
        Self {
            absorbing: None,
            absorbed_by: None,
            velocity_multiplier: 1.0,
            absorb_clock: 0.0,
            drain_clock: 0.0,
        }
    }
}

impl Absorption {
    pub fn absorbing(&self) -> Option<&EntityKey> {
        self.absorbing.as_ref()
    }

    pub fn absorbed_by(&self) -> Option<&Absorber> {
        self.absorbed_by.as_ref()
    }

    pub fn black_hole_absorber(&self) -> Option<&EntityKey> {
        match &self.absorbed_by {
            Some(Absorber::BlackHole(key)) => Some(key),
            _ => None,
        }
    }

    pub fn player_absorber(&self) -> Option<&EntityKey> {
        match &self.absorbed_by {
            Some(Absorber::Player(key)) => Some(key),
            _ => None,
        }
    }

    pub fn velocity_multiplier(&self) -> f64 {
        self.velocity_multiplier
    }

    /// Start draining `target`. No-op (false) when already absorbing or
    /// held by a black hole.
    pub fn absorb_target(&mut self, target: &EntityKey) -> bool {
        if self.absorbing.is_some() || self.black_hole_absorber().is_some() {
            return false;
        }
        self.absorbing = Some(target.clone());
        self.absorb_clock = 0.0;
        true
    }

    /// Victim side of `absorb_target`. False when something already holds it.
    pub fn absorbed_by_player(&mut self, absorber: &EntityKey) -> bool {
        if self.absorbed_by.is_some() {
            return false;
        }
        self.absorbed_by = Some(Absorber::Player(absorber.clone()));
        true
    }

    /// Hand the star to a black hole. Clears any target of its own and any
    /// player absorber, and slows it by its distance to the hole.
    pub fn absorb_by_black_hole(
        &mut self,
        black_hole: &EntityKey,
        distance: f64,
        black_hole_field: f64,
    ) -> BlackHoleCapture {
        let capture = BlackHoleCapture {
            released_target: self.absorbing.take(),
            previous_absorber: self.player_absorber().cloned(),
        };
        self.absorbed_by = Some(Absorber::BlackHole(black_hole.clone()));
        self.drain_clock = 0.0;
        self.set_pull(distance, black_hole_field);
        capture
    }

    /// Velocity multiplier `distance / (field × 20)`, within [0, 1].
    pub fn set_pull(&mut self, distance: f64, black_hole_field: f64) {
        let denom = black_hole_field * 20.0;
        self.velocity_multiplier = if denom > 0.0 {
            (distance / denom).clamp(0.0, 1.0)
        } else {
            1.0
        };
    }

    /// Clear own target and black-hole absorber. Returns the released target.
    /// Idempotent.
    pub fn absorb_stop(&mut self) -> Option<EntityKey> {
        if self.black_hole_absorber().is_some() {
            self.absorbed_by = None;
        }
        self.velocity_multiplier = 1.0;
        self.absorb_clock = 0.0;
        self.drain_clock = 0.0;
        self.absorbing.take()
    }

    /// Victim side release from a player absorber.
    pub fn release(&mut self) -> Option<EntityKey> {
        match self.absorbed_by.take() {
            Some(Absorber::Player(key)) => Some(key),
            other => {
                self.absorbed_by = other;
                None
            }
        }
    }

    /// Advance the absorb timer; returns how many whole intervals elapsed.
    pub fn advance_absorb_clock(&mut self, dt: f64, interval: f64) -> u32 {
        advance_clock(&mut self.absorb_clock, dt, interval)
    }

    /// Advance the black-hole drain timer.
    pub fn advance_drain_clock(&mut self, dt: f64, interval: f64) -> u32 {
        advance_clock(&mut self.drain_clock, dt, interval)
    }
}

fn advance_clock(clock: &mut f64, dt: f64, interval: f64) -> u32 {
    if interval <= 0.0 {
        return 0;
    }
    *clock += dt;
    let mut elapsed = 0;
    while *clock >= interval {
        *clock -= interval;
        elapsed += 1;
    }
    elapsed
}
