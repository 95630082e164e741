//! Planets and dust: pooled bodies that float free or orbit a star.

use crate::entity::{Body, EntityKey};
use crate::pool::Poolable;
use stardust_shared::vec2::{add, from_angle, scale, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatelliteKind {
    Planet,
    Dust,
}

/// Orbit around `owner`: angle `offset + cycle` at `stationary_radius`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Orbit {
    pub owner: Option<EntityKey>,
    pub offset: f64,
    pub cycle: f64,
    pub stationary_radius: f64,
    /// Radians per frame at 60 fps.
    pub stationary_velocity: f64,
}

#[derive(Debug, Clone)]
pub struct Satellite {
    pub body: Body,
    pub kind: SatelliteKind,
    pub orbit: Orbit,
    /// Held by a star (orbiting, being swallowed, or mid release).
    /// A stored satellite with this set is not handed out again yet.
    pub attached_to_star: bool,
    pub remote: bool,
}

impl Satellite {
    pub fn new(kind: SatelliteKind, key: EntityKey) -> Self {
        Self {
            body: Body::new(key, Vec2::ZERO, 0.0),
            kind,
            orbit: Orbit::default(),
            attached_to_star: false,
            remote: false,
        }
    }

    pub fn key(&self) -> &EntityKey {
        &self.body.key
    }

    /// Put the satellite in `slot` of `slots` around a star of `owner_size`.
    pub fn attach(&mut self, owner: &EntityKey, slot: usize, slots: usize, owner_size: f64) {
        let slots = slots.max(1) as f64;
        self.attached_to_star = true;
        self.orbit = Orbit {
            owner: Some(owner.clone()),
            offset: slot as f64 * std::f64::consts::TAU / slots,
            cycle: 0.0,
            stationary_radius: owner_size * 30.0 + 8.0 * (slot as f64 + 1.0),
            stationary_velocity: 0.03 / (1.0 + slot as f64 * 0.25),
        };
    }

    pub fn advance_orbit(&mut self, fps_ratio: f64) {
        self.orbit.cycle += self.orbit.stationary_velocity * fps_ratio;
    }

    pub fn orbit_position(&self, owner_position: Vec2) -> Vec2 {
        add(
            owner_position,
            scale(
                from_angle(self.orbit.offset + self.orbit.cycle),
                self.orbit.stationary_radius,
            ),
        )
    }
}

impl Poolable for Satellite {
    fn key(&self) -> &EntityKey {
        &self.body.key
    }

    fn set_key(&mut self, key: EntityKey) {
        self.body.key = key;
    }

    fn recycle(&mut self) {
        self.body.position = Vec2::ZERO;
        self.body.size = 0.0;
        self.orbit = Orbit::default();
        self.attached_to_star = false;
        self.remote = false;
    }

    fn is_reserved(&self) -> bool {
        self.attached_to_star
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stardust_shared::vec2::{distance, vec2};

    #[test]
    fn orbit_keeps_radius() {
        let mut p = Satellite::new(SatelliteKind::Planet, "p".into());
        p.attach(&"star".into(), 1, 4, 1.0);
        let owner = vec2(100.0, -50.0);
        for _ in 0..50 {
            p.advance_orbit(1.0);
            let d = distance(p.orbit_position(owner), owner);
            assert!((d - p.orbit.stationary_radius).abs() < 1e-9);
        }
        assert!(p.is_reserved());
    }

    #[test]
    fn slots_spread_around_owner() {
        let mut a = Satellite::new(SatelliteKind::Planet, "a".into());
        let mut b = Satellite::new(SatelliteKind::Planet, "b".into());
        a.attach(&"s".into(), 0, 2, 1.0);
        b.attach(&"s".into(), 1, 2, 1.0);
        assert!((b.orbit.offset - a.orbit.offset - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn recycle_clears_attachment() {
        let mut p = Satellite::new(SatelliteKind::Planet, "p".into());
        p.attach(&"s".into(), 0, 1, 1.0);
        p.body.size = 0.4;
        p.recycle();
        assert!(!p.is_reserved());
        assert!(p.orbit.owner.is_none());
        assert_eq!(p.body.size, 0.0);
    }
}
