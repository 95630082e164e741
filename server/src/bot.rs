//! Bot stars ("IA") that roam the map around the followed player.
//!
//! Bots are lightweight state machines that:
//! - Re-think their heading after a personality-dependent delay
//! - Chase smaller stars, flee bigger ones, or drift at random
//! - Steer through the same move catcher a human player uses
//!
//! The world owns the bot stars; this module only decides headings and
//! paces staggered spawns.

use crate::entity::EntityKey;
use rand::Rng;
use stardust_shared::vec2::{distance, from_angle, normalize, sub, Vec2};

/// Bot personality affects how often and how it steers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotPersonality {
    /// Chases the nearest smaller star (0.4-1.0s between decisions)
    Hunter,
    /// Runs from bigger stars and black holes (0.3-0.8s)
    Coward,
    /// Wanders, sometimes coasting to a stop (1.5-4.0s)
    Drifter,
}

impl BotPersonality {
    /// Get delay range for this personality (min, max) in seconds
    fn delay_range(&self) -> (f64, f64) {
        match self {
            BotPersonality::Hunter => (0.4, 1.0),
            BotPersonality::Coward => (0.3, 0.8),
            BotPersonality::Drifter => (1.5, 4.0),
        }
    }

    fn random_delay(&self, rng: &mut impl Rng) -> f64 {
        let (min, max) = self.delay_range();
        min + rng.gen::<f64>() * (max - min)
    }

    /// Select a random personality
    pub fn random(rng: &mut impl Rng) -> Self {
        match rng.gen_range(0..3) {
            0 => BotPersonality::Hunter,
            1 => BotPersonality::Coward,
            _ => BotPersonality::Drifter,
        }
    }
}

/// What a bot can see of another massive body.
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    pub key: EntityKey,
    pub position: Vec2,
    pub gravity_field: f64,
    pub black_hole: bool,
}

#[derive(Debug, Clone)]
pub struct BotBrain {
    pub key: EntityKey,
    pub personality: BotPersonality,
    think_in: f64,
}

impl BotBrain {
    pub fn new(key: EntityKey, personality: BotPersonality, rng: &mut impl Rng) -> Self {
        // first decision shortly after spawning
        let think_in = rng.gen::<f64>() * 0.5;
        Self {
            key,
            personality,
            think_in,
        }
    }

    /// Returns a new raw heading when it is time to decide.
    pub fn tick(
        &mut self,
        dt: f64,
        me: &Sighting,
        others: &[Sighting],
        sense: f64,
        rng: &mut impl Rng,
    ) -> Option<Vec2> {
        self.think_in -= dt;
        if self.think_in > 0.0 {
            return None;
        }
        self.think_in = self.personality.random_delay(rng);
        Some(self.decide(me, others, sense, rng))
    }

    fn decide(&self, me: &Sighting, others: &[Sighting], sense: f64, rng: &mut impl Rng) -> Vec2 {
        match self.personality {
            BotPersonality::Hunter => {
                let prey = nearest(me, others, sense, |o| {
                    !o.black_hole && o.gravity_field < me.gravity_field
                });
                match prey {
                    Some(prey) => normalize(sub(prey.position, me.position)),
                    None => random_heading(rng),
                }
            }
            BotPersonality::Coward => {
                let threat = nearest(me, others, sense, |o| {
                    o.black_hole || o.gravity_field > me.gravity_field
                });
                match threat {
                    Some(threat) => normalize(sub(me.position, threat.position)),
                    None if rng.gen_bool(0.3) => Vec2::ZERO,
                    None => random_heading(rng),
                }
            }
            BotPersonality::Drifter => {
                if rng.gen_bool(0.25) {
                    Vec2::ZERO
                } else {
                    random_heading(rng)
                }
            }
        }
    }
}

/// Closest sighting within `sense` matching `pred`; first found wins ties.
fn nearest<'a>(
    me: &Sighting,
    others: &'a [Sighting],
    sense: f64,
    pred: impl Fn(&Sighting) -> bool,
) -> Option<&'a Sighting> {
    let mut best: Option<(&Sighting, f64)> = None;
    for other in others.iter().filter(|o| o.key != me.key && pred(o)) {
        let d = distance(me.position, other.position);
        if d < sense && best.map_or(true, |(_, best_d)| d < best_d) {
            best = Some((other, d));
        }
    }
    best.map(|(s, _)| s)
}

fn random_heading(rng: &mut impl Rng) -> Vec2 {
    from_angle(rng.gen::<f64>() * std::f64::consts::TAU)
}

/// Tracks bot brains and the queue of staggered spawns.
#[derive(Debug, Default)]
pub struct BotManager {
    pub bots: Vec<BotBrain>,
    /// Seconds until each queued spawn.
    pending_spawns: Vec<f64>,
}

impl BotManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bot(&mut self, key: EntityKey, rng: &mut impl Rng) -> BotPersonality {
        let personality = BotPersonality::random(rng);
        tracing::info!("Bot {} created with {:?} personality", key, personality);
        self.bots.push(BotBrain::new(key, personality, rng));
        personality
    }

    pub fn remove_bot(&mut self, key: &EntityKey) -> bool {
        let before = self.bots.len();
        self.bots.retain(|b| &b.key != key);
        self.bots.len() < before
    }

    pub fn is_bot(&self, key: &EntityKey) -> bool {
        self.bots.iter().any(|b| &b.key == key)
    }

    pub fn count(&self) -> usize {
        self.bots.len()
    }

    pub fn pending(&self) -> usize {
        self.pending_spawns.len()
    }

    /// Queue `count` spawns, `stagger` seconds apart.
    pub fn queue_spawns(&mut self, count: usize, stagger: f64) {
        let base = self.pending_spawns.iter().copied().fold(0.0, f64::max);
        for i in 0..count {
            self.pending_spawns.push(base + stagger * (i as f64 + 1.0));
        }
    }

    /// Advance the spawn queue; returns how many spawns are due now.
    pub fn take_due_spawns(&mut self, dt: f64) -> usize {
        for delay in &mut self.pending_spawns {
            *delay -= dt;
        }
        let before = self.pending_spawns.len();
        self.pending_spawns.retain(|d| *d > 0.0);
        before - self.pending_spawns.len()
    }

    pub fn clear(&mut self) {
        self.bots.clear();
        self.pending_spawns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use stardust_shared::vec2::{dot, vec2};

    fn test_rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    fn sighting(key: &str, x: f64, gf: f64, black_hole: bool) -> Sighting {
        Sighting {
            key: key.into(),
            position: vec2(x, 0.0),
            gravity_field: gf,
            black_hole,
        }
    }

    fn brain(personality: BotPersonality, rng: &mut ChaCha8Rng) -> BotBrain {
        let mut b = BotBrain::new("bot".into(), personality, rng);
        b.think_in = 0.0;
        b
    }

    #[test]
    fn hunter_chases_smaller_star() {
        let mut rng = test_rng();
        let mut b = brain(BotPersonality::Hunter, &mut rng);
        let me = sighting("bot", 0.0, 5.0, false);
        let others = vec![
            me.clone(),
            sighting("prey", 50.0, 2.0, false),
            sighting("big", -20.0, 9.0, false),
        ];
        let heading = b.tick(0.016, &me, &others, 500.0, &mut rng).unwrap();
        assert!(dot(heading, vec2(1.0, 0.0)) > 0.99);
    }

    #[test]
    fn coward_flees_black_hole() {
        let mut rng = test_rng();
        let mut b = brain(BotPersonality::Coward, &mut rng);
        let me = sighting("bot", 0.0, 5.0, false);
        let others = vec![sighting("bh", 30.0, 3.0, true)];
        let heading = b.tick(0.016, &me, &others, 500.0, &mut rng).unwrap();
        assert!(dot(heading, vec2(-1.0, 0.0)) > 0.99);
    }

    #[test]
    fn bot_waits_between_decisions() {
        let mut rng = test_rng();
        let mut b = brain(BotPersonality::Drifter, &mut rng);
        let me = sighting("bot", 0.0, 5.0, false);
        assert!(b.tick(0.016, &me, &[], 500.0, &mut rng).is_some());
        // Drifter waits at least 1.5s
        assert!(b.tick(1.0, &me, &[], 500.0, &mut rng).is_none());
    }

    #[test]
    fn spawns_are_staggered() {
        let mut m = BotManager::new();
        m.queue_spawns(3, 0.1);
        assert_eq!(m.pending(), 3);
        assert_eq!(m.take_due_spawns(0.05), 0);
        assert_eq!(m.take_due_spawns(0.1), 1);
        assert_eq!(m.take_due_spawns(0.2), 2);
        assert_eq!(m.pending(), 0);
    }

    #[test]
    fn add_and_remove_bots() {
        let mut rng = test_rng();
        let mut m = BotManager::new();
        m.add_bot("a".into(), &mut rng);
        m.add_bot("b".into(), &mut rng);
        assert!(m.is_bot(&"a".into()));
        assert!(m.remove_bot(&"a".into()));
        assert!(!m.remove_bot(&"a".into()));
        assert_eq!(m.count(), 1);
    }
}
