//! Movement smoothing between raw input and entity motion.
//!
//! A non-zero raw vector runs an infinite "active" animation that turns the
//! vector into a per-tick step. A zero vector hands over to a short eased-out
//! inertia that decays the last step to nothing. Each tick produces a
//! `CatchSample` the owner forwards to every listener.

use crate::animation::{AnimationId, Animations};
use crate::easing::Curve;
use crate::entity::EntityKey;
use stardust_shared::vec2::{add, mul, scale, vec2, Vec2};

pub const DEFAULT_SPEED: f64 = 0.05;
pub const INERTIA_STEPS: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchPhase {
    Active,
    Inertia,
}

/// What listeners receive each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatchSample {
    pub position: Vec2,
    pub step: Vec2,
}

#[derive(Debug, Clone)]
pub struct MoveCatcher {
    speed_vector: Vec2,
    /// Quantization knob; stored for tuning, never applied to samples.
    accuracy: f64,
    raw: Vec2,
    last_step: Vec2,
    inertia_from: Vec2,
    position_catch: Vec2,
    animation: Option<(CatchPhase, AnimationId)>,
    enabled: bool,
    listeners: Vec<EntityKey>,
}

impl Default for MoveCatcher {
    fn default() -> Self {
        Self::with_speed(DEFAULT_SPEED)
    }
}

impl MoveCatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_speed(speed: f64) -> Self {
        Self {
            speed_vector: vec2(speed, speed),
            accuracy: 1.0,
            raw: Vec2::ZERO,
            last_step: Vec2::ZERO,
            inertia_from: Vec2::ZERO,
            position_catch: Vec2::ZERO,
            animation: None,
            enabled: true,
            listeners: Vec::new(),
        }
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn set_accuracy(&mut self, accuracy: f64) {
        self.accuracy = accuracy;
    }

    pub fn subscribe(&mut self, key: EntityKey) {
        if !self.listeners.contains(&key) {
            self.listeners.push(key);
        }
    }

    pub fn unsubscribe(&mut self, key: &EntityKey) {
        self.listeners.retain(|k| k != key);
    }

    pub fn listeners(&self) -> &[EntityKey] {
        &self.listeners
    }

    pub fn raw(&self) -> Vec2 {
        self.raw
    }

    pub fn position_catch(&self) -> Vec2 {
        self.position_catch
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_moving(&self) -> bool {
        self.animation.is_some()
    }

    pub fn phase(&self) -> Option<CatchPhase> {
        self.animation.map(|(phase, _)| phase)
    }

    /// Re-enable `catch`.
    pub fn start(&mut self) {
        self.enabled = true;
    }

    /// Freeze: cancel any running animation and ignore further input.
    pub fn stop<T: Clone>(&mut self, anims: &mut Animations<T>) {
        self.enabled = false;
        if let Some((_, id)) = self.animation.take() {
            anims.stop(id, true);
        }
        self.raw = Vec2::ZERO;
        self.last_step = Vec2::ZERO;
    }

    /// Feed a raw input vector. `task` builds the scheduler payload for
    /// whichever phase gets scheduled.
    pub fn catch<T: Clone>(
        &mut self,
        raw: Vec2,
        anims: &mut Animations<T>,
        task: impl Fn(CatchPhase) -> T,
    ) {
        if !self.enabled {
            return;
        }
        if raw.is_zero() {
            if let Some((CatchPhase::Active, id)) = self.animation {
                anims.stop(id, true);
                self.inertia_from = mul(self.raw, self.speed_vector);
                let id = anims.schedule(INERTIA_STEPS, task(CatchPhase::Inertia));
                self.animation = Some((CatchPhase::Inertia, id));
            }
            self.raw = Vec2::ZERO;
            return;
        }

        self.raw = raw;
        match self.animation {
            Some((CatchPhase::Active, _)) => {}
            Some((CatchPhase::Inertia, id)) => {
                anims.stop(id, true);
                let id = anims.schedule_infinite(task(CatchPhase::Active));
                self.animation = Some((CatchPhase::Active, id));
            }
            None => {
                let id = anims.schedule_infinite(task(CatchPhase::Active));
                self.animation = Some((CatchPhase::Active, id));
            }
        }
    }

    /// Produce this tick's sample for `phase`.
    pub fn advance(&mut self, phase: CatchPhase, fraction: f64) -> CatchSample {
        let step = match phase {
            CatchPhase::Active => mul(self.raw, self.speed_vector),
            CatchPhase::Inertia => scale(self.inertia_from, 1.0 - Curve::QuadOut.ease(fraction)),
        };
        self.last_step = step;
        self.position_catch = add(self.position_catch, step);
        CatchSample {
            position: self.position_catch,
            step,
        }
    }

    /// Completion of the animation `id`; stale ids are ignored.
    pub fn finish(&mut self, id: AnimationId) {
        if matches!(self.animation, Some((_, current)) if current == id) {
            self.animation = None;
            self.last_step = Vec2::ZERO;
        }
    }

    pub fn last_step(&self) -> Vec2 {
        self.last_step
    }
}
