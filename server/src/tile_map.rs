//! The world coordinator.
//!
//! `TileMap` exclusively owns every entity table, both pools, the gravity
//! grid and the animation scheduler. Each frame it:
//! - ticks animations and dispatches their tasks
//! - keeps captured planets on their orbits
//! - drains ongoing absorptions on a fixed interval
//! - every `check_every_frames` frames runs the absorption, capture and
//!   resource checks; every `bot_check_every_frames` frames the bot and
//!   black hole population checks
//! - re-centers the grid on the followed player
//!
//! Collaborators observe the world through read accessors and the drained
//! `WorldEvent` queue.

use crate::animation::{AnimationEvent, AnimationId, Animations};
use crate::black_hole::{BlackHole, INTRO_STEPS};
use crate::bot::{BotManager, Sighting};
use crate::category::{self, Category};
use crate::easing::Curve;
use crate::entity::EntityKey;
use crate::gravity_grid::GravityGrid;
use crate::intent::IntentEmitter;
use crate::move_catcher::CatchPhase;
use crate::pool::{Pool, Poolable};
use crate::satellite::{Satellite, SatelliteKind};
use crate::star::{Control, Star};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use stardust_shared::config::WorldConfig;
use stardust_shared::protocol::Intent;
use stardust_shared::vec2::{add, distance, from_angle, lerp, normalize, scale, sub, Vec2};
use std::collections::BTreeMap;
use std::fmt;

/// Frame rate the step-based animations are tuned for.
pub const FRAME_RATE: f64 = 60.0;

const DUST_PICKUP_STEPS: f64 = 15.0;
const PLANET_RELEASE_STEPS: f64 = 30.0;
const PLANET_RELEASE_DRIFT: f64 = 60.0;
const DEATH_STEPS: f64 = 60.0;
const ACCELERATE_STEPS: f64 = 60.0;
const ACCELERATE_BOOST: f64 = 2.0;
/// Black holes drift slower than stars per catcher step.
const BLACK_HOLE_MOVE_FACTOR: f64 = 0.5;

/// Something a move catcher drives.
#[derive(Debug, Clone, PartialEq)]
pub enum Mover {
    Player(EntityKey),
    BlackHole(EntityKey),
}

/// Payload of every scheduled animation.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    Catch {
        mover: Mover,
        phase: CatchPhase,
    },
    DustPickup {
        dust: EntityKey,
        player: EntityKey,
        from: Vec2,
    },
    PlanetRelease {
        planet: EntityKey,
        from: Vec2,
        heading: Vec2,
    },
    Accelerate {
        player: EntityKey,
    },
    Death {
        player: EntityKey,
        from: Vec2,
        from_size: f64,
        into: Option<EntityKey>,
    },
    BlackHoleIntro {
        black_hole: EntityKey,
    },
}

impl Task {
    /// Whether the task drives the entity `key` and must end with it.
    fn concerns(&self, key: &EntityKey) -> bool {
        match self {
            Task::Catch {
                mover: Mover::Player(k) | Mover::BlackHole(k),
                ..
            } => k == key,
            Task::DustPickup { player, .. } => player == key,
            Task::Accelerate { player } => player == key,
            Task::Death { player, .. } => player == key,
            Task::BlackHoleIntro { black_hole } => black_hole == key,
            Task::PlanetRelease { .. } => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathCause {
    /// Swallowed by a black hole.
    BlackHole,
    /// Shrunk below the minimum size.
    Collapsed,
}

impl fmt::Display for DeathCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeathCause::BlackHole => f.write_str("black_hole"),
            DeathCause::Collapsed => f.write_str("collapsed"),
        }
    }
}

/// Notifications for the renderer, audio and room collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    Sound {
        name: &'static str,
        key: Option<EntityKey>,
    },
    Show(EntityKey),
    Hide(EntityKey),
    Died {
        key: EntityKey,
        cause: DeathCause,
    },
    Captured {
        by: EntityKey,
        key: EntityKey,
    },
    Intent {
        key: EntityKey,
        intent: Intent,
    },
}

/// Data for `create_player`.
#[derive(Debug, Clone)]
pub struct PlayerSpawn {
    pub key: Option<EntityKey>,
    pub name: String,
    pub category: Category,
    pub position: Vec2,
    pub size: f64,
    pub control: Control,
}

/// Data for `add_planet`.
#[derive(Debug, Clone)]
pub struct PlanetSpawn {
    pub key: Option<EntityKey>,
    pub position: Vec2,
    pub size: f64,
    pub remote: bool,
}

pub struct TileMap {
    config: WorldConfig,
    rng: ChaCha8Rng,
    players: BTreeMap<EntityKey, Star>,
    black_holes: BTreeMap<EntityKey, BlackHole>,
    planets: Pool<Satellite>,
    dusts: Pool<Satellite>,
    grid: GravityGrid,
    animations: Animations<Task>,
    bots: BotManager,
    intents: IntentEmitter,
    player_to_follow: Option<EntityKey>,
    local_player: Option<EntityKey>,
    check: bool,
    frame: u64,
    events: Vec<WorldEvent>,
}

impl TileMap {
    pub fn new(config: WorldConfig, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let dusts = Pool::new(config.dust_pool as usize, |_| {
            Satellite::new(SatelliteKind::Dust, EntityKey::random(&mut rng))
        });
        let planets = Pool::new(config.planet_pool as usize, |_| {
            Satellite::new(SatelliteKind::Planet, EntityKey::random(&mut rng))
        });
        let grid = GravityGrid::from_config(&config);
        Self {
            config,
            rng,
            players: BTreeMap::new(),
            black_holes: BTreeMap::new(),
            planets,
            dusts,
            grid,
            animations: Animations::new(),
            bots: BotManager::new(),
            intents: IntentEmitter::default(),
            player_to_follow: None,
            local_player: None,
            check: false,
            frame: 0,
            events: Vec::new(),
        }
    }

    // --- accessors ---

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn players(&self) -> impl Iterator<Item = &Star> {
        self.players.values()
    }

    pub fn player(&self, key: &EntityKey) -> Option<&Star> {
        self.players.get(key)
    }

    pub fn black_holes(&self) -> impl Iterator<Item = &BlackHole> {
        self.black_holes.values()
    }

    pub fn black_hole(&self, key: &EntityKey) -> Option<&BlackHole> {
        self.black_holes.get(key)
    }

    pub fn planets(&self) -> &Pool<Satellite> {
        &self.planets
    }

    pub fn dusts(&self) -> &Pool<Satellite> {
        &self.dusts
    }

    pub fn grid(&self) -> &GravityGrid {
        &self.grid
    }

    pub fn bots(&self) -> &BotManager {
        &self.bots
    }

    pub fn animation_count(&self) -> usize {
        self.animations.len()
    }

    pub fn player_to_follow(&self) -> Option<&EntityKey> {
        self.player_to_follow.as_ref()
    }

    pub fn local_player(&self) -> Option<&EntityKey> {
        self.local_player.as_ref()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn check(&self) -> bool {
        self.check
    }

    /// Suspend or resume the periodic scans and absorption drains.
    pub fn set_check(&mut self, check: bool) {
        self.check = check;
    }

    pub fn set_player_to_follow(&mut self, key: Option<EntityKey>) {
        self.player_to_follow = key;
    }

    /// Seconds between outbound intents; takes effect on the next start.
    pub fn set_intent_interval(&mut self, interval: f64) {
        self.intents = IntentEmitter::new(interval);
    }

    pub fn is_alive(&self, key: &EntityKey) -> bool {
        self.players.get(key).is_some_and(|s| !s.is_dead())
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    // --- game session ---

    /// Create the local player and start following it.
    pub fn start_game(&mut self, category: Category, name: &str) -> Option<EntityKey> {
        if let Some(previous) = self.local_player.take() {
            self.remove_player(&previous);
        }
        let key = self.create_player(PlayerSpawn {
            key: None,
            name: name.to_string(),
            category,
            position: Vec2::ZERO,
            size: self.config.start_size,
            control: Control::Local,
        })?;
        self.local_player = Some(key.clone());
        self.player_to_follow = Some(key.clone());
        self.check = true;
        self.intents.start();
        tracing::info!("Game started for {} as {} ({})", name, key, category.name);
        Some(key)
    }

    /// End the session and clear the map.
    pub fn leave_game(&mut self) {
        self.erase_all_entity();
        self.check = false;
        tracing::info!("Game left");
    }

    /// Raw heading for the local player.
    pub fn catch_input(&mut self, raw: Vec2) {
        if let Some(key) = self.local_player.clone() {
            self.steer(&key, raw);
        }
    }

    // --- frame ---

    pub fn update(&mut self, dt: f64) {
        let fps_ratio = dt * FRAME_RATE;
        self.frame += 1;

        for event in self.animations.tick(fps_ratio) {
            self.apply_animation(event);
        }
        self.advance_orbits(fps_ratio);

        if self.check {
            self.run_absorb_timers(dt);
            self.run_black_holes(dt);
            self.run_bots(dt);
            if self.frame % self.config.check_every_frames as u64 == 0 {
                self.check_players_absorbtion();
                self.check_ressource_map();
            }
            if self.frame % self.config.bot_check_every_frames as u64 == 0 {
                self.check_ia();
            }
        }

        self.follow_grid();
        self.emit_intent(dt);
    }

    fn apply_animation(&mut self, event: AnimationEvent<Task>) {
        match event {
            AnimationEvent::Tick {
                id, task, fraction, ..
            } => {
                if !self.animations.is_stale(id) {
                    self.on_tick(task, fraction);
                }
            }
            AnimationEvent::Complete { id, task, forced } => self.on_complete(id, task, forced),
        }
    }

    fn on_tick(&mut self, task: Task, fraction: f64) {
        match task {
            Task::Catch { mover, phase } => self.on_catch(&mover, phase, fraction),
            Task::DustPickup { dust, player, from } => {
                let Some(target) = self.players.get(&player).map(|s| s.body.position) else {
                    return;
                };
                if let Some(d) = self.dusts.get_mut(&dust) {
                    d.body.position = lerp(from, target, Curve::QuadIn.ease(fraction));
                }
            }
            Task::PlanetRelease {
                planet,
                from,
                heading,
            } => {
                if let Some(p) = self.planets.stored_mut(&planet) {
                    let drift = PLANET_RELEASE_DRIFT * Curve::QuadOut.ease(fraction);
                    p.body.position = add(from, scale(heading, drift));
                }
            }
            Task::Accelerate { player } => {
                if let Some(star) = self.players.get_mut(&player) {
                    let left = 1.0 - Curve::QuadOut.ease(fraction);
                    star.set_boost(1.0 + (ACCELERATE_BOOST - 1.0) * left);
                }
            }
            Task::Death {
                player,
                from,
                from_size,
                into,
            } => {
                let sink = into
                    .as_ref()
                    .and_then(|k| self.black_holes.get(k))
                    .map(|bh| bh.body.position);
                if let Some(star) = self.players.get_mut(&player) {
                    match sink {
                        Some(sink) => {
                            let t = Curve::QuadIn.ease(fraction);
                            star.body.position = lerp(from, sink, t);
                            star.body.size = from_size * (1.0 - t);
                        }
                        None => {
                            star.body.size = from_size * (1.0 + 0.5 * Curve::QuadOut.ease(fraction));
                        }
                    }
                }
            }
            Task::BlackHoleIntro { black_hole } => {
                if let Some(bh) = self.black_holes.get_mut(&black_hole) {
                    bh.apply_intro(fraction);
                    let (pos, size, depth) = (bh.body.position, bh.body.size, bh.depth);
                    self.grid.set_black_hole_point(&black_hole, pos, size, Some(depth));
                }
            }
        }
    }

    fn on_complete(&mut self, id: AnimationId, task: Task, forced: bool) {
        match task {
            Task::Catch { mover, .. } => match mover {
                Mover::Player(key) => {
                    if let Some(star) = self.players.get_mut(&key) {
                        star.catcher.finish(id);
                    }
                }
                Mover::BlackHole(key) => {
                    if let Some(bh) = self.black_holes.get_mut(&key) {
                        bh.catcher.finish(id);
                    }
                }
            },
            Task::DustPickup { dust, player, .. } => {
                self.dusts.release(&dust);
                if forced || !self.is_alive(&player) {
                    return;
                }
                if let Some(size) = self.players.get(&player).map(|s| s.body.size) {
                    let growth = self.config.dust_size / (size * 20.0);
                    self.set_player_size(&player, size + growth);
                }
            }
            Task::PlanetRelease { planet, .. } => {
                if let Some(p) = self.planets.stored_mut(&planet) {
                    p.recycle();
                }
            }
            Task::Accelerate { player } => {
                if let Some(star) = self.players.get_mut(&player) {
                    if star.accelerating == Some(id) {
                        star.accelerating = None;
                    }
                    star.set_boost(1.0);
                }
            }
            Task::Death { player, .. } => {
                self.dispose_player(&player);
            }
            Task::BlackHoleIntro { black_hole } => {
                if let Some(bh) = self.black_holes.get_mut(&black_hole) {
                    bh.intro = None;
                    bh.apply_intro(1.0);
                }
            }
        }
    }

    fn on_catch(&mut self, mover: &Mover, phase: CatchPhase, fraction: f64) {
        match mover {
            Mover::Player(key) => {
                let Some(star) = self.players.get_mut(key) else {
                    return;
                };
                if star.is_dead() {
                    return;
                }
                let sample = star.catcher.advance(phase, fraction);
                let listeners = star.catcher.listeners().to_vec();
                for listener in &listeners {
                    self.move_player(listener, sample.step);
                }
            }
            Mover::BlackHole(key) => {
                let Some(bh) = self.black_holes.get_mut(key) else {
                    return;
                };
                let sample = bh.catcher.advance(phase, fraction);
                let listeners = bh.catcher.listeners().to_vec();
                for listener in &listeners {
                    self.move_black_hole(listener, sample.step);
                }
            }
        }
    }

    fn advance_orbits(&mut self, fps_ratio: f64) {
        let players = &self.players;
        for planet in self.planets.iter_mut() {
            let Some(owner) = planet.orbit.owner.as_ref().and_then(|k| players.get(k)) else {
                continue;
            };
            let owner_position = owner.body.position;
            planet.advance_orbit(fps_ratio);
            planet.body.position = planet.orbit_position(owner_position);
        }
    }

    fn follow_grid(&mut self) {
        let Some(anchor) = self
            .player_to_follow
            .as_ref()
            .and_then(|k| self.players.get(k))
            .map(|s| (s.body.position, s.body.size))
        else {
            return;
        };
        match self.grid.set_center_and_size(anchor.0, anchor.1) {
            Ok(true) => tracing::debug!("Grid re-windowed at ({:.1}, {:.1})", anchor.0.x, anchor.0.y),
            Ok(false) => {}
            Err(e) => tracing::warn!("Grid update skipped: {}", e),
        }
    }

    fn emit_intent(&mut self, dt: f64) {
        let Some(key) = self.local_player.clone() else {
            return;
        };
        let Some(star) = self.players.get(&key) else {
            return;
        };
        if let Some(intent) = self.intents.tick(dt, star.body.position, star.catcher.raw()) {
            self.events.push(WorldEvent::Intent { key, intent });
        }
    }

    /// Center and size the maintenance checks work around.
    fn anchor(&self) -> (Vec2, f64) {
        self.player_to_follow
            .as_ref()
            .and_then(|k| self.players.get(k))
            .map(|s| (s.body.position, s.body.size))
            .unwrap_or((Vec2::ZERO, self.config.start_size))
    }

    /// Random point on the spawn ring, biased toward the inner edge.
    fn ring_position(&mut self, center: Vec2, size: f64) -> Vec2 {
        let k = size.max(1.0);
        let angle = self.rng.gen::<f64>() * std::f64::consts::TAU;
        let spread = self.config.spawn_outer - self.config.spawn_inner;
        let radius = (self.config.spawn_inner + spread * self.rng.gen::<f64>().powf(1.5)) * k;
        add(center, scale(from_angle(angle), radius))
    }

    // --- players ---

    /// Add a star. Returns `None` when the key is already taken.
    pub fn create_player(&mut self, spawn: PlayerSpawn) -> Option<EntityKey> {
        let key = spawn.key.unwrap_or_else(|| EntityKey::random(&mut self.rng));
        if self.players.contains_key(&key) {
            tracing::warn!("Player {} already exists", key);
            return None;
        }
        let star = Star::new(
            key.clone(),
            spawn.name,
            spawn.category,
            spawn.position,
            spawn.size,
            spawn.control,
        );
        let depth = star.gravity_field(self.config.gravity_ratio);
        self.grid
            .set_star_point(&key, spawn.position, spawn.size, Some(depth));
        self.players.insert(key.clone(), star);
        if spawn.control == Control::Bot {
            self.bots.add_bot(key.clone(), &mut self.rng);
        }
        self.events.push(WorldEvent::Show(key.clone()));
        Some(key)
    }

    /// Remove a star immediately, without a death animation.
    pub fn remove_player(&mut self, key: &EntityKey) -> bool {
        self.dispose_player(key)
    }

    fn dispose_player(&mut self, key: &EntityKey) -> bool {
        let Some(mut star) = self.players.remove(key) else {
            return false;
        };
        star.catcher.stop(&mut self.animations);
        for event in self.animations.stop_where(|t| t.concerns(key)) {
            self.apply_animation(event);
        }

        if let Some(target) = star.absorption.absorb_stop() {
            if let Some(victim) = self.players.get_mut(&target) {
                victim.absorption.release();
            }
        }
        if let Some(absorber) = star.absorption.release() {
            if let Some(a) = self.players.get_mut(&absorber) {
                if a.absorption.absorbing() == Some(key) {
                    a.absorption.absorb_stop();
                }
            }
        }
        for planet in &star.planets {
            self.planets.release(planet);
        }

        self.grid.erase_mass(key);
        self.bots.remove_bot(key);
        if self.player_to_follow.as_ref() == Some(key) {
            self.player_to_follow = None;
        }
        if self.local_player.as_ref() == Some(key) {
            self.local_player = None;
            self.intents.stop();
        }
        self.events.push(WorldEvent::Hide(key.clone()));
        tracing::debug!("Player {} disposed", key);
        true
    }

    /// Feed a raw heading into a star's move catcher.
    pub fn steer(&mut self, key: &EntityKey, raw: Vec2) {
        let Some(star) = self.players.get_mut(key) else {
            return;
        };
        if star.is_dead() {
            return;
        }
        let mover = Mover::Player(key.clone());
        star.catcher.catch(raw, &mut self.animations, |phase| Task::Catch {
            mover: mover.clone(),
            phase,
        });
    }

    /// Move a star by a catcher step, scaled by its speed.
    pub fn move_player(&mut self, key: &EntityKey, step: Vec2) {
        let Some(star) = self.players.get_mut(key) else {
            return;
        };
        if star.is_dead() {
            return;
        }
        let speed = star.speed(self.config.move_scale);
        let position = add(star.body.position, scale(step, speed));
        self.set_player_position(key, position);
    }

    /// Place a star and re-stamp its mass.
    pub fn set_player_position(&mut self, key: &EntityKey, position: Vec2) {
        let Some(star) = self.players.get_mut(key) else {
            return;
        };
        star.body.position = position;
        if star.is_dead() {
            return;
        }
        let depth = star.gravity_field(self.config.gravity_ratio);
        let size = star.body.size;
        self.grid.set_star_point(key, position, size, Some(depth));
    }

    pub fn set_player_size(&mut self, key: &EntityKey, size: f64) {
        let Some(star) = self.players.get_mut(key) else {
            return;
        };
        star.body.size = size.max(0.0);
        let position = star.body.position;
        self.set_player_position(key, position);
    }

    /// Begin draining `target` into `key`.
    pub fn absorb_target(&mut self, key: &EntityKey, target: &EntityKey) -> bool {
        if key == target {
            return false;
        }
        let target_free = self
            .players
            .get(target)
            .is_some_and(|t| {
                !t.is_dead()
                    && t.absorption.absorbed_by().is_none()
                    && t.absorption.absorbing() != Some(key)
            });
        if !target_free {
            return false;
        }
        let Some(star) = self.players.get_mut(key) else {
            return false;
        };
        if star.is_dead() || !star.absorption.absorb_target(target) {
            return false;
        }
        if let Some(victim) = self.players.get_mut(target) {
            victim.absorption.absorbed_by_player(key);
        }
        self.events.push(WorldEvent::Sound {
            name: "absorb",
            key: Some(key.clone()),
        });
        tracing::debug!("{} started absorbing {}", key, target);
        true
    }

    /// Hand `key` to the black hole `black_hole`.
    pub fn absorb_by_black_hole(&mut self, key: &EntityKey, black_hole: &EntityKey) -> bool {
        let Some((bh_position, bh_field)) = self
            .black_holes
            .get(black_hole)
            .map(|bh| (bh.body.position, bh.gravity_field))
        else {
            return false;
        };
        let Some(star) = self.players.get_mut(key) else {
            return false;
        };
        if star.is_dead() || star.absorption.black_hole_absorber().is_some() {
            return false;
        }
        let dist = distance(star.body.position, bh_position);
        let capture = star
            .absorption
            .absorb_by_black_hole(black_hole, dist, bh_field);

        if let Some(target) = capture.released_target {
            if let Some(victim) = self.players.get_mut(&target) {
                victim.absorption.release();
            }
        }
        if let Some(absorber) = capture.previous_absorber {
            if let Some(a) = self.players.get_mut(&absorber) {
                a.absorption.absorb_stop();
            }
        }
        self.events.push(WorldEvent::Sound {
            name: "black_hole",
            key: Some(key.clone()),
        });
        tracing::debug!("{} caught by black hole {}", key, black_hole);
        true
    }

    /// End whatever `key` is absorbing and release it from a black hole.
    pub fn absorb_stop(&mut self, key: &EntityKey) {
        let Some(star) = self.players.get_mut(key) else {
            return;
        };
        if let Some(target) = star.absorption.absorb_stop() {
            if let Some(victim) = self.players.get_mut(&target) {
                if victim.absorption.player_absorber() == Some(key) {
                    victim.absorption.release();
                }
            }
        }
    }

    /// Mark the star dead and start its death animation. Disposal happens
    /// when the animation completes.
    pub fn die(&mut self, key: &EntityKey) {
        let Some(star) = self.players.get_mut(key) else {
            return;
        };
        if star.is_dead() {
            return;
        }
        star.mark_dead();
        star.catcher.stop(&mut self.animations);
        let into = star.absorption.black_hole_absorber().cloned();
        let released = star.absorption.absorb_stop();
        let absorber = star.absorption.release();
        let planets = std::mem::take(&mut star.planets);
        let accelerating = star.accelerating.take();
        star.set_boost(1.0);
        let (from, from_size) = (star.body.position, star.body.size);

        if let Some(id) = accelerating {
            self.animations.stop(id, true);
        }
        if let Some(target) = released {
            if let Some(victim) = self.players.get_mut(&target) {
                victim.absorption.release();
            }
        }
        if let Some(absorber) = absorber {
            if let Some(a) = self.players.get_mut(&absorber) {
                if a.absorption.absorbing() == Some(key) {
                    a.absorption.absorb_stop();
                }
            }
        }
        for planet in &planets {
            self.detach_planet(planet, from);
        }
        // the dive or explosion carries no mass
        self.grid.erase_mass(key);
        if self.local_player.as_ref() == Some(key) {
            self.intents.stop();
        }

        let cause = if into.is_some() {
            DeathCause::BlackHole
        } else {
            DeathCause::Collapsed
        };
        self.events.push(WorldEvent::Sound {
            name: if into.is_some() { "dive" } else { "explode" },
            key: Some(key.clone()),
        });
        self.events.push(WorldEvent::Died {
            key: key.clone(),
            cause,
        });
        self.animations.schedule(
            DEATH_STEPS,
            Task::Death {
                player: key.clone(),
                from,
                from_size,
                into,
            },
        );
        tracing::info!("Star {} died ({})", key, cause);
    }

    /// Spend a captured planet for a short speed boost.
    pub fn accelerate(&mut self, key: &EntityKey) -> bool {
        let Some(star) = self.players.get_mut(key) else {
            return false;
        };
        if star.is_dead() || star.accelerating.is_some() {
            return false;
        }
        let Some(planet) = star.planets.pop() else {
            return false;
        };
        let id = self.animations.schedule(
            ACCELERATE_STEPS,
            Task::Accelerate {
                player: key.clone(),
            },
        );
        star.accelerating = Some(id);
        star.set_boost(ACCELERATE_BOOST);
        let from = star.body.position;

        self.detach_planet(&planet, from);
        self.events.push(WorldEvent::Sound {
            name: "accelerate",
            key: Some(key.clone()),
        });
        true
    }

    // --- planets and dust ---

    /// Activate a pooled planet. `None` when the pool is exhausted.
    pub fn add_planet(&mut self, spawn: PlanetSpawn) -> Option<EntityKey> {
        let PlanetSpawn {
            key,
            position,
            size,
            remote,
        } = spawn;
        let planet = self.planets.acquire(|p| {
            if let Some(key) = key {
                p.set_key(key);
            }
            p.body.position = position;
            p.body.size = size;
            p.remote = remote;
        })?;
        Some(planet.key().clone())
    }

    /// Return a planet to the pool, detaching it from its owner first.
    pub fn remove_planet(&mut self, key: &EntityKey) -> bool {
        let owner = self.planets.get(key).and_then(|p| p.orbit.owner.clone());
        if let Some(owner) = owner {
            if let Some(star) = self.players.get_mut(&owner) {
                star.planets.retain(|p| p != key);
            }
        }
        self.planets.release(key)
    }

    pub fn set_planet_position(&mut self, key: &EntityKey, position: Vec2) {
        if let Some(p) = self.planets.get_mut(key) {
            if p.orbit.owner.is_none() {
                p.body.position = position;
            }
        }
    }

    /// Put `planet` in orbit around `player`, taking it from any previous owner.
    pub fn capture_planet(&mut self, player: &EntityKey, planet: &EntityKey) -> bool {
        if !self.is_alive(player) {
            return false;
        }
        let previous = match self.planets.get(planet) {
            Some(p) => p.orbit.owner.clone(),
            None => return false,
        };
        if previous.as_ref() == Some(player) {
            return true;
        }
        if let Some(previous) = previous {
            if let Some(star) = self.players.get_mut(&previous) {
                star.planets.retain(|p| p != planet);
            }
        }
        let (Some(star), Some(p)) = (self.players.get_mut(player), self.planets.get_mut(planet))
        else {
            return false;
        };
        let slot = star.planets.len();
        p.attach(player, slot, star.max_planet.max(slot + 1), star.body.size);
        star.planets.push(planet.clone());

        self.events.push(WorldEvent::Captured {
            by: player.clone(),
            key: planet.clone(),
        });
        self.events.push(WorldEvent::Sound {
            name: "planet",
            key: Some(player.clone()),
        });
        true
    }

    /// Release a planet into storage while it drifts away; it becomes
    /// available again when the drift completes.
    fn detach_planet(&mut self, planet: &EntityKey, from: Vec2) {
        let Some(start) = self.planets.get(planet).map(|p| p.body.position) else {
            return;
        };
        let mut heading = normalize(sub(start, from));
        if heading.is_zero() {
            heading = from_angle(self.rng.gen::<f64>() * std::f64::consts::TAU);
        }
        self.planets.release_with(planet, |p| p.orbit.owner = None);
        self.animations.schedule(
            PLANET_RELEASE_STEPS,
            Task::PlanetRelease {
                planet: planet.clone(),
                from: start,
                heading,
            },
        );
    }

    pub fn spawn_dust(&mut self, position: Vec2) -> Option<EntityKey> {
        let size = self.config.dust_size;
        let dust = self.dusts.acquire(|d| {
            d.body.position = position;
            d.body.size = size;
        })?;
        Some(dust.key().clone())
    }

    // --- black holes ---

    pub fn spawn_black_hole(
        &mut self,
        key: Option<EntityKey>,
        position: Vec2,
        remote: bool,
    ) -> Option<EntityKey> {
        let key = key.unwrap_or_else(|| EntityKey::random(&mut self.rng));
        if self.black_holes.contains_key(&key) {
            return None;
        }
        let mut bh = BlackHole::new(
            key.clone(),
            position,
            self.config.black_hole_size,
            self.config.black_hole_gravity_field,
            self.config.black_hole_depth,
        );
        bh.remote = remote;
        bh.intro = Some(self.animations.schedule(
            INTRO_STEPS,
            Task::BlackHoleIntro {
                black_hole: key.clone(),
            },
        ));
        self.black_holes.insert(key.clone(), bh);
        self.events.push(WorldEvent::Show(key.clone()));
        tracing::debug!("Black hole {} spawned", key);
        Some(key)
    }

    pub fn remove_black_hole(&mut self, key: &EntityKey) -> bool {
        let Some(mut bh) = self.black_holes.remove(key) else {
            return false;
        };
        bh.catcher.stop(&mut self.animations);
        for event in self.animations.stop_where(|t| t.concerns(key)) {
            self.apply_animation(event);
        }
        self.grid.erase_mass(key);
        let held: Vec<EntityKey> = self
            .players
            .values()
            .filter(|s| s.absorption.black_hole_absorber() == Some(key))
            .map(|s| s.key().clone())
            .collect();
        for star in &held {
            self.absorb_stop(star);
        }
        self.events.push(WorldEvent::Hide(key.clone()));
        true
    }

    pub fn set_black_hole_position(&mut self, key: &EntityKey, position: Vec2) {
        if let Some(bh) = self.black_holes.get_mut(key) {
            bh.body.position = position;
            let (size, depth) = (bh.body.size, bh.depth);
            self.grid.set_black_hole_point(key, position, size, Some(depth));
        }
    }

    fn move_black_hole(&mut self, key: &EntityKey, step: Vec2) {
        let Some(bh) = self.black_holes.get(key) else {
            return;
        };
        let k = self.config.move_scale * BLACK_HOLE_MOVE_FACTOR;
        let position = add(bh.body.position, scale(step, k));
        self.set_black_hole_position(key, position);
    }

    fn run_black_holes(&mut self, dt: f64) {
        let interval = self.config.black_hole_wander_interval;
        let keys: Vec<EntityKey> = self
            .black_holes
            .values()
            .filter(|bh| !bh.remote)
            .map(|bh| bh.key().clone())
            .collect();
        for key in keys {
            let Some(bh) = self.black_holes.get_mut(&key) else {
                continue;
            };
            if !bh.wander_due(dt, interval) {
                continue;
            }
            let heading = from_angle(self.rng.gen::<f64>() * std::f64::consts::TAU);
            let mover = Mover::BlackHole(key.clone());
            let task = |phase| Task::Catch {
                mover: mover.clone(),
                phase,
            };
            // a single push that coasts out through inertia
            bh.catcher.catch(heading, &mut self.animations, task);
            bh.catcher.catch(Vec2::ZERO, &mut self.animations, task);
        }
    }

    // --- absorption drains ---

    fn run_absorb_timers(&mut self, dt: f64) {
        let interval = self.config.absorb_interval;
        let keys: Vec<EntityKey> = self.players.keys().cloned().collect();
        for key in keys {
            let Some(star) = self.players.get_mut(&key) else {
                continue;
            };
            if star.is_dead() {
                continue;
            }

            if let Some(target) = star.absorption.absorbing().cloned() {
                let steps = star.absorption.advance_absorb_clock(dt, interval);
                if steps > 0 {
                    match self.players.get(&target).filter(|t| !t.is_dead()) {
                        Some(victim) => {
                            let n = steps as f64;
                            let victim_size = victim.body.size - self.config.absorb_shrink * n;
                            self.set_player_size(&target, victim_size);
                            if let Some(size) = self.players.get(&key).map(|s| s.body.size) {
                                self.set_player_size(&key, size + self.config.absorb_growth * n);
                            }
                        }
                        None => self.absorb_stop(&key),
                    }
                }
            }

            let Some(star) = self.players.get_mut(&key) else {
                continue;
            };
            if star.absorption.black_hole_absorber().is_some() {
                let steps = star.absorption.advance_drain_clock(dt, interval);
                if steps > 0 {
                    let size = star.body.size - self.config.black_hole_shrink * steps as f64;
                    self.set_player_size(&key, size);
                }
            }
        }
    }

    // --- periodic checks ---

    /// Black hole captures, player-vs-player absorption, planet capture,
    /// dust pickup, then death by size.
    pub fn check_players_absorbtion(&mut self) {
        let keys: Vec<EntityKey> = self
            .players
            .values()
            .filter(|s| !s.is_dead() && s.visible)
            .map(|s| s.key().clone())
            .collect();
        for key in &keys {
            if !self.is_alive(key) {
                continue;
            }
            self.check_black_hole_absorbtion(key);
            let free = self
                .players
                .get(key)
                .is_some_and(|s| s.absorption.black_hole_absorber().is_none());
            if free {
                self.check_player_absorbtion(key);
            }
            self.check_planet_capture(key);
            self.check_dust_pickup(key);
        }

        let min_size = self.config.min_size;
        let starved: Vec<EntityKey> = self
            .players
            .values()
            .filter(|s| !s.is_dead() && s.body.size < min_size)
            .map(|s| s.key().clone())
            .collect();
        for key in &starved {
            self.die(key);
        }
    }

    fn check_black_hole_absorbtion(&mut self, key: &EntityKey) {
        let ratio = self.config.gravity_ratio;
        let Some(star) = self.players.get(key) else {
            return;
        };
        let position = star.body.position;

        if let Some(held_by) = star.absorption.black_hole_absorber().cloned() {
            let pull = self
                .black_holes
                .get(&held_by)
                .map(|bh| (distance(position, bh.body.position), bh.gravity_field));
            match pull {
                Some((dist, field)) => {
                    if let Some(star) = self.players.get_mut(key) {
                        star.absorption.set_pull(dist, field);
                    }
                }
                None => self.absorb_stop(key),
            }
            return;
        }

        let mut best: Option<(&EntityKey, f64)> = None;
        for bh in self.black_holes.values() {
            let d = distance(position, bh.body.position);
            if d < bh.reach(ratio) && best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((bh.key(), d));
            }
        }
        if let Some(black_hole) = best.map(|(k, _)| k.clone()) {
            self.absorb_by_black_hole(key, &black_hole);
        }
    }

    fn check_player_absorbtion(&mut self, key: &EntityKey) {
        let ratio = self.config.gravity_ratio;
        let Some(star) = self.players.get(key) else {
            return;
        };
        if star.absorption.absorbing().is_some() {
            return;
        }
        let field = star.gravity_field(ratio);
        let reach = field * ratio;
        let position = star.body.position;

        let mut best: Option<(&EntityKey, f64)> = None;
        for other in self.players.values() {
            if other.key() == key
                || other.is_dead()
                || !other.visible
                || other.absorption.absorbed_by().is_some()
                || other.absorption.absorbing() == Some(key)
                || other.gravity_field(ratio) >= field
            {
                continue;
            }
            let d = distance(position, other.body.position);
            if d < reach && best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((other.key(), d));
            }
        }
        if let Some(target) = best.map(|(k, _)| k.clone()) {
            self.absorb_target(key, &target);
        }
    }

    fn check_planet_capture(&mut self, key: &EntityKey) {
        let ratio = self.config.gravity_ratio;
        let Some(star) = self.players.get(key) else {
            return;
        };
        if !star.can_capture_planet() {
            return;
        }
        let reach = star.reach(ratio);
        let position = star.body.position;

        let mut best: Option<(&EntityKey, f64)> = None;
        for planet in self.planets.iter().filter(|p| !p.attached_to_star) {
            let d = distance(position, planet.body.position);
            if d < reach && best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((planet.key(), d));
            }
        }
        if let Some(planet) = best.map(|(k, _)| k.clone()) {
            self.capture_planet(key, &planet);
        }
    }

    fn check_dust_pickup(&mut self, key: &EntityKey) {
        let Some(star) = self.players.get(key) else {
            return;
        };
        let reach = star.gravity_field(self.config.gravity_ratio) * self.config.dust_reach;
        let position = star.body.position;

        let picked: Vec<(EntityKey, Vec2)> = self
            .dusts
            .iter()
            .filter(|d| !d.attached_to_star && distance(position, d.body.position) < reach)
            .map(|d| (d.key().clone(), d.body.position))
            .collect();
        for (dust, from) in picked {
            if let Some(d) = self.dusts.get_mut(&dust) {
                d.attached_to_star = true;
                d.orbit.owner = Some(key.clone());
            }
            self.animations.schedule(
                DUST_PICKUP_STEPS,
                Task::DustPickup {
                    dust,
                    player: key.clone(),
                    from,
                },
            );
        }
    }

    /// Recycle far-away free bodies, then top dust and planets back up.
    pub fn check_ressource_map(&mut self) {
        let (center, size) = self.anchor();
        let cull = self.config.cull_distance * size.max(1.0);

        let far_dust: Vec<EntityKey> = self
            .dusts
            .iter()
            .filter(|d| !d.attached_to_star && distance(center, d.body.position) > cull)
            .map(|d| d.key().clone())
            .collect();
        for key in &far_dust {
            self.dusts.release(key);
        }
        let far_planets: Vec<EntityKey> = self
            .planets
            .iter()
            .filter(|p| !p.remote && !p.attached_to_star)
            .filter(|p| distance(center, p.body.position) > cull)
            .map(|p| p.key().clone())
            .collect();
        for key in &far_planets {
            self.planets.release(key);
        }

        let dust_target = (size * self.config.dust_density).round().max(0.0) as usize;
        for _ in self.dusts.active_len()..dust_target {
            let position = self.ring_position(center, size);
            if self.spawn_dust(position).is_none() {
                break;
            }
        }

        for _ in self.planets.active_len()..self.config.planet_target as usize {
            let position = self.ring_position(center, size);
            let planet_size = self
                .rng
                .gen_range(self.config.planet_min_size..=self.config.planet_max_size);
            let spawn = PlanetSpawn {
                key: None,
                position,
                size: planet_size,
                remote: false,
            };
            if self.add_planet(spawn).is_none() {
                break;
            }
        }
    }

    /// Bot visibility and population, black hole population.
    pub fn check_ia(&mut self) {
        let (center, size) = self.anchor();
        let visible_distance = self.config.bot_visible_distance * size.max(1.0);

        // visibility gating only; far bots keep roaming
        let mut toggled = Vec::new();
        for star in self.players.values_mut().filter(|s| s.is_bot() && !s.is_dead()) {
            let visible = distance(center, star.body.position) < visible_distance;
            if visible != star.visible {
                star.visible = visible;
                toggled.push((star.key().clone(), visible));
            }
        }
        for (key, visible) in toggled {
            self.events.push(if visible {
                WorldEvent::Show(key)
            } else {
                WorldEvent::Hide(key)
            });
        }

        let wanted = self.config.bot_count as usize;
        let have = self.bots.count() + self.bots.pending();
        if have < wanted {
            self.bots
                .queue_spawns(wanted - have, self.config.bot_spawn_stagger);
        }

        let local_holes = self.black_holes.values().filter(|bh| !bh.remote).count();
        for _ in local_holes..self.config.black_hole_count as usize {
            let position = self.ring_position(center, size);
            self.spawn_black_hole(None, position, false);
        }
    }

    fn spawn_bot(&mut self) -> Option<EntityKey> {
        let (center, size) = self.anchor();
        let position = self.ring_position(center, size);
        let category = category::random(&mut self.rng);
        let bot_size = self.config.start_size * (0.6 + self.rng.gen::<f64>() * 1.4);
        let name = format!("bot-{}", self.rng.gen_range(100..1000));
        self.create_player(PlayerSpawn {
            key: None,
            name,
            category,
            position,
            size: bot_size.max(self.config.min_size),
            control: Control::Bot,
        })
    }

    fn run_bots(&mut self, dt: f64) {
        for _ in 0..self.bots.take_due_spawns(dt) {
            self.spawn_bot();
        }
        if self.bots.count() == 0 {
            return;
        }

        let ratio = self.config.gravity_ratio;
        let mut sightings: Vec<Sighting> = self
            .players
            .values()
            .filter(|s| !s.is_dead())
            .map(|s| Sighting {
                key: s.key().clone(),
                position: s.body.position,
                gravity_field: s.gravity_field(ratio),
                black_hole: false,
            })
            .collect();
        sightings.extend(self.black_holes.values().map(|bh| Sighting {
            key: bh.key().clone(),
            position: bh.body.position,
            gravity_field: bh.gravity_field,
            black_hole: true,
        }));

        let sense = self.config.bot_visible_distance;
        let mut headings = Vec::new();
        for brain in self.bots.bots.iter_mut() {
            let Some(me) = sightings.iter().find(|s| s.key == brain.key) else {
                continue;
            };
            if let Some(heading) = brain.tick(dt, me, &sightings, sense, &mut self.rng) {
                headings.push((brain.key.clone(), heading));
            }
        }
        for (key, heading) in headings {
            self.steer(&key, heading);
        }
    }

    /// Clear the map: players, black holes, dust, planets, in that order.
    pub fn erase_all_entity(&mut self) {
        for star in self.players.values_mut() {
            for planet in std::mem::take(&mut star.planets) {
                self.planets.release(&planet);
            }
        }
        for key in self.players.keys() {
            self.grid.erase_mass(key);
        }
        self.players.clear();
        self.bots.clear();

        for key in self.black_holes.keys() {
            self.grid.erase_mass(key);
        }
        self.black_holes.clear();

        self.dusts.erase_all();
        self.planets.erase_all();

        self.animations.clear();
        self.player_to_follow = None;
        self.local_player = None;
        self.intents.stop();
        tracing::debug!("Map erased");
    }

    /// Keys of players mirrored from the room.
    pub fn remote_player_keys(&self) -> Vec<EntityKey> {
        self.players
            .values()
            .filter(|s| s.is_remote())
            .map(|s| s.key().clone())
            .collect()
    }

    pub fn remote_planet_keys(&self) -> Vec<EntityKey> {
        self.planets
            .iter()
            .filter(|p| p.remote)
            .map(|p| p.key().clone())
            .collect()
    }

    pub fn remote_black_hole_keys(&self) -> Vec<EntityKey> {
        self.black_holes
            .values()
            .filter(|bh| bh.remote)
            .map(|bh| bh.key().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::by_name;
    use stardust_shared::vec2::vec2;

    const DT: f64 = 1.0 / 60.0;

    /// Quiet world: no bots, black holes or resource spawning.
    fn test_config() -> WorldConfig {
        WorldConfig {
            bot_count: 0,
            black_hole_count: 0,
            dust_density: 0.0,
            planet_target: 0,
            ..WorldConfig::default()
        }
    }

    fn world() -> TileMap {
        TileMap::new(test_config(), 42)
    }

    fn star_at(world: &mut TileMap, key: &str, x: f64, size: f64) -> EntityKey {
        world
            .create_player(PlayerSpawn {
                key: Some(key.into()),
                name: key.to_string(),
                category: by_name("yellow_dwarf").unwrap(),
                position: vec2(x, 0.0),
                size,
                control: Control::Remote,
            })
            .unwrap()
    }

    fn run(world: &mut TileMap, frames: usize) {
        for _ in 0..frames {
            world.update(DT);
        }
    }

    // --- absorption ---

    #[test]
    fn bigger_star_absorbs_smaller_neighbour() {
        let mut w = world();
        let small = star_at(&mut w, "small", 0.0, 2.0);
        let big = star_at(&mut w, "big", 3.0, 5.0);

        w.check_players_absorbtion();
        assert_eq!(w.player(&big).unwrap().absorption.absorbing(), Some(&small));
        assert_eq!(
            w.player(&small).unwrap().absorption.player_absorber(),
            Some(&big)
        );
        assert!(w.player(&small).unwrap().absorption.absorbing().is_none());
    }

    #[test]
    fn absorption_drains_until_death() {
        let mut w = world();
        let small = star_at(&mut w, "small", 0.0, 2.0);
        let big = star_at(&mut w, "big", 3.0, 5.0);
        w.set_check(true);

        run(&mut w, 60 * 10);
        assert!(w.player(&small).is_none(), "victim disposed after its death animation");
        let big_star = w.player(&big).unwrap();
        let gained = big_star.body.size - 5.0;
        assert!(gained > 0.0);
        // absorber grows by less than the victim lost
        assert!(gained < 2.0);
        assert!(big_star.absorption.absorbing().is_none());

        let events = w.drain_events();
        assert!(events.contains(&WorldEvent::Died {
            key: small,
            cause: DeathCause::Collapsed
        }));
    }

    #[test]
    fn equal_stars_do_not_absorb_each_other() {
        let mut w = world();
        let a = star_at(&mut w, "a", 0.0, 3.0);
        let b = star_at(&mut w, "b", 3.0, 3.0);
        w.check_players_absorbtion();
        assert!(w.player(&a).unwrap().absorption.absorbing().is_none());
        assert!(w.player(&b).unwrap().absorption.absorbing().is_none());
    }

    #[test]
    fn victim_growing_mid_absorption_keeps_the_relationship() {
        let mut w = world();
        let small = star_at(&mut w, "small", 0.0, 2.0);
        let big = star_at(&mut w, "big", 3.0, 5.0);
        w.check_players_absorbtion();
        assert_eq!(w.player(&big).unwrap().absorption.absorbing(), Some(&small));

        w.set_player_size(&small, 9.0);
        w.check_players_absorbtion();
        assert_eq!(w.player(&big).unwrap().absorption.absorbing(), Some(&small));
        assert!(w.player(&small).unwrap().absorption.absorbing().is_none());
        assert!(!w.absorb_target(&small, &big));
        assert!(w.player(&big).unwrap().absorption.absorbed_by().is_none());
    }

    #[test]
    fn absorb_target_twice_is_noop() {
        let mut w = world();
        let big = star_at(&mut w, "big", 0.0, 5.0);
        let s1 = star_at(&mut w, "s1", 3.0, 1.0);
        let s2 = star_at(&mut w, "s2", -3.0, 1.0);
        assert!(w.absorb_target(&big, &s1));
        assert!(!w.absorb_target(&big, &s2));
        assert_eq!(w.player(&big).unwrap().absorption.absorbing(), Some(&s1));
        assert!(w.player(&s2).unwrap().absorption.absorbed_by().is_none());
    }

    #[test]
    fn absorb_stop_is_idempotent_and_releases_victim() {
        let mut w = world();
        let big = star_at(&mut w, "big", 0.0, 5.0);
        let small = star_at(&mut w, "small", 3.0, 1.0);
        w.absorb_target(&big, &small);
        w.absorb_stop(&big);
        w.absorb_stop(&big);
        assert!(w.player(&big).unwrap().absorption.absorbing().is_none());
        assert!(w.player(&small).unwrap().absorption.absorbed_by().is_none());
    }

    #[test]
    fn black_hole_takes_priority() {
        let mut w = world();
        let bh = w.spawn_black_hole(Some("bh".into()), vec2(10.0, 0.0), false).unwrap();
        run(&mut w, INTRO_STEPS as usize + 2);
        assert_eq!(w.black_hole(&bh).unwrap().gravity_field, 3.0);

        let star = star_at(&mut w, "star", 0.0, 5.0);
        let _prey = star_at(&mut w, "prey", -3.0, 1.0);
        w.check_players_absorbtion();

        let s = w.player(&star).unwrap();
        assert_eq!(s.absorption.black_hole_absorber(), Some(&bh));
        assert!(s.absorption.absorbing().is_none());
        assert!(s.absorption.velocity_multiplier() < 1.0);
    }

    #[test]
    fn black_hole_capture_releases_victim() {
        let mut w = world();
        let big = star_at(&mut w, "big", 0.0, 5.0);
        let small = star_at(&mut w, "small", -3.0, 1.0);
        assert!(w.absorb_target(&big, &small));

        let bh = w.spawn_black_hole(Some("bh".into()), vec2(100.0, 0.0), false).unwrap();
        assert!(w.absorb_by_black_hole(&big, &bh));
        assert!(w.player(&big).unwrap().absorption.absorbing().is_none());
        assert!(w.player(&small).unwrap().absorption.absorbed_by().is_none());
    }

    #[test]
    fn black_hole_death_dives() {
        let mut w = world();
        let bh = w.spawn_black_hole(Some("bh".into()), vec2(5.0, 0.0), false).unwrap();
        run(&mut w, INTRO_STEPS as usize + 2);
        let star = star_at(&mut w, "star", 0.0, 0.6);
        w.set_check(true);
        run(&mut w, 60 * 5);
        assert!(w.player(&star).is_none());
        assert!(w
            .drain_events()
            .contains(&WorldEvent::Died {
                key: star,
                cause: DeathCause::BlackHole
            }));
        assert!(w.black_hole(&bh).is_some());
    }

    // --- death ---

    #[test]
    fn size_below_minimum_dies_on_next_check() {
        let mut w = world();
        let s = star_at(&mut w, "s", 0.0, 1.0);
        w.set_player_size(&s, 0.4);
        w.check_players_absorbtion();
        assert!(w.player(&s).unwrap().is_dead());
        assert!(w.grid().footprint(&s).is_empty(), "dying star leaves the grid at once");

        // dead stars are never absorbers or targets
        let big = star_at(&mut w, "big", 2.0, 5.0);
        w.check_players_absorbtion();
        assert!(w.player(&big).unwrap().absorption.absorbing().is_none());

        run(&mut w, DEATH_STEPS as usize + 2);
        assert!(w.player(&s).is_none());
        assert!(w.grid().footprint(&s).is_empty());
    }

    #[test]
    fn dying_star_releases_planets() {
        let mut w = world();
        let s = star_at(&mut w, "s", 0.0, 1.0);
        let p = w
            .add_planet(PlanetSpawn {
                key: Some("p".into()),
                position: vec2(5.0, 0.0),
                size: 0.3,
                remote: false,
            })
            .unwrap();
        assert!(w.capture_planet(&s, &p));
        w.die(&s);

        assert!(!w.planets().contains(&p));
        // still reserved while drifting away
        assert_eq!(w.planets().available(), w.planets().total_created() - 1);
        run(&mut w, PLANET_RELEASE_STEPS as usize + 2);
        assert_eq!(w.planets().available(), w.planets().total_created());
    }

    // --- planets and dust ---

    #[test]
    fn nearby_planet_is_captured() {
        let mut w = world();
        let s = star_at(&mut w, "s", 0.0, 1.0);
        let p = w
            .add_planet(PlanetSpawn {
                key: None,
                position: vec2(10.0, 0.0),
                size: 0.3,
                remote: false,
            })
            .unwrap();
        w.check_players_absorbtion();
        assert_eq!(w.player(&s).unwrap().planets, vec![p.clone()]);
        let planet = w.planets().get(&p).unwrap();
        assert!(planet.attached_to_star);
        assert_eq!(planet.orbit.owner.as_ref(), Some(&s));

        run(&mut w, 10);
        let d = distance(w.planets().get(&p).unwrap().body.position, vec2(0.0, 0.0));
        assert!((d - w.planets().get(&p).unwrap().orbit.stationary_radius).abs() < 1e-9);
    }

    #[test]
    fn no_capture_while_accelerating() {
        let mut w = world();
        let s = star_at(&mut w, "s", 0.0, 1.0);
        let first = w
            .add_planet(PlanetSpawn {
                key: None,
                position: vec2(10.0, 0.0),
                size: 0.3,
                remote: false,
            })
            .unwrap();
        assert!(w.capture_planet(&s, &first));
        assert!(w.accelerate(&s));
        assert!(w.player(&s).unwrap().planets.is_empty());
        assert!(w.player(&s).unwrap().boost() > 1.0);

        w.add_planet(PlanetSpawn {
            key: None,
            position: vec2(-10.0, 0.0),
            size: 0.3,
            remote: false,
        })
        .unwrap();
        w.check_players_absorbtion();
        assert!(w.player(&s).unwrap().planets.is_empty());

        // without planets there is nothing to spend
        run(&mut w, ACCELERATE_STEPS as usize + 2);
        assert_eq!(w.player(&s).unwrap().boost(), 1.0);
    }

    #[test]
    fn planet_capacity_is_respected() {
        let mut w = world();
        let s = star_at(&mut w, "s", 0.0, 1.0);
        for n in 0..6 {
            w.add_planet(PlanetSpawn {
                key: None,
                position: vec2(5.0 + n as f64, 0.0),
                size: 0.3,
                remote: false,
            });
        }
        for _ in 0..10 {
            w.check_players_absorbtion();
        }
        assert_eq!(w.player(&s).unwrap().planets.len(), 4);
    }

    #[test]
    fn dust_pickup_grows_player() {
        let mut w = world();
        let s = star_at(&mut w, "s", 0.0, 1.0);
        let dust = w.spawn_dust(vec2(5.0, 0.0)).unwrap();
        w.check_players_absorbtion();
        assert!(w.dusts().get(&dust).unwrap().attached_to_star);

        run(&mut w, DUST_PICKUP_STEPS as usize + 2);
        assert!(!w.dusts().contains(&dust));
        let expected = 1.0 + w.config().dust_size / 20.0;
        assert!((w.player(&s).unwrap().body.size - expected).abs() < 1e-9);
    }

    // --- resources ---

    #[test]
    fn resource_spawning_stops_at_pool_exhaustion() {
        let config = WorldConfig {
            dust_pool: 5,
            dust_density: 60.0,
            planet_pool: 3,
            planet_target: 3,
            ..test_config()
        };
        let mut w = TileMap::new(config, 7);
        w.check_ressource_map();
        assert_eq!(w.dusts().active_len(), 5);
        assert_eq!(w.planets().active_len(), 3);
        assert_eq!(
            w.dusts().active_len() + w.dusts().storage_len(),
            w.dusts().total_created()
        );
        w.check_ressource_map();
        assert_eq!(w.dusts().active_len(), 5);
    }

    #[test]
    fn resources_spawn_on_ring_around_anchor() {
        let config = WorldConfig {
            dust_density: 20.0,
            ..test_config()
        };
        let mut w = TileMap::new(config, 9);
        w.check_ressource_map();
        let (inner, outer) = (w.config().spawn_inner, w.config().spawn_outer);
        for dust in w.dusts().iter() {
            let d = distance(dust.body.position, Vec2::ZERO);
            assert!(d >= inner - 1e-9 && d <= outer + 1e-9);
        }
        assert_eq!(w.dusts().active_len(), 20);
    }

    #[test]
    fn far_dust_is_recycled() {
        let config = WorldConfig {
            dust_density: 0.0,
            ..test_config()
        };
        let mut w = TileMap::new(config, 9);
        let far = w.spawn_dust(vec2(50_000.0, 0.0)).unwrap();
        let near = w.spawn_dust(vec2(100.0, 0.0)).unwrap();
        w.check_ressource_map();
        assert!(!w.dusts().contains(&far));
        assert!(w.dusts().contains(&near));
    }

    #[test]
    fn erase_all_entity_empties_everything() {
        let config = WorldConfig {
            dust_density: 30.0,
            planet_target: 10,
            ..test_config()
        };
        let mut w = TileMap::new(config, 5);
        let s = star_at(&mut w, "s", 0.0, 1.0);
        w.spawn_black_hole(None, vec2(300.0, 0.0), false);
        w.check_ressource_map();
        let p = w.planets().keys().next().cloned().unwrap();
        w.capture_planet(&s, &p);

        w.erase_all_entity();
        assert_eq!(w.players().count(), 0);
        assert_eq!(w.black_holes().count(), 0);
        assert_eq!(w.dusts().active_len(), 0);
        assert_eq!(w.planets().active_len(), 0);
        assert_eq!(w.planets().available(), w.planets().total_created());
        assert_eq!(w.dusts().available(), w.dusts().total_created());
        assert_eq!(w.grid().owned_cells(), 0);
        assert_eq!(w.animation_count(), 0);
    }

    // --- movement and session ---

    #[test]
    fn steering_moves_and_restamps() {
        let mut w = world();
        let key = w
            .start_game(by_name("yellow_dwarf").unwrap(), "me")
            .unwrap();
        w.catch_input(vec2(1.0, 0.0));
        run(&mut w, 10);
        let star = w.player(&key).unwrap();
        assert!(star.body.position.x > 0.0);
        assert!(star.body.position.y.abs() < 1e-9);
        assert!(!w.grid().footprint(&key).is_empty());
    }

    #[test]
    fn intents_follow_cadence() {
        let mut w = world();
        let key = w
            .start_game(by_name("red_dwarf").unwrap(), "me")
            .unwrap();
        w.catch_input(vec2(0.0, 1.0));
        run(&mut w, 31);
        let intents: Vec<Intent> = w
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                WorldEvent::Intent { key: k, intent } if k == key => Some(intent),
                _ => None,
            })
            .collect();
        assert_eq!(
            intents,
            vec![Intent::Destination {
                destination: [0.0, 1.0]
            }]
        );

        run(&mut w, 31);
        let next: Vec<WorldEvent> = w.drain_events();
        assert!(next
            .iter()
            .any(|e| matches!(e, WorldEvent::Intent { intent: Intent::Position { .. }, .. })));
    }

    #[test]
    fn bots_spawn_staggered() {
        let config = WorldConfig {
            bot_count: 3,
            ..test_config()
        };
        let mut w = TileMap::new(config, 11);
        w.start_game(by_name("yellow_dwarf").unwrap(), "me");
        run(&mut w, 120);
        assert_eq!(w.bots().count(), 0);
        assert_eq!(w.bots().pending(), 3);
        run(&mut w, 8);
        assert_eq!(w.bots().count(), 1);
        run(&mut w, 20);
        assert_eq!(w.bots().count(), 3);
        assert_eq!(w.players().filter(|s| s.is_bot()).count(), 3);
    }

    #[test]
    fn black_holes_are_maintained() {
        let config = WorldConfig {
            black_hole_count: 2,
            ..test_config()
        };
        let mut w = TileMap::new(config, 13);
        w.check_ia();
        assert_eq!(w.black_holes().count(), 2);
        w.check_ia();
        assert_eq!(w.black_holes().count(), 2);
    }

    #[test]
    fn far_bots_are_hidden_not_removed() {
        let mut w = world();
        w.start_game(by_name("yellow_dwarf").unwrap(), "me");
        let bot = w
            .create_player(PlayerSpawn {
                key: Some("far".into()),
                name: "far".to_string(),
                category: by_name("red_dwarf").unwrap(),
                position: vec2(5000.0, 0.0),
                size: 1.0,
                control: Control::Bot,
            })
            .unwrap();
        w.drain_events();

        w.check_ia();
        let star = w.player(&bot).unwrap();
        assert!(!star.visible);
        assert!(w.bots().is_bot(&bot));
        assert!(w.drain_events().contains(&WorldEvent::Hide(bot.clone())));

        w.set_player_position(&bot, vec2(100.0, 0.0));
        w.check_ia();
        assert!(w.player(&bot).unwrap().visible);
        assert!(w.drain_events().contains(&WorldEvent::Show(bot)));
    }

    #[test]
    fn removing_player_mid_animation_is_safe() {
        let mut w = world();
        let s = star_at(&mut w, "s", 0.0, 1.0);
        w.steer(&s, vec2(1.0, 0.0));
        let dust = w.spawn_dust(vec2(2.0, 0.0)).unwrap();
        w.check_players_absorbtion();
        run(&mut w, 3);
        assert!(w.remove_player(&s));
        assert!(!w.remove_player(&s));
        run(&mut w, 30);
        assert_eq!(w.animation_count(), 0);
        assert!(!w.dusts().contains(&dust));
    }
}
