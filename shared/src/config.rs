/// Gameplay tuning for one world. Sent to collaborators in the welcome message.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct WorldConfig {
    /// Turns sqrt(size × gravity) into a gravity field, and a field into a reach.
    pub gravity_ratio: f64,
    /// Stars below this size die on the next maintenance check.
    pub min_size: f64,
    pub start_size: f64,
    /// Grid samples per side.
    pub map_detail: u32,
    /// World units covered by the grid window per unit of followed size.
    pub map_size: f64,
    /// Footprint width factor for grid masses.
    pub point_size: f64,
    pub dust_pool: u32,
    pub planet_pool: u32,
    /// Dust items kept around the followed player per unit of its size.
    pub dust_density: f64,
    pub dust_size: f64,
    /// Reach multiplier for dust pickup (smaller than `gravity_ratio`).
    pub dust_reach: f64,
    pub planet_target: u32,
    pub planet_min_size: f64,
    pub planet_max_size: f64,
    /// Spawn ring around the followed player, scaled by its size.
    pub spawn_inner: f64,
    pub spawn_outer: f64,
    /// Free dust and planets farther than this (× size) are recycled.
    pub cull_distance: f64,
    /// Seconds between absorption drain steps.
    pub absorb_interval: f64,
    pub absorb_shrink: f64,
    pub absorb_growth: f64,
    pub black_hole_shrink: f64,
    pub black_hole_count: u32,
    pub black_hole_size: f64,
    pub black_hole_gravity_field: f64,
    pub black_hole_depth: f64,
    /// Seconds between random wander impulses.
    pub black_hole_wander_interval: f64,
    /// World units per catcher step at size 1 and velocity 1.
    pub move_scale: f64,
    pub bot_count: u32,
    pub bot_visible_distance: f64,
    /// Seconds between staggered bot spawns.
    pub bot_spawn_stagger: f64,
    /// Absorption and resource checks run every N frames.
    pub check_every_frames: u32,
    /// Bot and black hole population checks run every N frames.
    pub bot_check_every_frames: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity_ratio: 10.0,
            min_size: 0.5,
            start_size: 1.0,
            map_detail: 64,
            map_size: 400.0,
            point_size: 1.5,
            dust_pool: 200,
            planet_pool: 50,
            dust_density: 60.0,
            dust_size: 0.5,
            dust_reach: 4.0,
            planet_target: 30,
            planet_min_size: 0.2,
            planet_max_size: 0.6,
            spawn_inner: 40.0,
            spawn_outer: 600.0,
            cull_distance: 900.0,
            absorb_interval: 0.1,    // 100 ms
            absorb_shrink: 0.05,
            absorb_growth: 0.03,
            black_hole_shrink: 0.04,
            black_hole_count: 2,
            black_hole_size: 2.0,
            black_hole_gravity_field: 3.0,
            black_hole_depth: 4.0,
            black_hole_wander_interval: 3.0,
            move_scale: 100.0,
            bot_count: 10,
            bot_visible_distance: 800.0,
            bot_spawn_stagger: 0.1,
            check_every_frames: 12,      // ~200 ms at 60 fps
            bot_check_every_frames: 120, // ~2 s at 60 fps
        }
    }
}

impl WorldConfig {
    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("gravity_ratio", self.gravity_ratio),
            ("start_size", self.start_size),
            ("map_size", self.map_size),
            ("point_size", self.point_size),
            ("dust_size", self.dust_size),
            ("dust_reach", self.dust_reach),
            ("absorb_interval", self.absorb_interval),
            ("black_hole_size", self.black_hole_size),
            ("black_hole_gravity_field", self.black_hole_gravity_field),
            ("black_hole_wander_interval", self.black_hole_wander_interval),
            ("move_scale", self.move_scale),
            ("spawn_outer", self.spawn_outer),
            ("cull_distance", self.cull_distance),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{} must be finite and > 0", name));
            }
        }
        if !self.min_size.is_finite() || self.min_size < 0.0 {
            return Err("min_size must be finite and >= 0".to_string());
        }
        if self.start_size <= self.min_size {
            return Err("start_size must be > min_size".to_string());
        }
        if self.map_detail < 2 {
            return Err("map_detail must be >= 2".to_string());
        }
        if !self.spawn_inner.is_finite() || self.spawn_inner < 0.0 || self.spawn_inner > self.spawn_outer {
            return Err("spawn_inner must be finite and within [0, spawn_outer]".to_string());
        }
        if !self.planet_min_size.is_finite()
            || self.planet_min_size <= 0.0
            || self.planet_max_size < self.planet_min_size
        {
            return Err("planet sizes must be > 0 and max >= min".to_string());
        }
        if self.planet_target > self.planet_pool {
            return Err("planet_target must not exceed planet_pool".to_string());
        }
        if self.check_every_frames == 0 || self.bot_check_every_frames == 0 {
            return Err("check cadences must be >= 1 frame".to_string());
        }
        Ok(())
    }
}
