//! Gravity height field around the followed player.
//!
//! A square lattice of `map_detail × map_detail` samples. Masses (stars,
//! black holes) stamp a radial falloff into it; overlapping masses compose by
//! maximum and each cell remembers which mass currently wins it.
//!
//! Re-windowing (the followed player moved a whole step, or changed size)
//! discards every mass. Masses re-stamp themselves on their next position
//! update; until then a stationary mass is invisible in the field.

use crate::easing::Curve;
use crate::entity::EntityKey;
use stardust_shared::config::WorldConfig;
use stardust_shared::vec2::{distance, round_to, vec2, Vec2};
use std::collections::HashMap;

/// Radius of a mass falloff, in world units per unit of size.
const FALLOFF_PER_SIZE: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("non-finite window: center ({x}, {y}), size {size}")]
    NonFinite { x: f64, y: f64, size: f64 },
    #[error("degenerate lattice: step {step} for half size {half_size}")]
    DegenerateLattice { step: f64, half_size: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MassSource {
    position: Vec2,
    size: f64,
    depth: f64,
    curve: Curve,
}

#[derive(Debug, Clone)]
pub struct GravityGrid {
    map_detail: usize,
    map_size: f64,
    point_size: f64,
    center: Vec2,
    half_size: f64,
    step: f64,
    heights: Vec<f64>,
    owners: Vec<Option<EntityKey>>,
    keys_to_path: HashMap<EntityKey, Vec<usize>>,
    sources: HashMap<EntityKey, MassSource>,
    version: u64,
}

impl GravityGrid {
    pub fn new(map_detail: usize, map_size: f64, point_size: f64) -> Self {
        let detail = map_detail.max(2);
        let half_size = detail as f64;
        let mut grid = Self {
            map_detail: detail,
            map_size,
            point_size,
            center: Vec2::ZERO,
            half_size,
            step: half_size * 2.0 / detail as f64,
            heights: vec![0.0; detail * detail],
            owners: vec![None; detail * detail],
            keys_to_path: HashMap::new(),
            sources: HashMap::new(),
            version: 0,
        };
        if let Err(e) = grid.set_center_and_size(Vec2::ZERO, 1.0) {
            tracing::warn!("Initial grid window rejected: {}", e);
        }
        grid
    }

    pub fn from_config(config: &WorldConfig) -> Self {
        Self::new(config.map_detail as usize, config.map_size, config.point_size)
    }

    pub fn detail(&self) -> usize {
        self.map_detail
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn half_size(&self) -> f64 {
        self.half_size
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Bumped on every change to heights.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn heights(&self) -> &[f64] {
        &self.heights
    }

    /// Move the window to follow `position` at `size`.
    ///
    /// Returns `Ok(true)` when the lattice was regenerated (all masses
    /// dropped) and `Ok(false)` when the snapped window did not change.
    pub fn set_center_and_size(&mut self, position: Vec2, size: f64) -> Result<bool, GridError> {
        if !position.is_finite() || !size.is_finite() {
            return Err(GridError::NonFinite {
                x: position.x,
                y: position.y,
                size,
            });
        }
        let detail = self.map_detail as f64;
        let raw_half = size.max(2.0) * self.map_size / 2.0;
        let half_size = ((raw_half / detail).round() * detail).max(detail);
        let step = half_size * 2.0 / detail;
        if !step.is_finite() || step <= 0.0 {
            return Err(GridError::DegenerateLattice { step, half_size });
        }

        let center = round_to(position, step);
        if center == self.center && half_size == self.half_size && self.version > 0 {
            return Ok(false);
        }

        self.center = center;
        self.half_size = half_size;
        self.step = step;
        self.heights.iter_mut().for_each(|h| *h = 0.0);
        self.owners.iter_mut().for_each(|o| *o = None);
        self.keys_to_path.clear();
        self.sources.clear();
        self.version += 1;
        Ok(true)
    }

    /// Star falloff: soft shoulder, ease-in-out.
    pub fn set_star_point(&mut self, key: &EntityKey, position: Vec2, size: f64, depth: Option<f64>) {
        self.set_mass_point(key, position, size, Curve::QuadInOut, depth);
    }

    /// Black hole falloff: steep funnel, ease-out.
    pub fn set_black_hole_point(
        &mut self,
        key: &EntityKey,
        position: Vec2,
        size: f64,
        depth: Option<f64>,
    ) {
        self.set_mass_point(key, position, size, Curve::QuadOut, depth);
    }

    /// Replace `key`'s contribution with a new footprint at `position`.
    /// Depth defaults to `size`.
    pub fn set_mass_point(
        &mut self,
        key: &EntityKey,
        position: Vec2,
        size: f64,
        curve: Curve,
        depth: Option<f64>,
    ) {
        self.erase_mass(key);
        if !position.is_finite() || !size.is_finite() || size <= 0.0 {
            return;
        }
        if distance(position, self.center) > self.half_size {
            return;
        }
        let source = MassSource {
            position,
            size,
            depth: depth.unwrap_or(size),
            curve,
        };
        let (i0, i1, j0, j1) = self.footprint_bounds(&source);
        for j in j0..=j1 {
            for i in i0..=i1 {
                if let Some(height) = self.height_of(&source, i, j) {
                    self.write(j * self.map_detail + i, key, height);
                }
            }
        }
        self.sources.insert(key.clone(), source);
        self.version += 1;
    }

    /// Remove `key`'s contribution. Vacated cells fall back to the highest
    /// remaining mass covering them, or 0.
    pub fn erase_mass(&mut self, key: &EntityKey) {
        self.sources.remove(key);
        let Some(path) = self.keys_to_path.remove(key) else {
            return;
        };
        for &cell in &path {
            self.heights[cell] = 0.0;
            self.owners[cell] = None;
        }

        let sources: Vec<(EntityKey, MassSource)> =
            self.sources.iter().map(|(k, s)| (k.clone(), *s)).collect();
        for &cell in &path {
            let (i, j) = (cell % self.map_detail, cell / self.map_detail);
            let best = sources
                .iter()
                .filter_map(|(k, s)| self.height_of(s, i, j).map(|h| (k, h)))
                .fold(None, |best: Option<(&EntityKey, f64)>, (k, h)| match best {
                    Some((_, bh)) if bh >= h => best,
                    _ => Some((k, h)),
                });
            if let Some((owner, height)) = best {
                self.write(cell, owner, height);
            }
        }
        self.version += 1;
    }

    pub fn cell_position(&self, i: usize, j: usize) -> Vec2 {
        vec2(
            self.center.x - self.half_size + i as f64 * self.step,
            self.center.y - self.half_size + j as f64 * self.step,
        )
    }

    pub fn height_at_cell(&self, i: usize, j: usize) -> Option<f64> {
        self.index(i, j).map(|idx| self.heights[idx])
    }

    pub fn owner_at_cell(&self, i: usize, j: usize) -> Option<&EntityKey> {
        self.index(i, j).and_then(|idx| self.owners[idx].as_ref())
    }

    /// Height of the nearest sample; 0 outside the window.
    pub fn height_at(&self, position: Vec2) -> f64 {
        self.nearest_cell(position)
            .and_then(|(i, j)| self.height_at_cell(i, j))
            .unwrap_or(0.0)
    }

    pub fn nearest_cell(&self, position: Vec2) -> Option<(usize, usize)> {
        let i = ((position.x - (self.center.x - self.half_size)) / self.step).round();
        let j = ((position.y - (self.center.y - self.half_size)) / self.step).round();
        let detail = self.map_detail as f64;
        if i < 0.0 || j < 0.0 || i >= detail || j >= detail {
            return None;
        }
        Some((i as usize, j as usize))
    }

    /// Cells currently won by `key`.
    pub fn footprint(&self, key: &EntityKey) -> &[usize] {
        self.keys_to_path.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total cells tagged across all masses.
    pub fn owned_cells(&self) -> usize {
        self.keys_to_path.values().map(Vec::len).sum()
    }

    fn index(&self, i: usize, j: usize) -> Option<usize> {
        (i < self.map_detail && j < self.map_detail).then(|| j * self.map_detail + i)
    }

    /// Half width of the square footprint, in cells.
    fn footprint_width(&self, size: f64) -> i64 {
        (size * self.point_size * self.map_detail as f64 / 20.0).round() as i64
    }

    fn footprint_bounds(&self, source: &MassSource) -> (usize, usize, usize, usize) {
        let width = self.footprint_width(source.size);
        let max = self.map_detail as i64 - 1;
        let ci = ((source.position.x - (self.center.x - self.half_size)) / self.step).round() as i64;
        let cj = ((source.position.y - (self.center.y - self.half_size)) / self.step).round() as i64;
        let clamp = |v: i64| v.clamp(0, max) as usize;
        (
            clamp(ci - width),
            clamp(ci + width),
            clamp(cj - width),
            clamp(cj + width),
        )
    }

    /// Height `source` would put at cell (i, j), if the cell is inside its footprint.
    fn height_of(&self, source: &MassSource, i: usize, j: usize) -> Option<f64> {
        let (i0, i1, j0, j1) = self.footprint_bounds(source);
        if i < i0 || i > i1 || j < j0 || j > j1 {
            return None;
        }
        let dist = distance(source.position, self.cell_position(i, j));
        let perc = source.curve.ease(dist / (source.size * FALLOFF_PER_SIZE));
        Some((source.depth - source.depth * perc).max(0.0))
    }

    fn write(&mut self, cell: usize, key: &EntityKey, height: f64) {
        if height <= self.heights[cell] {
            return;
        }
        if let Some(previous) = self.owners[cell].take() {
            if &previous != key {
                if let Some(path) = self.keys_to_path.get_mut(&previous) {
                    if let Some(pos) = path.iter().position(|&c| c == cell) {
                        path.swap_remove(pos);
                    }
                    if path.is_empty() {
                        self.keys_to_path.remove(&previous);
                    }
                }
            }
        }
        self.heights[cell] = height;
        let path = self.keys_to_path.entry(key.clone()).or_default();
        if !path.contains(&cell) {
            path.push(cell);
        }
        self.owners[cell] = Some(key.clone());
    }
}
