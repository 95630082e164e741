//! Star archetypes. A new star copies its stats from one of these.

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Category {
    pub name: &'static str,
    /// Surface temperature in kelvin; drives the star's color.
    pub temperature: f64,
    /// Planets the star can hold at once.
    pub planet_count: usize,
    pub gravity: f64,
    pub velocity: f64,
}

pub const CATEGORIES: [Category; 4] = [
    Category {
        name: "red_dwarf",
        temperature: 3200.0,
        planet_count: 2,
        gravity: 0.08,
        velocity: 1.2,
    },
    Category {
        name: "yellow_dwarf",
        temperature: 5800.0,
        planet_count: 4,
        gravity: 0.1,
        velocity: 1.0,
    },
    Category {
        name: "blue_giant",
        temperature: 20000.0,
        planet_count: 6,
        gravity: 0.14,
        velocity: 0.8,
    },
    Category {
        name: "neutron_star",
        temperature: 600000.0,
        planet_count: 1,
        gravity: 0.2,
        velocity: 1.4,
    },
];

pub fn by_name(name: &str) -> Option<Category> {
    CATEGORIES.iter().copied().find(|c| c.name == name)
}

pub fn random(rng: &mut impl Rng) -> Category {
    CATEGORIES[rng.gen_range(0..CATEGORIES.len())]
}

/// Approximate black-body color for `kelvin`, packed as 0xRRGGBB.
pub fn temperature_color(kelvin: f64) -> u32 {
    let t = (kelvin / 100.0).clamp(10.0, 400.0);

    let r = if t <= 66.0 {
        255.0
    } else {
        329.698_727_446 * (t - 60.0).powf(-0.133_204_759_2)
    };
    let g = if t <= 66.0 {
        99.470_802_586_1 * t.ln() - 161.119_568_166_1
    } else {
        288.122_169_528_3 * (t - 60.0).powf(-0.075_514_849_2)
    };
    let b = if t >= 66.0 {
        255.0
    } else if t <= 19.0 {
        0.0
    } else {
        138.517_731_223_1 * (t - 10.0).ln() - 305.044_792_730_7
    };

    let channel = |v: f64| v.clamp(0.0, 255.0) as u32;
    (channel(r) << 16) | (channel(g) << 8) | channel(b)
}
