/// 2D vector utilities for the simulation plane.
/// The renderer's vertical axis never enters simulation state.

#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }

    pub fn from_array(a: [f64; 2]) -> Self {
        Self::new(a[0], a[1])
    }
}

/// Shorthand constructor
pub fn vec2(x: f64, y: f64) -> Vec2 {
    Vec2::new(x, y)
}

/// Dot product
pub fn dot(a: Vec2, b: Vec2) -> f64 {
    a.x * b.x + a.y * b.y
}

/// Vector length
pub fn length(v: Vec2) -> f64 {
    dot(v, v).sqrt()
}

pub fn distance(a: Vec2, b: Vec2) -> f64 {
    length(sub(a, b))
}

/// Normalize vector to unit length. The zero vector stays zero.
pub fn normalize(v: Vec2) -> Vec2 {
    let len = length(v);
    if len < 1e-10 {
        return Vec2::ZERO;
    }
    Vec2::new(v.x / len, v.y / len)
}

/// Scale vector by scalar
pub fn scale(v: Vec2, s: f64) -> Vec2 {
    Vec2::new(v.x * s, v.y * s)
}

/// Component-wise product
pub fn mul(a: Vec2, b: Vec2) -> Vec2 {
    Vec2::new(a.x * b.x, a.y * b.y)
}

/// Add two vectors
pub fn add(a: Vec2, b: Vec2) -> Vec2 {
    Vec2::new(a.x + b.x, a.y + b.y)
}

/// Subtract vectors (a - b)
pub fn sub(a: Vec2, b: Vec2) -> Vec2 {
    Vec2::new(a.x - b.x, a.y - b.y)
}

/// Linear interpolation, `t` is not clamped.
pub fn lerp(a: Vec2, b: Vec2, t: f64) -> Vec2 {
    add(a, scale(sub(b, a), t))
}

/// Unit vector pointing at `angle` radians from +x.
pub fn from_angle(angle: f64) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

/// Snap each component to the nearest multiple of `step`.
pub fn round_to(v: Vec2, step: f64) -> Vec2 {
    Vec2::new((v.x / step).round() * step, (v.y / step).round() * step)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_zero_stays_zero() {
        assert_eq!(normalize(Vec2::ZERO), Vec2::ZERO);
        let n = normalize(vec2(3.0, 4.0));
        assert!((length(n) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = vec2(1.0, 2.0);
        let b = vec2(4.0, 6.0);
        assert!((distance(a, b) - 5.0).abs() < 1e-12);
        assert!((distance(b, a) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn round_to_snaps_to_lattice() {
        let v = round_to(vec2(13.0, -6.4), 12.5);
        assert!((v.x - 12.5).abs() < 1e-12);
        assert!((v.y + 12.5).abs() < 1e-12);
        assert_eq!(round_to(vec2(25.0, 0.0), 12.5), vec2(25.0, 0.0));
    }

    #[test]
    fn lerp_endpoints() {
        let a = vec2(0.0, 0.0);
        let b = vec2(10.0, -10.0);
        assert_eq!(lerp(a, b, 0.0), a);
        assert_eq!(lerp(a, b, 1.0), b);
        assert_eq!(lerp(a, b, 0.5), vec2(5.0, -5.0));
    }
}
