//! Easing curves shared by the grid falloff, inertia decay and entity
//! transitions. Plain math over a normalized `t`.

/// Curve shape mapping `t` in [0, 1] to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Curve {
    #[default]
    Linear,
    /// Slow start.
    QuadIn,
    /// Slow end.
    QuadOut,
    /// Slow start and end.
    QuadInOut,
}

impl Curve {
    /// Evaluate at `t`, clamped to [0, 1]. NaN maps to 0.
    #[inline]
    pub fn ease(self, t: f64) -> f64 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        match self {
            Curve::Linear => t,
            Curve::QuadIn => t * t,
            Curve::QuadOut => 1.0 - (1.0 - t) * (1.0 - t),
            Curve::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
        }
    }
}
