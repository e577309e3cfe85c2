//! Easing curves for transition segments.

/// Easing curve applied to a segment's local progress.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Interpolator {
    /// Linear interpolation.
    #[default]
    Linear,
    /// Cubic ease-in (accelerating) - good for elements leaving.
    Accelerate,
    /// Cubic ease-out (decelerating) - good for elements arriving.
    Decelerate,
    /// Smooth S-curve - good for general transitions.
    AccelerateDecelerate,
    /// Slight overshoot then settle.
    Overshoot,
}

impl Interpolator {
    /// Apply the easing curve to a progress value (0.0 to 1.0).
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::Accelerate => t * t * t,
            Self::Decelerate => {
                let inv = 1.0 - t;
                1.0 - inv * inv * inv
            }
            Self::AccelerateDecelerate => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let inv = -2.0 * t + 2.0;
                    1.0 - inv * inv * inv / 2.0
                }
            }
            Self::Overshoot => {
                let c1 = 1.70158;
                let c3 = c1 + 1.0;
                let t_minus_1 = t - 1.0;
                1.0 + c3 * t_minus_1 * t_minus_1 * t_minus_1 + c1 * t_minus_1 * t_minus_1
            }
        }
    }

    /// Check if this curve can produce values outside 0.0-1.0.
    pub fn can_overshoot(self) -> bool {
        matches!(self, Self::Overshoot)
    }
}
