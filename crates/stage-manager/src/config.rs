//! Per-transition animation configuration.

use bitflags::bitflags;
use std::collections::HashMap;
use std::time::Duration;

use stage_anim::Interpolator;

bitflags! {
    /// Behaviour switches for one transition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AnimationFlags: u32 {
        /// Progress is driven by the caller through a `PlaybackController`.
        const USER_CONTROLLED = 1 << 0;
        /// Handlers should snap instead of adding segments.
        const SKIP_ALL_ANIMATIONS = 1 << 1;
        /// Handlers may apply state while another transition is in flight.
        const ALLOW_STATE_APPLY_WHILE_TRANSITIONING = 1 << 2;
    }
}

/// Caller-defined identifier of an animated property.
pub type PropertyId = u32;

/// Duration, flags and interpolator overrides for one transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateAnimationConfig {
    pub duration: Duration,
    pub flags: AnimationFlags,
    interpolators: HashMap<PropertyId, Interpolator>,
}

impl StateAnimationConfig {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    pub fn with_flags(mut self, flags: AnimationFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn has_flag(&self, flag: AnimationFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn is_user_controlled(&self) -> bool {
        self.has_flag(AnimationFlags::USER_CONTROLLED)
    }

    /// Override the interpolator handlers use for `property`.
    pub fn set_interpolator(&mut self, property: PropertyId, interpolator: Interpolator) {
        self.interpolators.insert(property, interpolator);
    }

    /// The override for `property`, or `fallback` when none was set.
    pub fn interpolator(&self, property: PropertyId, fallback: Interpolator) -> Interpolator {
        self.interpolators
            .get(&property)
            .copied()
            .unwrap_or(fallback)
    }

    pub fn clear_interpolators(&mut self) {
        self.interpolators.clear();
    }
}
