//! Per-concern state appliers.

use stage_anim::PendingAnimation;

use crate::config::StateAnimationConfig;
use crate::state::State;

/// Applies one concern of a state (a panel's alpha, a scrim, a scale...).
///
/// The manager collects handlers from the container once and calls them in
/// that order on every transition.
pub trait StateHandler<S: State>: Send + Sync {
    /// Apply `state` immediately, without animation.
    fn set_state(&self, state: S);

    /// Contribute this handler's animation segments for a transition to `to_state`.
    ///
    /// Segments must be added to `animation`; the handler must not start
    /// anything itself.
    fn set_state_with_animation(
        &self,
        to_state: S,
        config: &StateAnimationConfig,
        animation: &mut PendingAnimation,
    );

    /// A predictive back gesture towards `to_state` has started.
    fn on_back_started(&self, _to_state: S) {}

    /// The back gesture progressed to `progress` in 0.0..=1.0.
    fn on_back_progressed(&self, _to_state: S, _progress: f32) {}

    /// The back gesture was abandoned.
    fn on_back_cancelled(&self, _to_state: S) {}
}
