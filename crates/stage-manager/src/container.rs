//! The host whose state is being managed.

use std::sync::Arc;

use crate::atomic::AtomicAnimationFactory;
use crate::handler::StateHandler;
use crate::state::State;

/// A container that owns state handlers and receives lifecycle hooks.
pub trait StatefulContainer<S: State>: Send + Sync {
    /// The handlers that apply state. Called once, when the manager first needs them.
    fn collect_state_handlers(&self) -> Vec<Arc<dyn StateHandler<S>>>;

    /// Factory for per-element animations. Defaults to one with no slots.
    fn create_atomic_animation_factory(&self) -> AtomicAnimationFactory<S> {
        AtomicAnimationFactory::new(0)
    }

    /// Whether transitions should animate when the caller does not say.
    fn should_animate_state_change(&self) -> bool {
        true
    }

    fn on_state_set_start(&self, _state: S) {}

    fn on_state_set_end(&self, _state: S) {}

    /// A repeated request for the current state was dropped.
    fn on_repeat_state_set_aborted(&self, _state: S) {}
}
