//! The state contract and transition observers.

use std::fmt;
use std::time::Duration;

use crate::container::StatefulContainer;

/// A discrete visual state of a container.
///
/// States are small value types (usually a fieldless enum). Equality is
/// identity: the manager compares states with `==`.
pub trait State: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Duration of a transition into (`entering == true`) or out of this state.
    fn transition_duration(&self, container: &dyn StatefulContainer<Self>, entering: bool)
        -> Duration;

    /// The state to remember as "last stable" when this state becomes stable
    /// after `previous`.
    fn history_for_state(&self, _previous: Self) -> Self {
        *self
    }

    /// Re-applying this state should keep data state (jump the running
    /// animation to its end instead of cancelling it mid-way).
    fn should_preserve_data_state_on_reapply(&self) -> bool {
        false
    }

    /// Leaving the container while in this state should return to the rest state.
    fn should_disable_restore(&self) -> bool {
        false
    }
}

/// Observer of state transitions.
///
/// Listeners are notified in registration order. Both callbacks run without
/// any manager lock held, so a listener may start another transition.
#[cfg_attr(test, mockall::automock)]
pub trait StateListener<S: State>: Send + Sync {
    /// A transition to `to_state` has started (or an immediate change is applied).
    fn on_state_transition_start(&self, _to_state: S) {}

    /// The container is now stable in `final_state`.
    fn on_state_transition_complete(&self, _final_state: S) {}
}
