//! Animator listeners the manager attaches to the animations it tracks.

use parking_lot::Mutex;
use std::sync::Weak;

use stage_anim::{AnimationOutcome, Animator, AnimatorListener};

use super::{Bookkeeping, StateManager};
use crate::state::State;

/// Drives transition start/end bookkeeping for a composite animation.
///
/// A cancelled run never reaches `on_state_transition_end`; if it was still
/// the tracked run, the manager rolls `state` back to the stable state.
pub(super) struct StateTransitionListener<S: State> {
    manager: Weak<StateManager<S>>,
    state: S,
}

impl<S: State> StateTransitionListener<S> {
    pub(super) fn new(manager: Weak<StateManager<S>>, state: S) -> Self {
        Self { manager, state }
    }
}

impl<S: State> AnimatorListener for StateTransitionListener<S> {
    fn on_start(&self, _animator: &Animator) {
        if let Some(manager) = self.manager.upgrade() {
            manager.on_state_transition_start(self.state);
        }
    }

    fn on_end(&self, animator: &Animator, outcome: AnimationOutcome) {
        let Some(manager) = self.manager.upgrade() else {
            return;
        };
        if outcome.is_success() {
            manager.on_state_transition_end(self.state);
        } else {
            manager.on_state_transition_abandoned(animator, self.state);
        }
    }
}

/// Drops the manager's handles once the tracked animation ends.
pub(super) struct AnimationEndListener<S: State> {
    bookkeeping: Weak<Mutex<Bookkeeping<S>>>,
}

impl<S: State> AnimationEndListener<S> {
    pub(super) fn new(bookkeeping: Weak<Mutex<Bookkeeping<S>>>) -> Self {
        Self { bookkeeping }
    }
}

impl<S: State> AnimatorListener for AnimationEndListener<S> {
    fn on_end(&self, animator: &Animator, _outcome: AnimationOutcome) {
        if let Some(bookkeeping) = self.bookkeeping.upgrade() {
            bookkeeping.lock().animation.on_animation_end(animator);
        }
    }
}
