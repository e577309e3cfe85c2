//! Bookkeeping for the transition currently in flight.

use stage_anim::{Animator, PlaybackController};

use crate::config::StateAnimationConfig;
use crate::state::State;

/// What the manager knows about the running transition.
///
/// `change_id` increases on every [`reset`](Self::reset) so work scheduled
/// for an older transition can tell it has been superseded.
#[derive(Debug)]
pub struct AnimationState<S> {
    config: StateAnimationConfig,
    target_state: Option<S>,
    current_animation: Option<Animator>,
    playback_controller: Option<PlaybackController>,
    change_id: u64,
}

impl<S: State> AnimationState<S> {
    pub fn new() -> Self {
        Self {
            config: StateAnimationConfig::default(),
            target_state: None,
            current_animation: None,
            playback_controller: None,
            change_id: 0,
        }
    }

    pub fn config(&self) -> &StateAnimationConfig {
        &self.config
    }

    pub(crate) fn config_mut(&mut self) -> &mut StateAnimationConfig {
        &mut self.config
    }

    pub(crate) fn set_config(&mut self, config: StateAnimationConfig) {
        self.config = config;
    }

    /// The state the running transition is heading to.
    pub fn target_state(&self) -> Option<S> {
        self.target_state
    }

    pub fn current_animation(&self) -> Option<&Animator> {
        self.current_animation.as_ref()
    }

    pub fn playback_controller(&self) -> Option<&PlaybackController> {
        self.playback_controller.as_ref()
    }

    pub fn change_id(&self) -> u64 {
        self.change_id
    }

    /// Either an animation or a controller is still referenced.
    pub fn has_live_handles(&self) -> bool {
        self.current_animation.is_some() || self.playback_controller.is_some()
    }

    /// A caller-driven animation is current.
    pub fn is_user_controlled(&self) -> bool {
        self.current_animation.is_some() && self.config.is_user_controlled()
    }

    pub(crate) fn set_animation(&mut self, animation: Animator, target: Option<S>) {
        self.current_animation = Some(animation);
        self.target_state = target;
    }

    pub(crate) fn set_playback_controller(&mut self, controller: PlaybackController) {
        self.playback_controller = Some(controller);
    }

    /// Forget the current animation (and its controller) without cancelling it.
    pub(crate) fn clear_current_animation(&mut self) {
        self.current_animation = None;
        self.playback_controller = None;
    }

    /// `animation` is the tracked animation or the target of the tracked controller.
    pub(crate) fn is_tracking(&self, animation: &Animator) -> bool {
        self.current_animation
            .as_ref()
            .is_some_and(|a| a.ptr_eq(animation))
            || self
                .playback_controller
                .as_ref()
                .is_some_and(|c| c.target().ptr_eq(animation))
    }

    /// Drop handles that refer to `animation`, which has just ended.
    pub(crate) fn on_animation_end(&mut self, animation: &Animator) {
        if self
            .playback_controller
            .as_ref()
            .is_some_and(|c| c.target().ptr_eq(animation))
        {
            self.playback_controller = None;
        }
        if self
            .current_animation
            .as_ref()
            .is_some_and(|a| a.ptr_eq(animation))
        {
            self.current_animation = None;
            self.target_state = None;
        }
    }

    /// Detach everything and start a new change.
    ///
    /// The returned handles must be cancelled by the caller once the lock
    /// guarding this state has been released.
    pub(crate) fn reset(&mut self) -> DetachedAnimation {
        let detached = DetachedAnimation {
            animation: self.current_animation.take(),
            controller: self.playback_controller.take(),
        };
        self.config = StateAnimationConfig::default();
        self.target_state = None;
        self.change_id = self.change_id.wrapping_add(1);
        detached
    }
}

impl<S: State> Default for AnimationState<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handles taken out of an [`AnimationState`] by `reset`.
#[must_use = "detached handles must be cancelled"]
pub(crate) struct DetachedAnimation {
    animation: Option<Animator>,
    controller: Option<PlaybackController>,
}

impl DetachedAnimation {
    pub(crate) fn is_empty(&self) -> bool {
        self.animation.is_none() && self.controller.is_none()
    }

    /// Cancel the detached run so its listeners see cancel + end exactly once.
    pub(crate) fn cancel(self) {
        match (self.controller, self.animation) {
            (Some(controller), _) => {
                controller.cancel_player();
                controller.dispatch_on_cancel_and_end();
            }
            (None, Some(animation)) => {
                if animation.is_started() {
                    animation.cancel();
                } else {
                    // A never-started animator is silent on cancel
                    animation.dispatch_cancel_and_end();
                    animation.cancel();
                }
            }
            (None, None) => {}
        }
    }
}
