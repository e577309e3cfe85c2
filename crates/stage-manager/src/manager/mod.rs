//! State manager.
//!
//! The `StateManager` drives a [`StatefulContainer`] between states. Every
//! transition is one composite [`Animator`] built from the segments of all
//! state handlers. At most one transition is tracked at a time: requesting a
//! new one cancels the previous one first.
//!
//! ## Locking
//!
//! Bookkeeping lives behind a single mutex that is never held while calling
//! handlers, listeners, the container or animator methods. Any of those may
//! call back into the manager.

mod listeners;

use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use stage_anim::{AnimationOutcome, Animator, Looper, PendingAnimation, PlaybackController};
use stage_core::{ManagerSettings, StateError};

use crate::animation_state::AnimationState;
use crate::atomic::AtomicAnimationFactory;
use crate::config::{AnimationFlags, StateAnimationConfig};
use crate::container::StatefulContainer;
use crate::handler::StateHandler;
use crate::state::{State, StateListener};

use listeners::{AnimationEndListener, StateTransitionListener};

/// Called once with the outcome of a requested transition.
pub type TransitionCallback = Box<dyn FnOnce(AnimationOutcome) + Send>;

struct Bookkeeping<S: State> {
    /// The state whose enter has been signalled.
    state: S,
    last_stable_state: S,
    current_stable_state: S,
    rest_state: Option<S>,
    animation: AnimationState<S>,
}

/// How a request for the current state is resolved.
enum Repeat {
    Abort,
    Merge(Animator),
    Proceed,
}

/// Coordinates state transitions of one container.
pub struct StateManager<S: State> {
    container: Arc<dyn StatefulContainer<S>>,
    looper: Looper,
    base_state: S,
    settings: ManagerSettings,
    inner: Arc<Mutex<Bookkeeping<S>>>,
    listeners: RwLock<Vec<Arc<dyn StateListener<S>>>>,
    state_handlers: OnceLock<Vec<Arc<dyn StateHandler<S>>>>,
    atomic_animation_factory: AtomicAnimationFactory<S>,
    this: Weak<StateManager<S>>,
}

impl<S: State> StateManager<S> {
    /// Create a manager resting in `base_state`.
    pub fn new(container: Arc<dyn StatefulContainer<S>>, looper: Looper, base_state: S) -> Arc<Self> {
        Self::with_settings(container, looper, base_state, ManagerSettings::default())
    }

    pub fn with_settings(
        container: Arc<dyn StatefulContainer<S>>,
        looper: Looper,
        base_state: S,
        settings: ManagerSettings,
    ) -> Arc<Self> {
        let atomic_animation_factory = container.create_atomic_animation_factory();
        Arc::new_cyclic(|this| Self {
            container,
            looper,
            base_state,
            settings,
            inner: Arc::new(Mutex::new(Bookkeeping {
                state: base_state,
                last_stable_state: base_state,
                current_stable_state: base_state,
                rest_state: None,
                animation: AnimationState::new(),
            })),
            listeners: RwLock::new(Vec::new()),
            state_handlers: OnceLock::new(),
            atomic_animation_factory,
            this: this.clone(),
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn base_state(&self) -> S {
        self.base_state
    }

    /// The state whose transition most recently started.
    pub fn state(&self) -> S {
        self.inner.lock().state
    }

    /// Where the tracked transition is heading, if it targets a state.
    pub fn target_state(&self) -> Option<S> {
        self.inner.lock().animation.target_state()
    }

    pub fn current_stable_state(&self) -> S {
        self.inner.lock().current_stable_state
    }

    /// The stable state before the current one (after history mapping).
    pub fn last_state(&self) -> S {
        self.inner.lock().last_stable_state
    }

    /// The state to return to when restoring; the base state unless overridden.
    pub fn rest_state(&self) -> S {
        self.inner.lock().rest_state.unwrap_or(self.base_state)
    }

    pub fn set_rest_state(&self, rest_state: Option<S>) {
        self.inner.lock().rest_state = rest_state;
    }

    /// Settled in `state`, with no transition towards anything else.
    pub fn is_in_stable_state(&self, state: S) -> bool {
        let inner = self.inner.lock();
        inner.state == state
            && inner.current_stable_state == state
            && inner.animation.target_state().map_or(true, |t| t == state)
    }

    /// An animation is tracked.
    pub fn is_in_transition(&self) -> bool {
        self.inner.lock().animation.current_animation().is_some()
    }

    pub fn change_id(&self) -> u64 {
        self.inner.lock().animation.change_id()
    }

    pub fn current_animation(&self) -> Option<Animator> {
        self.inner.lock().animation.current_animation().cloned()
    }

    pub fn playback_controller(&self) -> Option<PlaybackController> {
        self.inner.lock().animation.playback_controller().cloned()
    }

    /// The config of the tracked transition.
    pub fn animation_config(&self) -> StateAnimationConfig {
        self.inner.lock().animation.config().clone()
    }

    pub fn looper(&self) -> &Looper {
        &self.looper
    }

    /// The container's handlers, collected on first use.
    pub fn state_handlers(&self) -> &[Arc<dyn StateHandler<S>>] {
        self.state_handlers
            .get_or_init(|| self.container.collect_state_handlers())
    }

    pub fn atomic_animation_factory(&self) -> &AtomicAnimationFactory<S> {
        &self.atomic_animation_factory
    }

    fn has_live_handles(&self) -> bool {
        self.inner.lock().animation.has_live_handles()
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    pub fn add_state_listener(&self, listener: Arc<dyn StateListener<S>>) {
        self.listeners.write().push(listener);
    }

    /// Remove a listener. Returns `true` if it was registered.
    pub fn remove_state_listener(&self, listener: &Arc<dyn StateListener<S>>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    fn listeners_snapshot(&self) -> Vec<Arc<dyn StateListener<S>>> {
        self.listeners.read().clone()
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Go to `state`, animating if the container wants it.
    pub fn go_to_state(&self, state: S) {
        self.go_to_state_with(state, true, Duration::ZERO, None);
    }

    pub fn go_to_state_animated(&self, state: S, animated: bool) {
        self.go_to_state_with(state, animated, Duration::ZERO, None);
    }

    /// Go to `state` with an animation that starts after `delay`.
    pub fn go_to_state_delayed(&self, state: S, delay: Duration) {
        self.go_to_state_with(state, true, delay, None);
    }

    /// Go to `state` and call `on_complete` with the outcome.
    pub fn go_to_state_then<F>(&self, state: S, animated: bool, on_complete: F)
    where
        F: FnOnce(AnimationOutcome) + Send + 'static,
    {
        self.go_to_state_with(state, animated, Duration::ZERO, Some(Box::new(on_complete)));
    }

    /// Request a transition to `state`.
    ///
    /// `animated` is combined with the container's preference. A request for
    /// the current state completes immediately when nothing is running, and
    /// joins the running animation when it already heads there. A delayed
    /// request is dropped if anything else changes the state before it fires.
    pub fn go_to_state_with(
        &self,
        state: S,
        animated: bool,
        delay: Duration,
        on_complete: Option<TransitionCallback>,
    ) {
        let animated = animated && self.container.should_animate_state_change();

        match self.resolve_repeat(state, animated) {
            Repeat::Abort => {
                tracing::debug!("Already in {:?}, nothing to do", state);
                if let Some(on_complete) = on_complete {
                    on_complete(AnimationOutcome::Finished);
                }
                self.container.on_repeat_state_set_aborted(state);
                return;
            }
            Repeat::Merge(current) => {
                tracing::debug!("Joining running transition to {:?}", state);
                if let Some(on_complete) = on_complete {
                    current.on_end(on_complete);
                }
                return;
            }
            Repeat::Proceed => {}
        }

        let from = self.state();
        self.cancel_animation();

        if !animated {
            tracing::debug!("Applying {:?} -> {:?} without animation", from, state);
            self.atomic_animation_factory
                .cancel_all_state_element_animation();
            self.on_state_transition_start(state);
            for handler in self.state_handlers() {
                handler.set_state(state);
            }
            self.on_state_transition_end(state);
            if let Some(on_complete) = on_complete {
                on_complete(AnimationOutcome::Finished);
            }
            return;
        }

        if delay.is_zero() {
            self.go_to_state_animated_internal(from, state, on_complete);
            return;
        }

        let change_id = self.change_id();
        let this = self.this.clone();
        tracing::debug!("Scheduling {:?} -> {:?} in {:?}", from, state, delay);
        self.looper.post_delayed(delay, move || {
            let Some(manager) = this.upgrade() else {
                return;
            };
            if manager.change_id() != change_id {
                tracing::trace!("Dropping stale delayed transition to {:?}", state);
                return;
            }
            manager.go_to_state_animated_internal(from, state, on_complete);
        });
    }

    fn resolve_repeat(&self, state: S, animated: bool) -> Repeat {
        let (current, same_target) = {
            let inner = self.inner.lock();
            if inner.state != state {
                return Repeat::Proceed;
            }
            let Some(current) = inner.animation.current_animation().cloned() else {
                return Repeat::Abort;
            };
            let same_target = !inner.animation.config().is_user_controlled()
                && animated
                && inner.animation.target_state() == Some(state);
            (current, same_target)
        };
        if same_target || state.should_preserve_data_state_on_reapply() {
            Repeat::Merge(current)
        } else {
            Repeat::Proceed
        }
    }

    fn go_to_state_animated_internal(&self, from: S, to: S, on_complete: Option<TransitionCallback>) {
        let duration = if to == self.base_state {
            from.transition_duration(&*self.container, false)
        } else {
            to.transition_duration(&*self.container, true)
        };
        let animation = self.create_animation_internal(from, to, StateAnimationConfig::new(duration));
        if let Some(on_complete) = on_complete {
            animation.on_end(on_complete);
        }
        tracing::debug!(
            "Animating {:?} -> {:?} over {:?} (animator {})",
            from,
            to,
            duration,
            animation.id()
        );
        animation.start();
    }

    /// Build the composite animation to `to` and make it the tracked one.
    fn create_animation_internal(&self, from: S, to: S, mut config: StateAnimationConfig) -> Animator {
        self.atomic_animation_factory
            .prepare_for_atomic_animation(from, to, &mut config);

        let mut builder = PendingAnimation::new(config.duration);
        if !config.has_flag(AnimationFlags::SKIP_ALL_ANIMATIONS) {
            for handler in self.state_handlers() {
                handler.set_state_with_animation(to, &config, &mut builder);
            }
        }
        builder.add_listener(Arc::new(StateTransitionListener::new(self.this.clone(), to)));
        let animation = builder.build_anim(&self.looper);

        self.inner.lock().animation.set_config(config);
        self.install_animation(&animation, Some(to));
        animation
    }

    fn install_animation(&self, animation: &Animator, target: Option<S>) {
        self.inner
            .lock()
            .animation
            .set_animation(animation.clone(), target);
        animation.add_listener(Arc::new(AnimationEndListener::new(Arc::downgrade(
            &self.inner,
        ))));
    }

    /// Re-apply the current state to every handler.
    ///
    /// With `cancel_current`, the tracked transition is cancelled first (or
    /// jumped to its end when the state keeps data on reapply), unless it
    /// allows state application while transitioning.
    pub fn reapply_state(&self, cancel_current: bool) {
        let mut was_in_animation = self.is_in_transition();
        if cancel_current {
            let (allow_apply, state, target, current) = {
                let inner = self.inner.lock();
                (
                    inner
                        .animation
                        .config()
                        .has_flag(AnimationFlags::ALLOW_STATE_APPLY_WHILE_TRANSITIONING),
                    inner.state,
                    inner.animation.target_state(),
                    inner.animation.current_animation().cloned(),
                )
            };
            if !allow_apply {
                let preserve = state.should_preserve_data_state_on_reapply();
                if let Some(current) = current.filter(|_| preserve) {
                    current.end();
                    // Ending a state transition already signalled its completion
                    if target.is_some() {
                        was_in_animation = false;
                    }
                }
                self.atomic_animation_factory
                    .cancel_all_state_element_animation();
                self.cancel_animation();
            }
        }

        if !self.is_in_transition() {
            let state = self.state();
            for handler in self.state_handlers() {
                handler.set_state(state);
            }
            if was_in_animation {
                self.on_state_transition_end(state);
            }
        }
    }

    /// Cancel the tracked transition, logging if it would not settle.
    pub fn cancel_animation(&self) {
        if let Err(e) = self.try_cancel_animation() {
            tracing::error!("Failed to cancel transition: {}", e);
        }
    }

    /// Cancel the tracked transition until no handle remains.
    ///
    /// A cancel callback may install a new animation, so this repeats until
    /// nothing is tracked, up to the configured number of passes.
    pub fn try_cancel_animation(&self) -> Result<(), StateError> {
        let max = self.settings.max_cancel_iterations.max(1);
        for _ in 0..max {
            let detached = self.inner.lock().animation.reset();
            if !detached.is_empty() {
                tracing::debug!("Cancelling tracked transition");
            }
            detached.cancel();
            if !self.has_live_handles() {
                return Ok(());
            }
        }
        Err(StateError::CancellationDidNotSettle { iterations: max })
    }

    /// Build a caller-driven transition to `state` and make it the tracked one.
    ///
    /// The returned controller's progress must be driven by the caller; the
    /// transition starts when its start is dispatched.
    pub fn create_animation_to_new_workspace(
        &self,
        state: S,
        mut config: StateAnimationConfig,
    ) -> PlaybackController {
        config.flags.insert(AnimationFlags::USER_CONTROLLED);
        let from = self.state();
        self.cancel_animation();

        let animation = self.create_animation_internal(from, state, config);
        let controller = PlaybackController::wrap(animation, &self.looper);
        self.inner
            .lock()
            .animation
            .set_playback_controller(controller.clone());
        tracing::debug!("Created controlled transition {:?} -> {:?}", from, state);
        controller
    }

    pub fn create_animation_to_new_workspace_with(
        &self,
        state: S,
        duration: Duration,
        flags: AnimationFlags,
    ) -> PlaybackController {
        self.create_animation_to_new_workspace(
            state,
            StateAnimationConfig::new(duration).with_flags(flags),
        )
    }

    /// Track an externally built controller as a caller-driven transition.
    pub fn set_current_user_controlled_animation(&self, controller: PlaybackController) {
        self.inner.lock().animation.clear_current_animation();
        self.set_current_animation(controller.target().clone(), &[]);

        let mut inner = self.inner.lock();
        inner
            .animation
            .config_mut()
            .flags
            .insert(AnimationFlags::USER_CONTROLLED);
        inner.animation.set_playback_controller(controller);
    }

    /// Track `animation`, which does not target any state.
    ///
    /// If the tracked animation is one of `superseded`, it is forgotten
    /// rather than cancelled. Otherwise a running transition is cancelled and
    /// the current state re-applied.
    pub fn set_current_animation(&self, animation: Animator, superseded: &[Animator]) {
        {
            let mut inner = self.inner.lock();
            let is_superseded = superseded.iter().any(|child| {
                inner
                    .animation
                    .playback_controller()
                    .is_some_and(|c| c.target().ptr_eq(child))
                    || inner
                        .animation
                        .current_animation()
                        .is_some_and(|a| a.ptr_eq(child))
            });
            if is_superseded {
                inner.animation.clear_current_animation();
            }
        }

        let reapply_needed = self.is_in_transition();
        self.cancel_animation();
        if reapply_needed {
            self.reapply_state(false);
            self.on_state_transition_end(self.state());
        }
        self.install_animation(&animation, None);
    }

    /// Build an untracked animation from `from` to `to` out of every handler's segments.
    pub fn create_atomic_animation(&self, from: S, to: S, mut config: StateAnimationConfig) -> Animator {
        self.atomic_animation_factory
            .prepare_for_atomic_animation(from, to, &mut config);
        let mut builder = PendingAnimation::new(config.duration);
        for handler in self.state_handlers() {
            handler.set_state_with_animation(to, &config, &mut builder);
        }
        builder.build_anim(&self.looper)
    }

    /// Build the element animation for slot `index`, replacing the occupant.
    pub fn create_state_element_animation(&self, index: usize, values: &[f32]) -> Result<Animator, StateError> {
        self.atomic_animation_factory
            .create_state_element_animation(index, values, &self.looper)
            .inspect_err(|e| tracing::warn!("No element animation: {}", e))
    }

    pub fn cancel_state_element_animation(&self, index: usize) {
        self.atomic_animation_factory
            .cancel_state_element_animation(index);
    }

    /// Leave a state that should not be restored, going back to the rest state.
    ///
    /// Does nothing while a caller-driven transition is tracked.
    pub fn move_to_rest_state(&self, animated: bool) {
        let (user_controlled, state) = {
            let inner = self.inner.lock();
            (inner.animation.is_user_controlled(), inner.state)
        };
        if user_controlled {
            tracing::debug!("Caller-driven transition running, not moving to rest state");
            return;
        }
        if state.should_disable_restore() {
            self.go_to_state_animated(self.rest_state(), animated);
            self.inner.lock().last_stable_state = self.base_state;
        }
    }

    // =========================================================================
    // Back gesture
    // =========================================================================

    pub fn on_back_started(&self, to_state: S) {
        for handler in self.state_handlers() {
            handler.on_back_started(to_state);
        }
    }

    pub fn on_back_progressed(&self, to_state: S, progress: f32) {
        let progress = progress.clamp(0.0, 1.0);
        for handler in self.state_handlers() {
            handler.on_back_progressed(to_state, progress);
        }
    }

    pub fn on_back_cancelled(&self, to_state: S) {
        for handler in self.state_handlers() {
            handler.on_back_cancelled(to_state);
        }
    }

    // =========================================================================
    // Bookkeeping
    // =========================================================================

    fn on_state_transition_start(&self, state: S) {
        self.inner.lock().state = state;
        self.container.on_state_set_start(state);
        for listener in self.listeners_snapshot() {
            listener.on_state_transition_start(state);
        }
    }

    fn on_state_transition_end(&self, state: S) {
        let previous = self.current_stable_state();
        let last = (state != previous).then(|| state.history_for_state(previous));
        {
            let mut inner = self.inner.lock();
            if let Some(last) = last {
                inner.last_stable_state = last;
                inner.current_stable_state = state;
            }
            if state == self.base_state {
                inner.rest_state = None;
            }
        }
        self.container.on_state_set_end(state);
        for listener in self.listeners_snapshot() {
            listener.on_state_transition_complete(state);
        }
    }

    /// The run towards `state` ended without finishing.
    ///
    /// Only the tracked run rolls `state` back; a run already detached by a
    /// cancel has been replaced by whatever cancelled it.
    fn on_state_transition_abandoned(&self, animation: &Animator, state: S) {
        let mut inner = self.inner.lock();
        if !inner.animation.is_tracking(animation) {
            return;
        }
        tracing::debug!(
            "Transition to {:?} abandoned, back to {:?}",
            state,
            inner.current_stable_state
        );
        inner.state = inner.current_stable_state;
    }
}

impl<S: State> std::fmt::Debug for StateManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("StateManager")
            .field("state", &inner.state)
            .field("current_stable_state", &inner.current_stable_state)
            .field("last_stable_state", &inner.last_stable_state)
            .field("base_state", &self.base_state)
            .field("rest_state", &inner.rest_state)
            .field("animation", &inner.animation)
            .field("listeners", &self.listeners.read().len())
            .field("atomic_animation_factory", &self.atomic_animation_factory)
            .finish()
    }
}
