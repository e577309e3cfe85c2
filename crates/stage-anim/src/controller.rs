//! Scrubbable playback.
//!
//! A [`PlaybackController`] wraps a built [`Animator`] whose progress is set
//! directly (for instance by a drag gesture) instead of by the looper clock.
//! When the gesture is released, [`PlaybackController::animate_to_progress`]
//! settles the timeline with a short "player" animator:
//!
//! - settling at 1.0 dispatches `on_end(Finished)` on the target,
//! - settling at 0.0 dispatches `on_cancel` + `on_end(Cancelled)`.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::animator::Animator;
use crate::interpolator::Interpolator;
use crate::looper::Looper;
use crate::pending::PendingAnimation;

/// Handle exposing a 0..1 progress setter over a composite animation.
#[derive(Clone)]
pub struct PlaybackController {
    target: Animator,
    looper: Looper,
    player: Arc<Mutex<Option<Animator>>>,
}

impl PlaybackController {
    /// Wrap `target`. The target must not be started with [`Animator::start`].
    pub fn wrap(target: Animator, looper: &Looper) -> Self {
        Self {
            target,
            looper: looper.clone(),
            player: Arc::new(Mutex::new(None)),
        }
    }

    /// The wrapped animation.
    pub fn target(&self) -> &Animator {
        &self.target
    }

    pub fn duration(&self) -> Duration {
        self.target.duration()
    }

    /// Current progress in 0.0..=1.0.
    pub fn progress(&self) -> f32 {
        self.target.animated_fraction()
    }

    /// Move the timeline to `fraction` without notifying listeners.
    pub fn set_play_fraction(&self, fraction: f32) {
        self.target.set_current_fraction(fraction);
    }

    /// Notify the target's `on_start`.
    pub fn dispatch_on_start(&self) -> &Self {
        self.target.dispatch_start();
        self
    }

    /// Notify the target's `on_cancel` and `on_end(Cancelled)`.
    pub fn dispatch_on_cancel_and_end(&self) -> &Self {
        self.target.dispatch_cancel_and_end();
        self
    }

    /// Notify the target's `on_end(Finished)`.
    pub fn dispatch_on_end(&self) -> &Self {
        self.target.dispatch_end();
        self
    }

    /// The settle animator, if one is running.
    pub fn player(&self) -> Option<Animator> {
        self.player.lock().clone()
    }

    /// Stop the settle animator, leaving progress where it is.
    pub fn cancel_player(&self) {
        let player = self.player.lock().take();
        if let Some(player) = player {
            player.cancel();
        }
    }

    /// Animate from the current progress to `progress` over `duration`.
    ///
    /// Dispatches the target's start first if the run has not started. When
    /// the player reaches 1.0 or 0.0 the target's end (or cancel + end) is
    /// dispatched; any value in between leaves the run open.
    pub fn animate_to_progress(&self, progress: f32, duration: Duration) -> Animator {
        self.cancel_player();
        if !self.target.is_started() {
            self.dispatch_on_start();
        }

        let from = self.progress();
        let to = progress.clamp(0.0, 1.0);
        let mut builder = PendingAnimation::new(duration);

        let target = self.target.clone();
        builder.add_float(from, to, Interpolator::Linear, move |v| {
            target.set_current_fraction(v)
        });

        let target = self.target.clone();
        let slot = Arc::downgrade(&self.player);
        builder.add_end_listener(move |outcome| {
            if !outcome.is_success() {
                return;
            }
            if let Some(slot) = slot.upgrade() {
                slot.lock().take();
            }
            if to >= 1.0 {
                target.dispatch_end();
            } else if to <= 0.0 {
                target.dispatch_cancel_and_end();
            }
        });

        let player = builder.build_anim(&self.looper);
        *self.player.lock() = Some(player.clone());
        tracing::debug!(
            "Settling animator {} from {:.2} to {:.2}",
            self.target.id(),
            from,
            to
        );
        player.start();
        player
    }

    /// Whether both controllers wrap the same animation.
    pub fn ptr_eq(&self, other: &PlaybackController) -> bool {
        self.target.ptr_eq(&other.target)
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("target", &self.target)
            .field("settling", &self.player.lock().is_some())
            .finish()
    }
}
