//! Controllable timeline.
//!
//! An [`Animator`] drives a set of property segments from progress 0.0 to 1.0
//! over its duration, ticking from a [`Looper`]. Observers register an
//! [`AnimatorListener`] (or the closure shorthands [`Animator::on_start`] /
//! [`Animator::on_end`]).
//!
//! # Listener contract
//!
//! A *run* begins with [`Animator::start`] (or [`Animator::end`] /
//! [`Animator::dispatch_start`] on a fresh animator) and finishes exactly once:
//!
//! 1. `on_start` fires at most once per run.
//! 2. A run finishes with either `on_end(Finished)`, or `on_cancel` followed
//!    by `on_end(Cancelled)`. Never both, never twice.
//! 3. [`Animator::cancel`] on an animator that was never started notifies
//!    **nobody**. Owners that need cancel/end callbacks for such an animator
//!    must call [`Animator::dispatch_cancel_and_end`] explicitly.
//!
//! Listeners are invoked without any internal lock held, so they may freely
//! start, cancel or end this or any other animator.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::interpolator::Interpolator;
use crate::looper::{FrameCallback, Looper};

/// Global counter for animator IDs (debugging and logs only).
static ANIMATOR_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// How a run finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationOutcome {
    /// Reached the end of the timeline.
    Finished,
    /// Interrupted before the end.
    Cancelled,
}

impl AnimationOutcome {
    /// Whether the run reached its end uninterrupted.
    pub fn is_success(self) -> bool {
        self == Self::Finished
    }
}

/// Observer of an animator's lifecycle.
pub trait AnimatorListener: Send + Sync {
    fn on_start(&self, _animator: &Animator) {}

    fn on_cancel(&self, _animator: &Animator) {}

    fn on_end(&self, _animator: &Animator, _outcome: AnimationOutcome) {}
}

/// Setter invoked with the interpolated value of a segment.
pub type ValueSetter = Box<dyn FnMut(f32) + Send>;

/// One property animated over a sub-range of the timeline.
pub(crate) struct Segment {
    pub(crate) from: f32,
    pub(crate) to: f32,
    pub(crate) start: f32,
    pub(crate) end: f32,
    pub(crate) interpolator: Interpolator,
    pub(crate) setter: ValueSetter,
}

impl Segment {
    fn apply(&mut self, fraction: f32) {
        let local = if self.end <= self.start {
            if fraction >= self.start {
                1.0
            } else {
                0.0
            }
        } else {
            ((fraction - self.start) / (self.end - self.start)).clamp(0.0, 1.0)
        };
        let eased = self.interpolator.apply(local);
        (self.setter)(self.from + (self.to - self.from) * eased);
    }
}

struct AnimatorState {
    duration: Duration,
    play_time: Duration,
    fraction: f32,
    /// A run is in progress (start dispatched, end not yet dispatched).
    started: bool,
    /// The current run has finished.
    ended: bool,
    /// Receiving frames from the looper.
    ticking: bool,
    /// A frame ticker for this animator is registered with the looper.
    ticker_registered: bool,
    listeners: Vec<Arc<dyn AnimatorListener>>,
}

struct AnimatorInner {
    id: u64,
    looper: Looper,
    state: Mutex<AnimatorState>,
    /// Kept apart from `state` so setters run without the state lock.
    /// Setters must not drive their own animator.
    segments: Mutex<Vec<Segment>>,
}

/// Handle to a controllable timeline. Clones share the same timeline.
#[derive(Clone)]
pub struct Animator {
    inner: Arc<AnimatorInner>,
}

impl Animator {
    pub(crate) fn from_parts(
        looper: &Looper,
        duration: Duration,
        segments: Vec<Segment>,
        listeners: Vec<Arc<dyn AnimatorListener>>,
    ) -> Self {
        Self {
            inner: Arc::new(AnimatorInner {
                id: ANIMATOR_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
                looper: looper.clone(),
                state: Mutex::new(AnimatorState {
                    duration,
                    play_time: Duration::ZERO,
                    fraction: 0.0,
                    started: false,
                    ended: false,
                    ticking: false,
                    ticker_registered: false,
                    listeners,
                }),
                segments: Mutex::new(segments),
            }),
        }
    }

    /// An animator with no segments; useful as a pure timer.
    pub fn empty(looper: &Looper, duration: Duration) -> Self {
        Self::from_parts(looper, duration, Vec::new(), Vec::new())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Unique ID, for logs.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn duration(&self) -> Duration {
        self.inner.state.lock().duration
    }

    /// Change the duration. Takes effect from the next frame.
    pub fn set_duration(&self, duration: Duration) {
        self.inner.state.lock().duration = duration;
    }

    /// Current progress in 0.0..=1.0.
    pub fn animated_fraction(&self) -> f32 {
        self.inner.state.lock().fraction
    }

    /// A run has started and not yet finished.
    pub fn is_started(&self) -> bool {
        let state = self.inner.state.lock();
        state.started && !state.ended
    }

    /// The animator is advancing with the looper clock.
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().ticking
    }

    /// The last run has finished (successfully or not).
    pub fn is_ended(&self) -> bool {
        self.inner.state.lock().ended
    }

    /// Whether both handles refer to the same timeline.
    pub fn ptr_eq(&self, other: &Animator) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    pub fn add_listener(&self, listener: Arc<dyn AnimatorListener>) {
        self.inner.state.lock().listeners.push(listener);
    }

    /// Remove a listener. Returns `true` if it was registered.
    pub fn remove_listener(&self, listener: &Arc<dyn AnimatorListener>) -> bool {
        let mut state = self.inner.state.lock();
        let before = state.listeners.len();
        state.listeners.retain(|l| !Arc::ptr_eq(l, listener));
        state.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.inner.state.lock().listeners.len()
    }

    /// Call `f` when the next run starts.
    pub fn on_start<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.add_listener(Arc::new(StartCallback(Mutex::new(Some(Box::new(f))))));
    }

    /// Call `f` when the next run finishes, with its outcome.
    pub fn on_end<F>(&self, f: F)
    where
        F: FnOnce(AnimationOutcome) + Send + 'static,
    {
        self.add_listener(Arc::new(EndCallback(Mutex::new(Some(Box::new(f))))));
    }

    fn listeners(&self) -> Vec<Arc<dyn AnimatorListener>> {
        self.inner.state.lock().listeners.clone()
    }

    // =========================================================================
    // Playback
    // =========================================================================

    /// Start a new run from progress 0.0. No-op if already running.
    pub fn start(&self) {
        let register = {
            let mut state = self.inner.state.lock();
            if state.ticking {
                return;
            }
            state.started = true;
            state.ended = false;
            state.ticking = true;
            state.play_time = Duration::ZERO;
            state.fraction = 0.0;
            let register = !state.ticker_registered;
            state.ticker_registered = true;
            register
        };
        if register {
            self.inner
                .looper
                .add_frame_callback(Arc::new(FrameTicker(Arc::downgrade(&self.inner))));
        }
        tracing::trace!("Animator {} started ({:?})", self.id(), self.duration());

        self.apply_fraction(0.0);
        for listener in self.listeners() {
            listener.on_start(self);
        }
    }

    /// Stop the current run and notify `on_cancel` then `on_end(Cancelled)`.
    ///
    /// If no run was started, nothing is notified (see the module docs).
    pub fn cancel(&self) {
        let live = {
            let mut state = self.inner.state.lock();
            state.ticking = false;
            state.started && !state.ended
        };
        if live {
            tracing::trace!("Animator {} cancelled", self.id());
            self.finish(AnimationOutcome::Cancelled);
        }
    }

    /// Jump to the end and finish successfully.
    ///
    /// An animator that was never started gets its `on_start` first.
    /// No-op if the current run already finished.
    pub fn end(&self) {
        let first_start = {
            let mut state = self.inner.state.lock();
            if state.ended {
                return;
            }
            let first = !state.started;
            state.started = true;
            state.ticking = false;
            state.play_time = state.duration;
            state.fraction = 1.0;
            first
        };
        if first_start {
            for listener in self.listeners() {
                listener.on_start(self);
            }
        }
        self.apply_fraction(1.0);
        self.finish(AnimationOutcome::Finished);
    }

    /// Notify `on_start` without ticking. Used when progress is driven externally.
    pub fn dispatch_start(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.started && !state.ended {
                return;
            }
            state.started = true;
            state.ended = false;
        }
        for listener in self.listeners() {
            listener.on_start(self);
        }
    }

    /// Notify `on_cancel` then `on_end(Cancelled)`, whether or not a run started.
    pub fn dispatch_cancel_and_end(&self) {
        self.inner.state.lock().ticking = false;
        self.finish(AnimationOutcome::Cancelled);
    }

    /// Notify `on_end(Finished)` without moving progress.
    pub fn dispatch_end(&self) {
        self.inner.state.lock().ticking = false;
        self.finish(AnimationOutcome::Finished);
    }

    /// Set progress directly, applying every segment.
    pub fn set_current_fraction(&self, fraction: f32) {
        let fraction = fraction.clamp(0.0, 1.0);
        {
            let mut state = self.inner.state.lock();
            state.fraction = fraction;
            state.play_time = state.duration.mul_f32(fraction);
        }
        self.apply_fraction(fraction);
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn apply_fraction(&self, fraction: f32) {
        let mut segments = self.inner.segments.lock();
        for segment in segments.iter_mut() {
            segment.apply(fraction);
        }
    }

    fn finish(&self, outcome: AnimationOutcome) {
        let listeners = {
            let mut state = self.inner.state.lock();
            if state.ended {
                return;
            }
            state.ended = true;
            state.ticking = false;
            state.listeners.clone()
        };
        if outcome == AnimationOutcome::Cancelled {
            for listener in &listeners {
                listener.on_cancel(self);
            }
        }
        for listener in &listeners {
            listener.on_end(self, outcome);
        }
    }

    /// Advance by one frame. Returns whether the animator wants more frames.
    fn do_frame(&self, dt: Duration) -> bool {
        let (fraction, done) = {
            let mut state = self.inner.state.lock();
            if !state.ticking {
                state.ticker_registered = false;
                return false;
            }
            state.play_time = state.play_time.saturating_add(dt);
            let fraction = if state.duration.is_zero() {
                1.0
            } else {
                (state.play_time.as_secs_f64() / state.duration.as_secs_f64()).min(1.0) as f32
            };
            state.fraction = fraction;
            (fraction, state.play_time >= state.duration)
        };

        self.apply_fraction(fraction);
        if done {
            self.finish(AnimationOutcome::Finished);
        }

        // A listener may have restarted us from `finish`.
        let mut state = self.inner.state.lock();
        if state.ticking {
            true
        } else {
            state.ticker_registered = false;
            false
        }
    }
}

impl std::fmt::Debug for Animator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Animator")
            .field("id", &self.inner.id)
            .field("duration", &state.duration)
            .field("fraction", &state.fraction)
            .field("started", &state.started)
            .field("ended", &state.ended)
            .field("ticking", &state.ticking)
            .finish()
    }
}

/// Registered with the looper while an animator runs.
struct FrameTicker(Weak<AnimatorInner>);

impl FrameCallback for FrameTicker {
    fn do_frame(&self, dt: Duration) -> bool {
        match self.0.upgrade() {
            Some(inner) => Animator { inner }.do_frame(dt),
            None => false,
        }
    }
}

struct StartCallback(Mutex<Option<Box<dyn FnOnce() + Send>>>);

impl AnimatorListener for StartCallback {
    fn on_start(&self, _animator: &Animator) {
        let callback = self.0.lock().take();
        if let Some(callback) = callback {
            callback();
        }
    }
}

struct EndCallback(Mutex<Option<Box<dyn FnOnce(AnimationOutcome) + Send>>>);

impl AnimatorListener for EndCallback {
    fn on_end(&self, _animator: &Animator, outcome: AnimationOutcome) {
        let callback = self.0.lock().take();
        if let Some(callback) = callback {
            callback(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::PendingAnimation;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    impl AnimatorListener for Recorder {
        fn on_start(&self, _animator: &Animator) {
            self.events.lock().push("start".to_string());
        }

        fn on_cancel(&self, _animator: &Animator) {
            self.events.lock().push("cancel".to_string());
        }

        fn on_end(&self, _animator: &Animator, outcome: AnimationOutcome) {
            self.events.lock().push(format!("end:{outcome:?}"));
        }
    }

    fn looper() -> Looper {
        Looper::new(Duration::from_millis(10))
    }

    fn recorded(looper: &Looper, duration: Duration) -> (Animator, Arc<Recorder>) {
        let anim = Animator::empty(looper, duration);
        let recorder = Arc::new(Recorder::default());
        anim.add_listener(recorder.clone());
        (anim, recorder)
    }

    #[test]
    fn test_runs_to_completion() {
        let looper = looper();
        let (anim, recorder) = recorded(&looper, Duration::from_millis(100));

        anim.start();
        assert!(anim.is_started());
        assert!(anim.is_running());

        looper.advance(Duration::from_millis(50));
        assert!((anim.animated_fraction() - 0.5).abs() < 0.01);

        looper.advance(Duration::from_millis(50));
        assert!(anim.is_ended());
        assert!(!anim.is_running());
        assert_eq!(recorder.events(), vec!["start", "end:Finished"]);
        assert!(looper.is_idle());
    }

    #[test]
    fn test_cancel_running() {
        let looper = looper();
        let (anim, recorder) = recorded(&looper, Duration::from_millis(100));

        anim.start();
        looper.advance(Duration::from_millis(30));
        anim.cancel();
        anim.cancel();

        assert_eq!(recorder.events(), vec!["start", "cancel", "end:Cancelled"]);
        looper.advance(Duration::from_millis(100));
        assert!(looper.is_idle());
        assert!(anim.animated_fraction() < 0.5);
    }

    #[test]
    fn test_cancel_never_started_is_silent() {
        let looper = looper();
        let (anim, recorder) = recorded(&looper, Duration::from_millis(100));

        anim.cancel();
        assert!(recorder.events().is_empty());

        anim.dispatch_cancel_and_end();
        anim.dispatch_cancel_and_end();
        assert_eq!(recorder.events(), vec!["cancel", "end:Cancelled"]);
    }

    #[test]
    fn test_end_unstarted_dispatches_start_then_end() {
        let looper = looper();
        let (anim, recorder) = recorded(&looper, Duration::from_millis(100));

        anim.end();
        anim.end();
        assert_eq!(recorder.events(), vec!["start", "end:Finished"]);
        assert_eq!(anim.animated_fraction(), 1.0);
    }

    #[test]
    fn test_restart_after_end() {
        let looper = looper();
        let (anim, recorder) = recorded(&looper, Duration::from_millis(20));

        anim.start();
        looper.advance(Duration::from_millis(20));
        anim.start();
        looper.advance(Duration::from_millis(20));

        assert_eq!(
            recorder.events(),
            vec!["start", "end:Finished", "start", "end:Finished"]
        );
    }

    #[test]
    fn test_on_end_closure_fires_once() {
        let looper = looper();
        let anim = Animator::empty(&looper, Duration::from_millis(20));
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let o = outcomes.clone();
        anim.on_end(move |outcome| o.lock().push(outcome));

        anim.start();
        anim.cancel();
        anim.start();
        looper.advance(Duration::from_millis(20));

        assert_eq!(*outcomes.lock(), vec![AnimationOutcome::Cancelled]);
    }

    #[test]
    fn test_listener_can_cancel_from_start() {
        let looper = looper();
        let anim = Animator::empty(&looper, Duration::from_millis(100));
        let handle = anim.clone();
        anim.on_start(move || handle.cancel());
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let o = outcomes.clone();
        anim.on_end(move |outcome| o.lock().push(outcome));

        anim.start();
        assert_eq!(*outcomes.lock(), vec![AnimationOutcome::Cancelled]);
        assert!(!anim.is_running());
    }

    #[test]
    fn test_segments_follow_fraction() {
        let looper = looper();
        let values = Arc::new(Mutex::new(Vec::new()));
        let v = values.clone();
        let mut builder = PendingAnimation::new(Duration::from_millis(100));
        builder.add_float_in_range(0.0, 10.0, 0.5, 1.0, Interpolator::Linear, move |x| {
            v.lock().push(x)
        });
        let anim = builder.build_anim(&looper);

        anim.set_current_fraction(0.25);
        anim.set_current_fraction(0.75);
        anim.set_current_fraction(1.0);

        assert_eq!(*values.lock(), vec![0.0, 5.0, 10.0]);
    }

    #[test]
    fn test_remove_listener() {
        let looper = looper();
        let (anim, recorder) = recorded(&looper, Duration::from_millis(10));
        let as_dyn: Arc<dyn AnimatorListener> = recorder.clone();

        assert!(anim.remove_listener(&as_dyn));
        assert!(!anim.remove_listener(&as_dyn));
        anim.end();
        assert!(recorder.events().is_empty());
    }
}
