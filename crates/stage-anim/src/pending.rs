//! Builder for composite animations.
//!
//! Many independent contributors append segments into one `PendingAnimation`,
//! which is then built into a single [`Animator`] sharing one duration.

use std::sync::Arc;
use std::time::Duration;

use crate::animator::{AnimationOutcome, Animator, AnimatorListener, Segment};
use crate::interpolator::Interpolator;
use crate::looper::Looper;

/// Collects segments and listeners for one composite animation.
pub struct PendingAnimation {
    duration: Duration,
    segments: Vec<Segment>,
    listeners: Vec<Arc<dyn AnimatorListener>>,
}

impl PendingAnimation {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            segments: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Duration shared by every segment.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Number of segments added so far.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Animate a value from `from` to `to` over the whole duration.
    pub fn add_float<F>(&mut self, from: f32, to: f32, interpolator: Interpolator, setter: F)
    where
        F: FnMut(f32) + Send + 'static,
    {
        self.add_float_in_range(from, to, 0.0, 1.0, interpolator, setter);
    }

    /// Animate a value only while overall progress is within `start..=end`.
    ///
    /// Before `start` the value sits at `from`, after `end` at `to`.
    pub fn add_float_in_range<F>(
        &mut self,
        from: f32,
        to: f32,
        start: f32,
        end: f32,
        interpolator: Interpolator,
        setter: F,
    ) where
        F: FnMut(f32) + Send + 'static,
    {
        self.segments.push(Segment {
            from,
            to,
            start: start.clamp(0.0, 1.0),
            end: end.clamp(0.0, 1.0),
            interpolator,
            setter: Box::new(setter),
        });
    }

    pub fn add_listener(&mut self, listener: Arc<dyn AnimatorListener>) {
        self.listeners.push(listener);
    }

    /// Call `f` with the outcome once the built animation finishes.
    pub fn add_end_listener<F>(&mut self, f: F)
    where
        F: FnOnce(AnimationOutcome) + Send + 'static,
    {
        self.listeners.push(Arc::new(EndListener(parking_lot::Mutex::new(Some(
            Box::new(f),
        )))));
    }

    /// Build the composite animator. It is not started.
    pub fn build_anim(self, looper: &Looper) -> Animator {
        Animator::from_parts(looper, self.duration, self.segments, self.listeners)
    }
}

impl std::fmt::Debug for PendingAnimation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingAnimation")
            .field("duration", &self.duration)
            .field("segments", &self.segments.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

struct EndListener(parking_lot::Mutex<Option<Box<dyn FnOnce(AnimationOutcome) + Send>>>);

impl AnimatorListener for EndListener {
    fn on_end(&self, _animator: &Animator, outcome: AnimationOutcome) {
        let callback = self.0.lock().take();
        if let Some(callback) = callback {
            callback(outcome);
        }
    }
}
