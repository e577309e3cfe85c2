//! Single-threaded dispatch loop.
//!
//! The `Looper` owns two things: a queue of delayed tasks and a list of frame
//! callbacks (running animators). Time only moves when the owner calls
//! [`Looper::advance`], which makes the loop fully deterministic under test.
//! `stage-runtime` drives it from a dedicated thread with the wall clock.
//!
//! ## Ordering
//!
//! Within one frame step, due tasks run first (ordered by due time, then by
//! posting order), then the frame callbacks that were registered before the
//! step are ticked with it. A callback registered during the step gets its
//! first tick on the next one.
//!
//! No lock is held while a task or frame callback runs, so both may post new
//! tasks or start new animators.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Something that wants a tick every frame.
pub trait FrameCallback: Send + Sync {
    /// Advance by `dt`. Return `false` to be unregistered.
    fn do_frame(&self, dt: Duration) -> bool;
}

type Task = Box<dyn FnOnce() + Send>;

struct ScheduledTask {
    due: Duration,
    task: Task,
}

struct LooperState {
    now: Duration,
    /// Sorted by due time; equal due times keep posting order.
    tasks: Vec<ScheduledTask>,
    frame_callbacks: Vec<Arc<dyn FrameCallback>>,
}

/// Deterministic dispatch loop: delayed tasks plus per-frame callbacks.
///
/// Cheap to clone; all clones share the same queue and clock.
#[derive(Clone)]
pub struct Looper {
    frame_interval: Duration,
    state: Arc<Mutex<LooperState>>,
}

impl Looper {
    /// Create a looper that advances in steps of `frame_interval`.
    ///
    /// A zero interval is clamped to 1ms.
    pub fn new(frame_interval: Duration) -> Self {
        let frame_interval = if frame_interval.is_zero() {
            Duration::from_millis(1)
        } else {
            frame_interval
        };
        Self {
            frame_interval,
            state: Arc::new(Mutex::new(LooperState {
                now: Duration::ZERO,
                tasks: Vec::new(),
                frame_callbacks: Vec::new(),
            })),
        }
    }

    /// The frame step.
    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Time elapsed on this looper's clock.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    /// Run `task` on the next pass of the loop.
    pub fn post<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.post_delayed(Duration::ZERO, task);
    }

    /// Run `task` once `delay` has elapsed on the looper clock.
    pub fn post_delayed<F>(&self, delay: Duration, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.state.lock();
        let due = state.now.saturating_add(delay);
        let pos = state.tasks.partition_point(|t| t.due <= due);
        state.tasks.insert(
            pos,
            ScheduledTask {
                due,
                task: Box::new(task),
            },
        );
    }

    /// Number of queued tasks.
    pub fn pending_tasks(&self) -> usize {
        self.state.lock().tasks.len()
    }

    /// Run every task that is due now. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = {
                let mut state = self.state.lock();
                match state.tasks.first() {
                    Some(t) if t.due <= state.now => Some(state.tasks.remove(0)),
                    _ => None,
                }
            };
            match next {
                Some(scheduled) => {
                    (scheduled.task)();
                    ran += 1;
                }
                None => break,
            }
        }
        ran
    }

    // =========================================================================
    // Frames
    // =========================================================================

    /// Register a frame callback. Registering the same callback twice is a no-op.
    pub fn add_frame_callback(&self, callback: Arc<dyn FrameCallback>) {
        let mut state = self.state.lock();
        if !state
            .frame_callbacks
            .iter()
            .any(|c| Arc::ptr_eq(c, &callback))
        {
            state.frame_callbacks.push(callback);
        }
    }

    /// Unregister a frame callback.
    pub fn remove_frame_callback(&self, callback: &Arc<dyn FrameCallback>) {
        self.state
            .lock()
            .frame_callbacks
            .retain(|c| !Arc::ptr_eq(c, callback));
    }

    /// Number of registered frame callbacks.
    pub fn frame_callback_count(&self) -> usize {
        self.state.lock().frame_callbacks.len()
    }

    /// Whether there is nothing left to run.
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.tasks.is_empty() && state.frame_callbacks.is_empty()
    }

    fn dispatch_frame(&self, callbacks: Vec<Arc<dyn FrameCallback>>, dt: Duration) {
        let finished: Vec<_> = callbacks
            .into_iter()
            .filter(|callback| !callback.do_frame(dt))
            .collect();
        if !finished.is_empty() {
            let mut state = self.state.lock();
            state
                .frame_callbacks
                .retain(|c| !finished.iter().any(|f| Arc::ptr_eq(c, f)));
        }
    }

    // =========================================================================
    // Clock
    // =========================================================================

    /// Advance the clock by `elapsed`, one frame step at a time.
    ///
    /// A zero `elapsed` only runs tasks that are already due.
    pub fn advance(&self, elapsed: Duration) {
        self.run_pending();
        let mut remaining = elapsed;
        while !remaining.is_zero() {
            let step = remaining.min(self.frame_interval);
            remaining -= step;
            let callbacks = {
                let mut state = self.state.lock();
                state.now += step;
                state.frame_callbacks.clone()
            };
            self.run_pending();
            self.dispatch_frame(callbacks, step);
        }
    }

    /// Advance frame by frame until idle or until `limit` has elapsed.
    ///
    /// Returns the time advanced.
    pub fn run_until_idle(&self, limit: Duration) -> Duration {
        let mut advanced = Duration::ZERO;
        self.run_pending();
        while !self.is_idle() && advanced < limit {
            let step = self.frame_interval.min(limit - advanced);
            self.advance(step);
            advanced += step;
        }
        advanced
    }
}

impl Default for Looper {
    fn default() -> Self {
        Self::new(Duration::from_millis(16))
    }
}

impl std::fmt::Debug for Looper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Looper")
            .field("frame_interval", &self.frame_interval)
            .field("now", &state.now)
            .field("pending_tasks", &state.tasks.len())
            .field("frame_callbacks", &state.frame_callbacks.len())
            .finish()
    }
}
