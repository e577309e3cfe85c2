//! Dispatch thread with async access.
//!
//! Transitions, animators and their callbacks all run on one logical thread.
//! `MainThread` owns that thread: it advances a [`Looper`] with the wall clock
//! and runs closures sent to it over a channel.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use stage_anim::Looper;
use stage_core::{AnimationSettings, RuntimeError};
use tokio::sync::oneshot;

type Job = Box<dyn FnOnce(&Looper) + Send>;

/// Request types for the dispatch thread.
pub enum MainThreadRequest {
    /// Run a closure on the dispatch thread.
    Run(Job),
    Shutdown,
}

/// A dedicated OS thread driving a [`Looper`].
///
/// Between requests the thread sleeps for at most one frame, then advances
/// the looper by the real time elapsed since the previous frame.
pub struct MainThread {
    tx: mpsc::Sender<MainThreadRequest>,
    looper: Looper,
    _handle: JoinHandle<()>,
}

impl MainThread {
    /// Spawn the dispatch thread. Uses std::thread, not a tokio task.
    pub fn new(looper: Looper) -> Self {
        let (tx, rx) = mpsc::channel();
        let thread_looper = looper.clone();

        let handle = thread::spawn(move || {
            let looper = thread_looper;
            let frame = looper.frame_interval();
            tracing::info!("Dispatch thread started ({:?} frames)", frame);
            let mut last_frame = Instant::now();

            loop {
                let wait = frame.saturating_sub(last_frame.elapsed());
                match rx.recv_timeout(wait) {
                    Ok(MainThreadRequest::Run(job)) => {
                        job(&looper);
                        looper.run_pending();
                    }
                    Ok(MainThreadRequest::Shutdown) => {
                        tracing::info!("Dispatch thread shutting down");
                        break;
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }

                let elapsed = last_frame.elapsed();
                if elapsed >= frame {
                    last_frame = Instant::now();
                    looper.advance(elapsed);
                }
            }
        });

        Self {
            tx,
            looper,
            _handle: handle,
        }
    }

    /// Spawn a dispatch thread with the configured frame interval.
    pub fn from_settings(settings: &AnimationSettings) -> Self {
        Self::new(Looper::new(settings.frame_interval()))
    }

    /// The looper driven by this thread.
    pub fn looper(&self) -> &Looper {
        &self.looper
    }

    /// Queue `f` on the dispatch thread without waiting for it.
    pub fn post<F>(&self, f: F) -> Result<(), RuntimeError>
    where
        F: FnOnce(&Looper) + Send + 'static,
    {
        self.tx
            .send(MainThreadRequest::Run(Box::new(f)))
            .map_err(|e| RuntimeError::Channel(e.to_string()))
    }

    /// Run `f` on the dispatch thread and wait for its result.
    pub async fn run<F, T>(&self, f: F) -> Result<T, RuntimeError>
    where
        F: FnOnce(&Looper) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.post(move |looper| {
            let _ = resp_tx.send(f(looper));
        })?;
        resp_rx.await.map_err(|_| RuntimeError::Unavailable)
    }

    /// Execute with timeout wrapper.
    ///
    /// The closure still runs to completion on the dispatch thread; only the
    /// wait is abandoned.
    pub async fn run_timeout<F, T>(&self, timeout: Duration, f: F) -> Result<T, RuntimeError>
    where
        F: FnOnce(&Looper) -> T + Send + 'static,
        T: Send + 'static,
    {
        match tokio::time::timeout(timeout, self.run(f)).await {
            Ok(result) => result,
            Err(_) => Err(RuntimeError::Timeout { duration: timeout }),
        }
    }

    /// Wait until the looper has no tasks and no running animators.
    pub async fn wait_for_idle(&self, limit: Duration) -> Result<(), RuntimeError> {
        let poll = async {
            loop {
                if self.run(|looper| looper.is_idle()).await? {
                    return Ok::<(), RuntimeError>(());
                }
                tokio::time::sleep(self.looper.frame_interval()).await;
            }
        };
        match tokio::time::timeout(limit, poll).await {
            Ok(result) => result,
            Err(_) => Err(RuntimeError::Timeout { duration: limit }),
        }
    }

    /// Shutdown the dispatch thread.
    pub fn shutdown(&self) {
        let _ = self.tx.send(MainThreadRequest::Shutdown);
    }
}

impl Drop for MainThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}
