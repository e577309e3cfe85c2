//! Animation primitives for Stage.
//!
//! This crate provides:
//! - `Looper` - single-threaded frame clock and delayed task queue
//! - `Animator` - a controllable timeline with start/cancel/end listeners
//! - `PendingAnimation` - builder that many contributors append segments to
//! - `PlaybackController` - scrubbable wrapper around an `Animator`
//! - `Interpolator` - easing curves

pub mod animator;
pub mod controller;
pub mod interpolator;
pub mod looper;
pub mod pending;

pub use animator::{AnimationOutcome, Animator, AnimatorListener};
pub use controller::PlaybackController;
pub use interpolator::Interpolator;
pub use looper::{FrameCallback, Looper};
pub use pending::PendingAnimation;
