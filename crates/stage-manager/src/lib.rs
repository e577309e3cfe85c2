//! State transition coordinator for Stage.
//!
//! This crate provides:
//! - `State` / `StateHandler` / `StatefulContainer` - the contracts a host implements
//! - `StateManager` - drives the host through animated or immediate transitions
//! - `AnimationState` - bookkeeping for the in-flight transition
//! - `AtomicAnimationFactory` - bounded per-element animation slots
//! - `StateAnimationConfig` - duration, flags and interpolator presets

pub mod animation_state;
pub mod atomic;
pub mod config;
pub mod container;
pub mod handler;
pub mod manager;
pub mod state;

pub use animation_state::AnimationState;
pub use atomic::{AtomicAnimationFactory, AtomicAnimationProvider};
pub use config::{AnimationFlags, PropertyId, StateAnimationConfig};
pub use container::StatefulContainer;
pub use handler::StateHandler;
pub use manager::{StateManager, TransitionCallback};
pub use state::{State, StateListener};

// Re-export the animation primitives hosts need to implement handlers
pub use stage_anim::{
    AnimationOutcome, Animator, AnimatorListener, Interpolator, Looper, PendingAnimation,
    PlaybackController,
};
pub use stage_core::{ManagerSettings, StateError};
