//! Error types for Stage.

use std::time::Duration;
use thiserror::Error;

/// State manager errors.
///
/// None of these are fatal to the manager: callers log them and the UI
/// settles on the nearest stable state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    /// The atomic animation factory has no animation for this slot.
    #[error("Unknown state element animation {index}")]
    UnknownElementAnimation { index: usize },

    /// The slot index is outside the factory's fixed slot array.
    #[error("State element slot {index} out of range (factory has {slots} slots)")]
    ElementSlotOutOfRange { index: usize, slots: usize },

    /// Cancellation kept producing new animations and never reached a fixed point.
    #[error("Animation cancellation did not settle after {iterations} iterations")]
    CancellationDidNotSettle { iterations: usize },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No config directory found.
    #[error("Config directory not found")]
    NoConfigDir,

    /// IO error.
    #[error("IO error: {0}")]
    Io(String),

    /// Parse error.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Errors from the dispatch thread.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Dispatch thread is gone (shut down or panicked).
    #[error("Dispatch thread unavailable")]
    Unavailable,

    /// The dispatched closure did not finish in time.
    #[error("Dispatch timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Channel communication error.
    #[error("Channel error: {0}")]
    Channel(String),
}
