//! Core types for the Stage transition coordinator.
//!
//! This crate contains shared data structures that are used across all Stage crates:
//! - Error types
//! - Configuration types

mod config;
mod error;

pub use config::{
    config_dir, config_path, ensure_config_dir, AnimationSettings, ManagerSettings, StageConfig,
};
pub use error::{ConfigError, RuntimeError, StateError};
