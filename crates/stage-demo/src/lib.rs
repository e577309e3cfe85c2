//! Launcher-style demo host for Stage.

pub mod launcher;
