// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling `[watch]` include / exclude glob patterns.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Collapsing bursts of filesystem events into one rebuild request.
//!
//! It does **not** know about builds or subprocesses; it only turns
//! filesystem changes into [`crate::engine::SupervisorEvent::ChangesDetected`].

pub mod patterns;
pub mod watcher;

pub use patterns::{WatchFilter, relative_str};
pub use watcher::{WatcherHandle, spawn_watcher};
