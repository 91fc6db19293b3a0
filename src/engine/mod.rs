// src/engine/mod.rs

//! Event loop that drives one supervisor.
//!
//! The watcher and the Ctrl-C handler only send [`SupervisorEvent`]s; the
//! [`Runtime`] is the single owner of the supervisor and applies events to
//! it one at a time, which is what serializes `notify_of_changes` and
//! `terminate`.

pub mod runtime;

pub use runtime::Runtime;

/// Events flowing into the runtime from the watcher and signal handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// Watched files changed; paths are relative to the watch root.
    ChangesDetected { paths: Vec<String> },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}
