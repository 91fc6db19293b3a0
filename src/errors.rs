// src/errors.rs

//! Crate-wide error types.
//!
//! Only [`StartupFailure`] ever escapes the supervisor contract. Build
//! failures are data (see [`crate::builder::BuildFailure`]) and stdin/signal
//! delivery problems are logged where they happen.

use thiserror::Error;

use crate::builder::{BuildFailure, OutputBuffer};

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Why the subprocess could not be brought up.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("could not prepare runnable: {0}")]
    PrepareRun(#[source] BuildFailure),

    #[error("could not spawn process group: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("stdin of the root process is unavailable")]
    StdinUnavailable,
}

/// A failed `start`, carrying whatever build output was captured before the
/// failure so the caller can still show it.
#[derive(Error, Debug)]
#[error("startup failed: {reason}")]
pub struct StartupFailure {
    #[source]
    pub reason: StartupError,
    pub output: OutputBuffer,
}

impl StartupFailure {
    pub fn new(reason: StartupError, output: OutputBuffer) -> Self {
        Self { reason, output }
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
