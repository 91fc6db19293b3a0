// src/builder/mod.rs

//! Build-system abstraction.
//!
//! The supervisor never talks to the build tool directly. It asks a
//! [`BuilderFactory`] for a fresh [`Builder`] per operation, configures it,
//! and runs one of two requests:
//!
//! - [`Builder::build`]: rebuild the target, report success or failure.
//! - [`Builder::prepare_run`]: build the target and hand back an executable
//!   that runs it (the process group is then spawned from that).
//!
//! [`bazel`] holds the production implementation. Tests plug in fakes.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::BoxFuture;

pub mod bazel;

pub use bazel::{BazelBuilder, BazelBuilderFactory};

/// Combined stdout/stderr captured from the build tool.
pub type OutputBuffer = Vec<u8>;

/// Result of a build as reported by the build tool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildFailure {
    #[error("build tool exited with status {0}")]
    Exited(i32),

    #[error("build tool was terminated by a signal")]
    Signalled,

    #[error("could not invoke build tool: {0}")]
    Invoke(String),
}

pub type BuildResult<T> = std::result::Result<T, BuildFailure>;

/// One configured invocation of the build tool.
pub trait Builder: Send {
    /// Arguments placed before the build tool's command verb.
    fn set_startup_args(&mut self, args: Vec<String>);

    /// Arguments placed after the command verb, before the target.
    fn set_arguments(&mut self, args: Vec<String>);

    /// Echo the tool's stdout to ours while capturing it.
    fn write_to_stdout(&mut self, enabled: bool);

    /// Echo the tool's stderr to ours while capturing it.
    fn write_to_stderr(&mut self, enabled: bool);

    fn build<'a>(&'a mut self, target: &'a str) -> BoxFuture<'a, (OutputBuffer, BuildResult<()>)>;

    /// Build `target` and return the path of an executable that runs it.
    fn prepare_run<'a>(
        &'a mut self,
        target: &'a str,
    ) -> BoxFuture<'a, (OutputBuffer, BuildResult<PathBuf>)>;
}

/// Hands out fresh builders. Shared between supervisors, hence `Sync`.
pub trait BuilderFactory: Send + Sync {
    fn new_builder(&self) -> Box<dyn Builder>;
}
