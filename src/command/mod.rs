// src/command/mod.rs

//! Supervisors for the long-running process built from a target.
//!
//! Two implementations share the [`Command`] contract and differ only in how
//! the process hears about a rebuild:
//!
//! - [`notify::NotifyCommand`] writes protocol lines to its stdin and sets
//!   `IBAZEL_NOTIFY_CHANGES=y`.
//! - [`signal::SignalCommand`] sends the group's refresh signal and sets
//!   `IBAZEL_SIGNAL_CHANGES=y`.
//!
//! Launching, liveness checks and teardown are shared and live here.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::builder::{Builder, BuilderFactory, OutputBuffer};
use crate::errors::{StartupError, StartupFailure};
use crate::process_group::{ProcessGroup, ProcessGroupFactory};
use crate::types::{BoxFuture, NotifyMode, SupervisorState, TerminationPolicy};

pub mod notify;
pub mod protocol;
pub mod signal;

pub use notify::NotifyCommand;
pub use protocol::ProtocolMessage;
pub use signal::SignalCommand;

/// Environment flag set on subprocesses started by [`NotifyCommand`].
pub const NOTIFY_CHANGES_ENV: &str = "IBAZEL_NOTIFY_CHANGES";

/// Environment flag set on subprocesses started by [`SignalCommand`].
pub const SIGNAL_CHANGES_ENV: &str = "IBAZEL_SIGNAL_CHANGES";

/// Contract shared by every supervisor.
///
/// All methods take `&mut self`: a supervisor is driven by a single owner
/// (the engine's event loop) and never locks internally. Calling
/// `terminate` while a `notify_of_changes` is in flight therefore requires
/// the caller to serialize the two.
pub trait Command: Send {
    /// Build the runnable and spawn it in a new process group.
    fn start(&mut self) -> BoxFuture<'_, Result<OutputBuffer, StartupFailure>>;

    /// Stop the process group, if one is running. Idempotent.
    fn terminate(&mut self) -> BoxFuture<'_, ()>;

    /// Rebuild and tell the running process, or start it if it is not running.
    fn notify_of_changes(&mut self) -> BoxFuture<'_, OutputBuffer>;

    fn is_subprocess_running(&mut self) -> bool;

    fn state(&mut self) -> SupervisorState {
        if self.is_subprocess_running() {
            SupervisorState::Running
        } else {
            SupervisorState::NotRunning
        }
    }
}

/// Per-target settings shared by both supervisors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub target: String,
    pub startup_args: Vec<String>,
    pub build_args: Vec<String>,
    pub program_args: Vec<String>,
    pub termination: TerminationPolicy,
}

impl SupervisorConfig {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            startup_args: Vec::new(),
            build_args: Vec::new(),
            program_args: Vec::new(),
            termination: TerminationPolicy::default(),
        }
    }
}

/// Pick the supervisor for `mode`.
pub fn new_command(
    mode: NotifyMode,
    config: SupervisorConfig,
    builders: Arc<dyn BuilderFactory>,
    groups: Arc<dyn ProcessGroupFactory>,
) -> Box<dyn Command> {
    match mode {
        NotifyMode::Notify => Box::new(NotifyCommand::new(config, builders, groups)),
        NotifyMode::Signal => Box::new(SignalCommand::new(config, builders, groups)),
    }
}

/// Fresh builder with the target's args and output echoing enabled.
fn configured_builder(builders: &dyn BuilderFactory, config: &SupervisorConfig) -> Box<dyn Builder> {
    let mut builder = builders.new_builder();
    builder.set_startup_args(config.startup_args.clone());
    builder.set_arguments(config.build_args.clone());
    builder.write_to_stderr(true);
    builder.write_to_stdout(true);
    builder
}

/// Inherited environment plus `flag=y`, with neither protocol flag carried
/// over from our own environment. Non-UTF-8 variables are dropped.
fn subprocess_env(flag: &str) -> Vec<(String, String)> {
    let mut vars: Vec<(String, String)> = std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .filter(|(key, _)| key != NOTIFY_CHANGES_ENV && key != SIGNAL_CHANGES_ENV)
        .collect();
    vars.push((flag.to_string(), "y".to_string()));
    vars
}

/// Everything `start` needs before spawning.
struct Launch<'a> {
    builders: &'a dyn BuilderFactory,
    groups: &'a dyn ProcessGroupFactory,
    config: &'a SupervisorConfig,
    env_flag: &'static str,
    pipe_stdin: bool,
}

impl Launch<'_> {
    /// Prepare the runnable and spawn its process group.
    async fn spawn(self) -> Result<(OutputBuffer, Box<dyn ProcessGroup>), StartupFailure> {
        let mut builder = configured_builder(self.builders, self.config);
        let (output, program) = builder.prepare_run(&self.config.target).await;
        let program = match program {
            Ok(program) => program,
            Err(e) => {
                error!(label = %self.config.target, error = %e, "error preparing runnable");
                return Err(StartupFailure::new(StartupError::PrepareRun(e), output));
            }
        };

        let mut group = self.groups.command(&program, &self.config.program_args);
        if self.pipe_stdin {
            if let Err(e) = group.root_process().pipe_stdin() {
                error!(label = %self.config.target, error = %e, "error getting stdin pipe");
                return Err(StartupFailure::new(StartupError::StdinUnavailable, output));
            }
        }
        group.root_process().set_env(subprocess_env(self.env_flag));

        if let Err(e) = group.start() {
            error!(label = %self.config.target, error = %e, "error starting process");
            return Err(StartupFailure::new(StartupError::Spawn(e), output));
        }

        info!(label = %self.config.target, program = %program.display(), "Starting...");
        Ok((output, group))
    }
}

/// Liveness of an optionally owned group.
fn group_running(group: Option<&mut Box<dyn ProcessGroup>>) -> bool {
    group.is_some_and(|g| g.root_process().is_running())
}

/// Tear down an owned group according to `policy`.
///
/// A group whose root already exited on its own is only closed: signalling
/// or waiting on a pid that is gone would fail or hang.
async fn shutdown_group(mut group: Box<dyn ProcessGroup>, policy: TerminationPolicy) {
    if !group.root_process().is_running() {
        info!("subprocess already exited; releasing handle");
        group.close();
        return;
    }

    let signalled = match policy {
        TerminationPolicy::Forced => group.kill(),
        TerminationPolicy::Graceful => group.terminate(),
    };
    if let Err(e) = signalled {
        warn!(?policy, error = %e, "failed to signal process group");
    }

    if let Err(e) = group.wait().await {
        warn!(error = %e, "error waiting for process group to exit");
    }
    group.close();
    info!(?policy, "subprocess terminated");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_carries_exactly_one_flag() {
        let env = subprocess_env(NOTIFY_CHANGES_ENV);
        let flags: Vec<_> = env
            .iter()
            .filter(|(k, _)| k == NOTIFY_CHANGES_ENV || k == SIGNAL_CHANGES_ENV)
            .collect();
        assert_eq!(flags, vec![&(NOTIFY_CHANGES_ENV.to_string(), "y".to_string())]);
    }

    #[test]
    fn env_inherits_caller_environment() {
        let env = subprocess_env(SIGNAL_CHANGES_ENV);
        if let Ok(path) = std::env::var("PATH") {
            assert!(env.contains(&("PATH".to_string(), path)));
        }
    }

    #[test]
    fn config_defaults_to_graceful_without_args() {
        let cfg = SupervisorConfig::new("//:app");
        assert_eq!(cfg.termination, TerminationPolicy::Graceful);
        assert!(cfg.program_args.is_empty());
    }
}
