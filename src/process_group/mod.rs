// src/process_group/mod.rs

//! Process-group abstraction consumed by the supervisors.
//!
//! A process group is a root process plus every descendant it spawns,
//! started, signalled and reaped as one unit. The supervisors only rely on
//! the traits here; [`unix`] provides the real implementation.

use std::io;
use std::path::Path;

use tokio::io::AsyncWrite;

use crate::types::BoxFuture;

#[cfg(unix)]
pub mod unix;

#[cfg(unix)]
pub use unix::{UnixProcessGroup, UnixProcessGroupFactory};

/// Write half of the root process's stdin.
pub type StdinHandle = Box<dyn AsyncWrite + Send + Unpin>;

/// The root process of a group.
pub trait RootProcess: Send {
    /// True once started and until the process has exited.
    fn is_running(&mut self) -> bool;

    /// Replace the environment the process will be spawned with.
    fn set_env(&mut self, vars: Vec<(String, String)>);

    /// Request a stdin pipe. Only valid before [`ProcessGroup::start`].
    fn pipe_stdin(&mut self) -> io::Result<()>;

    /// Take the stdin pipe requested with [`RootProcess::pipe_stdin`].
    ///
    /// Returns `None` if no pipe was requested, the process has not been
    /// started, or the pipe was already taken.
    fn take_stdin(&mut self) -> Option<StdinHandle>;
}

pub trait ProcessGroup: Send {
    fn root_process(&mut self) -> &mut dyn RootProcess;

    /// Spawn the root process in a fresh group.
    fn start(&mut self) -> io::Result<()>;

    /// Forcefully kill every process in the group.
    fn kill(&mut self) -> io::Result<()>;

    /// Ask every process in the group to exit.
    fn terminate(&mut self) -> io::Result<()>;

    /// Resolve once the whole group has exited.
    fn wait(&mut self) -> BoxFuture<'_, io::Result<()>>;

    /// Release OS resources held for the group.
    fn close(&mut self);

    /// Tell the root process that it should refresh (SIGHUP on Unix).
    fn refresh_signal(&mut self) -> io::Result<()>;
}

/// Creates process groups for a program and its arguments.
pub trait ProcessGroupFactory: Send + Sync {
    fn command(&self, program: &Path, args: &[String]) -> Box<dyn ProcessGroup>;
}
