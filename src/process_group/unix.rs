// src/process_group/unix.rs

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill, killpg};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::{ProcessGroup, ProcessGroupFactory, RootProcess, StdinHandle};
use crate::types::BoxFuture;

/// How often `wait` re-checks whether stragglers are left in the group.
const GROUP_DRAIN_POLL: Duration = Duration::from_millis(20);

/// How long `wait` keeps polling after the root is reaped. Orphaned
/// descendants that nobody reaps stay visible to `killpg` as zombies.
const GROUP_DRAIN_LIMIT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, Default)]
pub struct UnixProcessGroupFactory;

impl ProcessGroupFactory for UnixProcessGroupFactory {
    fn command(&self, program: &Path, args: &[String]) -> Box<dyn ProcessGroup> {
        Box::new(UnixProcessGroup::new(program, args))
    }
}

/// A process group whose id equals the root's pid (`setpgid(0, 0)` at
/// spawn), so the whole tree can be signalled with `killpg`.
#[derive(Debug)]
pub struct UnixProcessGroup {
    root: UnixRootProcess,
}

#[derive(Debug)]
struct UnixRootProcess {
    command: Command,
    child: Option<Child>,
    pid: Option<Pid>,
    stdin_piped: bool,
}

impl UnixProcessGroup {
    pub fn new(program: &Path, args: &[String]) -> Self {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .process_group(0);

        Self {
            root: UnixRootProcess {
                command,
                child: None,
                pid: None,
                stdin_piped: false,
            },
        }
    }

    fn group_id(&self) -> io::Result<Pid> {
        self.root
            .pid
            .ok_or_else(|| io::Error::other("process group has not been started"))
    }

    fn signal_group(&self, signal: Signal) -> io::Result<()> {
        let pgid = self.group_id()?;
        debug!(pgid = pgid.as_raw(), ?signal, "signalling process group");
        killpg(pgid, signal).map_err(io::Error::from)
    }
}

impl RootProcess for UnixRootProcess {
    fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    fn set_env(&mut self, vars: Vec<(String, String)>) {
        self.command.env_clear().envs(vars);
    }

    fn pipe_stdin(&mut self) -> io::Result<()> {
        if self.child.is_some() {
            return Err(io::Error::other(
                "stdin pipe must be requested before the process starts",
            ));
        }
        self.command.stdin(Stdio::piped());
        self.stdin_piped = true;
        Ok(())
    }

    fn take_stdin(&mut self) -> Option<StdinHandle> {
        if !self.stdin_piped {
            return None;
        }
        let stdin = self.child.as_mut()?.stdin.take()?;
        Some(Box::new(stdin))
    }
}

impl ProcessGroup for UnixProcessGroup {
    fn root_process(&mut self) -> &mut dyn RootProcess {
        &mut self.root
    }

    fn start(&mut self) -> io::Result<()> {
        if self.root.child.is_some() {
            return Err(io::Error::other("process group already started"));
        }
        let child = self.root.command.spawn()?;
        let pid = child
            .id()
            .ok_or_else(|| io::Error::other("spawned process has no pid"))?;
        info!(pid, "process group started");
        self.root.pid = Some(Pid::from_raw(pid as i32));
        self.root.child = Some(child);
        Ok(())
    }

    fn kill(&mut self) -> io::Result<()> {
        self.signal_group(Signal::SIGKILL)
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.signal_group(Signal::SIGTERM)
    }

    fn wait(&mut self) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move {
            let pgid = self.group_id()?;
            if let Some(child) = self.root.child.as_mut() {
                let status = child.wait().await?;
                debug!(pgid = pgid.as_raw(), ?status, "root process exited");
            }
            // Descendants may outlive the root; the group is gone once
            // signal 0 reports ESRCH.
            let deadline = tokio::time::Instant::now() + GROUP_DRAIN_LIMIT;
            loop {
                match killpg(pgid, None) {
                    Err(Errno::ESRCH) => break,
                    Err(e) => return Err(io::Error::from(e)),
                    Ok(()) if tokio::time::Instant::now() >= deadline => {
                        warn!(
                            pgid = pgid.as_raw(),
                            "process group still has members; not waiting further"
                        );
                        return Ok(());
                    }
                    Ok(()) => tokio::time::sleep(GROUP_DRAIN_POLL).await,
                }
            }
            debug!(pgid = pgid.as_raw(), "process group drained");
            Ok(())
        })
    }

    fn close(&mut self) {
        if let Some(child) = self.root.child.as_mut() {
            child.stdin.take();
        }
        self.root.child = None;
    }

    fn refresh_signal(&mut self) -> io::Result<()> {
        let pid = self.group_id()?;
        debug!(pid = pid.as_raw(), "sending SIGHUP to root process");
        kill(pid, Signal::SIGHUP).map_err(io::Error::from)
    }
}
