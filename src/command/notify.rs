// src/command/notify.rs

//! Supervisor that tells its process about rebuilds over stdin.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use super::protocol::ProtocolMessage;
use super::{
    Command, Launch, NOTIFY_CHANGES_ENV, SupervisorConfig, configured_builder, group_running,
    shutdown_group,
};
use crate::builder::{BuilderFactory, OutputBuffer};
use crate::errors::{StartupError, StartupFailure};
use crate::process_group::{ProcessGroup, ProcessGroupFactory, StdinHandle};
use crate::types::BoxFuture;

/// A started group and the write end of its root's stdin. Kept together so
/// one is never present without the other.
struct Running {
    group: Box<dyn ProcessGroup>,
    stdin: StdinHandle,
}

/// Writes `IBAZEL_BUILD_STARTED` before each rebuild and
/// `IBAZEL_BUILD_COMPLETED SUCCESS|FAILURE` after it.
pub struct NotifyCommand {
    config: SupervisorConfig,
    builders: Arc<dyn BuilderFactory>,
    groups: Arc<dyn ProcessGroupFactory>,
    running: Option<Running>,
}

impl std::fmt::Debug for NotifyCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyCommand")
            .field("config", &self.config)
            .field("running", &self.running.is_some())
            .finish_non_exhaustive()
    }
}

impl NotifyCommand {
    pub fn new(
        config: SupervisorConfig,
        builders: Arc<dyn BuilderFactory>,
        groups: Arc<dyn ProcessGroupFactory>,
    ) -> Self {
        Self {
            config,
            builders,
            groups,
            running: None,
        }
    }

    async fn start_inner(&mut self) -> Result<OutputBuffer, StartupFailure> {
        // One group per supervisor: replace rather than leak.
        self.terminate_inner().await;

        let launch = Launch {
            builders: self.builders.as_ref(),
            groups: self.groups.as_ref(),
            config: &self.config,
            env_flag: NOTIFY_CHANGES_ENV,
            pipe_stdin: true,
        };
        let (output, mut group) = launch.spawn().await?;

        let Some(stdin) = group.root_process().take_stdin() else {
            error!(label = %self.config.target, "started process has no stdin pipe");
            // Never keep a group we cannot talk to.
            if let Err(e) = group.kill() {
                error!(error = %e, "failed to kill process group without stdin");
            }
            if let Err(e) = group.wait().await {
                warn!(error = %e, "error waiting for process group without stdin");
            }
            group.close();
            return Err(StartupFailure::new(StartupError::StdinUnavailable, output));
        };

        self.running = Some(Running { group, stdin });
        Ok(output)
    }

    async fn notify_inner(&mut self) -> OutputBuffer {
        if !self.is_subprocess_running() {
            return match self.start_inner().await {
                Ok(output) => output,
                Err(failure) => {
                    error!(error = %failure, "restart on change failed");
                    failure.output
                }
            };
        }

        let mut builder = configured_builder(self.builders.as_ref(), &self.config);
        let Some(running) = self.running.as_mut() else {
            return OutputBuffer::new();
        };

        send(&mut running.stdin, ProtocolMessage::BuildStarted).await;

        let (output, result) = builder.build(&self.config.target).await;
        match &result {
            Ok(()) => info!(label = %self.config.target, "IBAZEL BUILD SUCCESS"),
            Err(e) => error!(label = %self.config.target, error = %e, "IBAZEL BUILD FAILURE"),
        }

        send(&mut running.stdin, ProtocolMessage::completed(result.is_ok())).await;
        output
    }

    async fn terminate_inner(&mut self) {
        let Some(Running { group, stdin }) = self.running.take() else {
            return;
        };
        shutdown_group(group, self.config.termination).await;
        drop(stdin);
    }
}

/// Best-effort write of one protocol line; failures are logged only.
async fn send(stdin: &mut StdinHandle, message: ProtocolMessage) {
    let line = message.as_line();
    let written = match stdin.write_all(line.as_bytes()).await {
        Ok(()) => stdin.flush().await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        error!(%message, error = %e, "error writing notification to stdin");
    }
}

impl Command for NotifyCommand {
    fn start(&mut self) -> BoxFuture<'_, Result<OutputBuffer, StartupFailure>> {
        Box::pin(self.start_inner())
    }

    fn terminate(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(self.terminate_inner())
    }

    fn notify_of_changes(&mut self) -> BoxFuture<'_, OutputBuffer> {
        Box::pin(self.notify_inner())
    }

    fn is_subprocess_running(&mut self) -> bool {
        group_running(self.running.as_mut().map(|r| &mut r.group))
    }
}
