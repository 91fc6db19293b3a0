// src/command/signal.rs

//! Supervisor that tells its process about rebuilds with a signal.
//!
//! The signal carries no payload and is sent whether the build passed or
//! failed; the process is expected to look at the build results itself.

use std::sync::Arc;

use tracing::{debug, error, info};

use super::{
    Command, Launch, SIGNAL_CHANGES_ENV, SupervisorConfig, configured_builder, group_running,
    shutdown_group,
};
use crate::builder::{BuilderFactory, OutputBuffer};
use crate::errors::StartupFailure;
use crate::process_group::{ProcessGroup, ProcessGroupFactory};
use crate::types::BoxFuture;

pub struct SignalCommand {
    config: SupervisorConfig,
    builders: Arc<dyn BuilderFactory>,
    groups: Arc<dyn ProcessGroupFactory>,
    group: Option<Box<dyn ProcessGroup>>,
}

impl std::fmt::Debug for SignalCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalCommand")
            .field("config", &self.config)
            .field("group", &self.group.is_some())
            .finish_non_exhaustive()
    }
}

impl SignalCommand {
    pub fn new(
        config: SupervisorConfig,
        builders: Arc<dyn BuilderFactory>,
        groups: Arc<dyn ProcessGroupFactory>,
    ) -> Self {
        Self {
            config,
            builders,
            groups,
            group: None,
        }
    }

    async fn start_inner(&mut self) -> Result<OutputBuffer, StartupFailure> {
        self.terminate_inner().await;

        let launch = Launch {
            builders: self.builders.as_ref(),
            groups: self.groups.as_ref(),
            config: &self.config,
            env_flag: SIGNAL_CHANGES_ENV,
            pipe_stdin: false,
        };
        let (output, group) = launch.spawn().await?;
        self.group = Some(group);
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
        let (output, result) = builder.build(&self.config.target).await;
        match &result {
            Ok(()) => info!(label = %self.config.target, "IBAZEL BUILD SUCCESS"),
            Err(e) => error!(label = %self.config.target, error = %e, "IBAZEL BUILD FAILURE"),
        }

        if let Some(group) = self.group.as_mut() {
            match group.refresh_signal() {
                Ok(()) => debug!(label = %self.config.target, "refresh signal delivered"),
                Err(e) => error!(error = %e, "error sending refresh signal"),
            }
        }
        output
    }

    async fn terminate_inner(&mut self) {
        if let Some(group) = self.group.take() {
            shutdown_group(group, self.config.termination).await;
        }
    }
}

impl Command for SignalCommand {
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
        group_running(self.group.as_mut())
    }
}
