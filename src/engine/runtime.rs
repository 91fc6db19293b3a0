// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::command::Command;

use super::SupervisorEvent;

/// Owns a supervisor and feeds it `SupervisorEvent`s.
///
/// Lifecycle:
/// - `start` once when `run` begins (a failure is logged; the next change
///   retries through `notify_of_changes`),
/// - `notify_of_changes` per `ChangesDetected`,
/// - `terminate` on `ShutdownRequested` or when every sender is gone.
pub struct Runtime {
    command: Box<dyn Command>,
    event_rx: mpsc::Receiver<SupervisorEvent>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime").finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(command: Box<dyn Command>, event_rx: mpsc::Receiver<SupervisorEvent>) -> Self {
        Self { command, event_rx }
    }

    /// Main event loop. Returns the supervisor after it has been terminated.
    pub async fn run(mut self) -> Box<dyn Command> {
        info!("supervisor runtime started");

        match self.command.start().await {
            Ok(output) => debug!(output_bytes = output.len(), "initial start complete"),
            Err(failure) => error!(
                error = %failure,
                output_bytes = failure.output.len(),
                "initial start failed; waiting for changes"
            ),
        }

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            match event {
                SupervisorEvent::ChangesDetected { paths } => {
                    info!(changed = paths.len(), "changes detected; notifying supervisor");
                    let output = self.command.notify_of_changes().await;
                    debug!(output_bytes = output.len(), "notification cycle complete");
                }
                SupervisorEvent::ShutdownRequested => {
                    info!("shutdown requested");
                    break;
                }
            }
        }

        self.command.terminate().await;
        info!("runtime exiting");
        self.command
    }
}
