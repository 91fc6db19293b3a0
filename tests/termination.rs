// tests/termination.rs

mod common;
use crate::common::builders::SupervisorConfigBuilder;
use crate::common::{Call, FakeHarness, init_tracing, with_timeout};

use change_supervisor::command::{Command, new_command};
use change_supervisor::types::{NotifyMode, SupervisorState, TerminationPolicy};

fn command(harness: &FakeHarness, mode: NotifyMode, policy: TerminationPolicy) -> Box<dyn Command> {
    new_command(
        mode,
        SupervisorConfigBuilder::default().termination(policy).build(),
        harness.builder_factory(),
        harness.group_factory(),
    )
}

const MODES: [NotifyMode; 2] = [NotifyMode::Notify, NotifyMode::Signal];

#[tokio::test]
async fn forced_termination_kills_waits_and_closes() {
    init_tracing();
    for mode in MODES {
        let harness = FakeHarness::new();
        let mut cmd = command(&harness, mode, TerminationPolicy::Forced);
        cmd.start().await.unwrap();
        harness.log.clear();

        with_timeout(cmd.terminate()).await;

        assert_eq!(
            harness.log.calls(),
            vec![Call::Kill, Call::Wait, Call::Close],
            "mode {mode:?}"
        );
        assert_eq!(cmd.state(), SupervisorState::NotRunning);
    }
}

#[tokio::test]
async fn graceful_termination_terminates_waits_and_closes() {
    for mode in MODES {
        let harness = FakeHarness::new();
        let mut cmd = command(&harness, mode, TerminationPolicy::Graceful);
        cmd.start().await.unwrap();
        harness.log.clear();

        cmd.terminate().await;

        assert_eq!(
            harness.log.calls(),
            vec![Call::Terminate, Call::Wait, Call::Close],
            "mode {mode:?}"
        );
        assert!(!cmd.is_subprocess_running());
    }
}

#[tokio::test]
async fn terminate_without_subprocess_is_a_no_op() {
    for mode in MODES {
        let harness = FakeHarness::new();
        let mut cmd = command(&harness, mode, TerminationPolicy::Forced);

        with_timeout(cmd.terminate()).await;

        assert!(harness.log.calls().is_empty(), "mode {mode:?}");
    }
}

#[tokio::test]
async fn terminate_twice_is_idempotent() {
    for mode in MODES {
        let harness = FakeHarness::new();
        let mut cmd = command(&harness, mode, TerminationPolicy::Forced);
        cmd.start().await.unwrap();

        cmd.terminate().await;
        harness.log.clear();
        with_timeout(cmd.terminate()).await;

        assert!(harness.log.calls().is_empty(), "mode {mode:?}");
        assert_eq!(cmd.state(), SupervisorState::NotRunning);
    }
}

#[tokio::test]
async fn terminate_after_self_exit_does_not_signal_or_wait() {
    init_tracing();
    for mode in MODES {
        let harness = FakeHarness::new();
        let mut cmd = command(&harness, mode, TerminationPolicy::Forced);
        cmd.start().await.unwrap();
        harness.control.simulate_exit();
        harness.log.clear();

        with_timeout(cmd.terminate()).await;

        let calls = harness.log.calls();
        assert!(!calls.contains(&Call::Kill), "mode {mode:?}");
        assert!(!calls.contains(&Call::Terminate), "mode {mode:?}");
        assert!(!calls.contains(&Call::Wait), "mode {mode:?}");

        // The handle is gone, so a second terminate touches nothing at all.
        harness.log.clear();
        cmd.terminate().await;
        assert!(harness.log.calls().is_empty(), "mode {mode:?}");
    }
}

#[tokio::test]
async fn start_after_terminate_creates_a_fresh_group() {
    for mode in MODES {
        let harness = FakeHarness::new();
        let mut cmd = command(&harness, mode, TerminationPolicy::Graceful);
        cmd.start().await.unwrap();
        cmd.terminate().await;

        cmd.start().await.unwrap();

        assert!(cmd.is_subprocess_running(), "mode {mode:?}");
        assert_eq!(
            harness
                .log
                .count(|c| matches!(c, Call::Spawn { .. })),
            2,
            "mode {mode:?}"
        );
    }
}
