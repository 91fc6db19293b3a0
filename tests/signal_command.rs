// tests/signal_command.rs

mod common;
use crate::common::builders::SupervisorConfigBuilder;
use crate::common::{Call, FakeHarness, init_tracing, signal_command, with_timeout};

use change_supervisor::builder::BuildFailure;
use change_supervisor::command::{Command, NOTIFY_CHANGES_ENV, SIGNAL_CHANGES_ENV};
use change_supervisor::errors::StartupError;

#[tokio::test]
async fn start_sets_signal_flag_without_stdin_pipe() {
    init_tracing();
    let harness = FakeHarness::new();
    let mut cmd = signal_command(&harness, SupervisorConfigBuilder::default().build());

    let output = with_timeout(cmd.start()).await.unwrap();

    assert_eq!(output, b"preparing //:app\n".to_vec());
    assert!(cmd.is_subprocess_running());
    assert!(!harness.log.contains(&Call::PipeStdin));
    assert_eq!(harness.control.env_var(SIGNAL_CHANGES_ENV).as_deref(), Some("y"));
    assert_eq!(harness.control.env_var(NOTIFY_CHANGES_ENV), None);
}

#[tokio::test]
async fn one_refresh_signal_per_cycle_regardless_of_outcome() {
    init_tracing();
    let harness = FakeHarness::new();
    let mut cmd = signal_command(&harness, SupervisorConfigBuilder::default().build());
    cmd.start().await.unwrap();

    harness.builders.push_build_result(Ok(()));
    harness.builders.push_build_result(Err(BuildFailure::Exited(1)));
    harness.builders.push_build_result(Err(BuildFailure::Signalled));

    for expected in 1..=3 {
        let output = with_timeout(cmd.notify_of_changes()).await;
        assert_eq!(output, b"building //:app\n".to_vec());
        assert_eq!(harness.log.count(|c| *c == Call::RefreshSignal), expected);
        assert_eq!(harness.log.count(Call::is_build), expected);
    }

    // Nothing is ever written to the subprocess.
    assert_eq!(harness.control.stdin_text(), "");
}

#[tokio::test]
async fn signal_follows_the_build() {
    let harness = FakeHarness::new();
    let mut cmd = signal_command(&harness, SupervisorConfigBuilder::default().build());
    cmd.start().await.unwrap();
    harness.log.clear();

    cmd.notify_of_changes().await;

    let calls = harness.log.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].is_build());
    assert_eq!(calls[1], Call::RefreshSignal);
}

#[tokio::test]
async fn notify_without_subprocess_starts_and_does_not_signal() {
    let harness = FakeHarness::new();
    let mut cmd = signal_command(&harness, SupervisorConfigBuilder::default().build());

    let output = cmd.notify_of_changes().await;

    assert_eq!(output, b"preparing //:app\n".to_vec());
    assert!(cmd.is_subprocess_running());
    assert!(!harness.log.contains(&Call::RefreshSignal));
    assert_eq!(harness.log.count(Call::is_build), 0);
}

#[tokio::test]
async fn exited_subprocess_is_restarted_on_change() {
    let harness = FakeHarness::new();
    let mut cmd = signal_command(&harness, SupervisorConfigBuilder::default().build());
    cmd.start().await.unwrap();
    harness.control.simulate_exit();

    cmd.notify_of_changes().await;

    assert!(cmd.is_subprocess_running());
    assert_eq!(harness.log.count(|c| *c == Call::Start), 2);
    assert!(!harness.log.contains(&Call::RefreshSignal));
}

#[tokio::test]
async fn spawn_failure_keeps_output() {
    let harness = FakeHarness::new();
    harness.control.fail_start(true);
    let mut cmd = signal_command(&harness, SupervisorConfigBuilder::default().build());

    let failure = cmd.start().await.unwrap_err();

    assert!(matches!(failure.reason, StartupError::Spawn(_)));
    assert_eq!(failure.output, b"preparing //:app\n".to_vec());
    assert!(!cmd.is_subprocess_running());
}
