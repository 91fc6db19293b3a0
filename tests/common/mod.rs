#![allow(dead_code)]

pub use change_supervisor_test_utils::builders;
pub use change_supervisor_test_utils::fakes::{Call, FakeHarness};
pub use change_supervisor_test_utils::{init_tracing, with_timeout};

use change_supervisor::command::{NotifyCommand, SignalCommand, SupervisorConfig};

pub fn notify_command(harness: &FakeHarness, config: SupervisorConfig) -> NotifyCommand {
    NotifyCommand::new(config, harness.builder_factory(), harness.group_factory())
}

pub fn signal_command(harness: &FakeHarness, config: SupervisorConfig) -> SignalCommand {
    SignalCommand::new(config, harness.builder_factory(), harness.group_factory())
}
