#![allow(dead_code)]

use change_supervisor::command::SupervisorConfig;
use change_supervisor::types::TerminationPolicy;

/// Builder for `SupervisorConfig` to simplify test setup.
pub struct SupervisorConfigBuilder {
    config: SupervisorConfig,
}

impl SupervisorConfigBuilder {
    pub fn new(target: &str) -> Self {
        Self {
            config: SupervisorConfig::new(target),
        }
    }

    pub fn startup_arg(mut self, arg: &str) -> Self {
        self.config.startup_args.push(arg.to_string());
        self
    }

    pub fn build_arg(mut self, arg: &str) -> Self {
        self.config.build_args.push(arg.to_string());
        self
    }

    pub fn program_arg(mut self, arg: &str) -> Self {
        self.config.program_args.push(arg.to_string());
        self
    }

    pub fn termination(mut self, policy: TerminationPolicy) -> Self {
        self.config.termination = policy;
        self
    }

    pub fn forced(self) -> Self {
        self.termination(TerminationPolicy::Forced)
    }

    pub fn build(self) -> SupervisorConfig {
        self.config
    }
}

impl Default for SupervisorConfigBuilder {
    fn default() -> Self {
        Self::new("//:app")
    }
}
