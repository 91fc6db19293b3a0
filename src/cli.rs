// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::NotifyMode;

/// Command-line arguments for `change-supervisor`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "change-supervisor",
    version,
    about = "Keep a built program running and tell it about every rebuild.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Supervisor.toml")]
    pub config: String,

    /// Build target to supervise; overrides `[supervisor].target`.
    #[arg(long, value_name = "LABEL")]
    pub target: Option<String>,

    /// Notification channel: `notify` (stdin protocol) or `signal` (SIGHUP).
    #[arg(long, value_name = "MODE")]
    pub mode: Option<NotifyMode>,

    /// Kill the process group instead of terminating it gracefully.
    #[arg(long)]
    pub kill: bool,

    /// Start the program and keep it running until Ctrl-C, without watching.
    #[arg(long)]
    pub once: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CHANGE_SUPERVISOR_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the effective settings, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
