// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::command::SupervisorConfig;
use crate::types::{NotifyMode, TerminationPolicy};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [supervisor]
/// target = "//:app"
/// mode = "notify"
/// termination = "graceful"
/// program_args = ["--port", "8080"]
///
/// [builder]
/// bazel = "bazel"
///
/// [watch]
/// patterns = ["src/**"]
/// exclude = ["**/*.tmp"]
/// ```
///
/// Only `[supervisor].target` and `[watch].patterns` are required.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    pub supervisor: SupervisorSection,

    #[serde(default)]
    pub builder: BuilderSection,

    #[serde(default)]
    pub watch: WatchSection,
}

/// `[supervisor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorSection {
    /// Build target whose runnable is supervised, e.g. `"//:app"`.
    pub target: String,

    /// `"notify"` (stdin protocol, default) or `"signal"`.
    #[serde(default)]
    pub mode: NotifyMode,

    /// `"graceful"` (default) or `"forced"`.
    #[serde(default)]
    pub termination: TerminationPolicy,

    /// Build-tool startup options (before the command verb).
    #[serde(default)]
    pub startup_args: Vec<String>,

    /// Build-tool command options (after the verb).
    #[serde(default)]
    pub build_args: Vec<String>,

    /// Arguments handed to the running program.
    #[serde(default)]
    pub program_args: Vec<String>,
}

/// `[builder]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct BuilderSection {
    /// Build tool binary, looked up on `PATH` if not absolute.
    #[serde(default = "default_bazel")]
    pub bazel: PathBuf,
}

fn default_bazel() -> PathBuf {
    PathBuf::from("bazel")
}

impl Default for BuilderSection {
    fn default() -> Self {
        Self {
            bazel: default_bazel(),
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Directory to watch. Defaults to the directory holding the config file.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Globs (relative to `root`) whose changes trigger a rebuild.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Globs that never trigger, even if they match `patterns`.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Changes arriving within this window are collapsed into one rebuild.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    100
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            root: None,
            patterns: Vec::new(),
            exclude: Vec::new(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// Validated configuration. Build one with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    supervisor: SupervisorSection,
    builder: BuilderSection,
    watch: WatchSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        supervisor: SupervisorSection,
        builder: BuilderSection,
        watch: WatchSection,
    ) -> Self {
        Self {
            supervisor,
            builder,
            watch,
        }
    }

    pub fn supervisor_section(&self) -> &SupervisorSection {
        &self.supervisor
    }

    pub fn builder_section(&self) -> &BuilderSection {
        &self.builder
    }

    pub fn watch_section(&self) -> &WatchSection {
        &self.watch
    }

    pub fn mode(&self) -> NotifyMode {
        self.supervisor.mode
    }

    /// Apply command-line overrides on top of the file's values.
    pub fn with_overrides(
        mut self,
        target: Option<String>,
        mode: Option<NotifyMode>,
        force_kill: bool,
    ) -> Self {
        if let Some(target) = target.filter(|t| !t.trim().is_empty()) {
            self.supervisor.target = target;
        }
        if let Some(mode) = mode {
            self.supervisor.mode = mode;
        }
        if force_kill {
            self.supervisor.termination = TerminationPolicy::Forced;
        }
        self
    }

    /// Settings for the supervisor of `[supervisor].target`.
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            target: self.supervisor.target.clone(),
            startup_args: self.supervisor.startup_args.clone(),
            build_args: self.supervisor.build_args.clone(),
            program_args: self.supervisor.program_args.clone(),
            termination: self.supervisor.termination,
        }
    }
}
