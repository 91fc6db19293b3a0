// src/config/validate.rs

use globset::Glob;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, SupervisorError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SupervisorError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.supervisor, raw.builder, raw.watch))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_supervisor(cfg)?;
    validate_builder(cfg)?;
    validate_watch(cfg)?;
    Ok(())
}

fn validate_supervisor(cfg: &RawConfigFile) -> Result<()> {
    // mode / termination are strongly typed and checked during deserialization.
    if cfg.supervisor.target.trim().is_empty() {
        return Err(SupervisorError::ConfigError(
            "[supervisor].target must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_builder(cfg: &RawConfigFile) -> Result<()> {
    if cfg.builder.bazel.as_os_str().is_empty() {
        return Err(SupervisorError::ConfigError(
            "[builder].bazel must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_watch(cfg: &RawConfigFile) -> Result<()> {
    if cfg.watch.patterns.is_empty() {
        return Err(SupervisorError::ConfigError(
            "[watch].patterns must contain at least one glob".to_string(),
        ));
    }

    for pattern in cfg.watch.patterns.iter().chain(cfg.watch.exclude.iter()) {
        if let Err(e) = Glob::new(pattern) {
            return Err(SupervisorError::ConfigError(format!(
                "invalid glob pattern '{}' in [watch]: {}",
                pattern, e
            )));
        }
    }

    if cfg.watch.debounce_ms == 0 {
        return Err(SupervisorError::ConfigError(
            "[watch].debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}
