// src/lib.rs

pub mod builder;
pub mod cli;
pub mod command;
pub mod config;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod process_group;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
#[cfg(unix)]
use std::sync::Arc;
#[cfg(unix)]
use std::time::Duration;

use anyhow::Result;
#[cfg(unix)]
use tokio::sync::mpsc;
use tracing::debug;
#[cfg(unix)]
use tracing::info;

use crate::cli::CliArgs;
use crate::config::ConfigFile;
use crate::config::loader::load_and_validate;
#[cfg(unix)]
use crate::{
    builder::BazelBuilderFactory,
    command::new_command,
    engine::{Runtime, SupervisorEvent},
    process_group::UnixProcessGroupFactory,
    watch::{WatchFilter, spawn_watcher},
};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (+ CLI overrides)
/// - the builder and process-group collaborators
/// - the supervisor for the configured mode
/// - (optional) file watcher
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?.with_overrides(
        args.target.clone(),
        args.mode,
        args.kill,
    );

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    run_supervisor(&args, &config_path, cfg).await
}

#[cfg(unix)]
async fn run_supervisor(args: &CliArgs, config_path: &Path, cfg: ConfigFile) -> Result<()> {
    let builders = Arc::new(BazelBuilderFactory::new(&cfg.builder_section().bazel)?);
    let groups = Arc::new(UnixProcessGroupFactory);
    let command = new_command(cfg.mode(), cfg.supervisor_config(), builders, groups);

    let (tx, rx) = mpsc::channel::<SupervisorEvent>(64);

    // Optional file watcher (disabled in --once mode).
    let _watcher_handle = if !args.once {
        let watch = cfg.watch_section();
        let root = watch
            .root
            .clone()
            .unwrap_or_else(|| config_root_dir(config_path));
        Some(spawn_watcher(
            root,
            WatchFilter::from_section(watch)?,
            Duration::from_millis(watch.debounce_ms),
            tx.clone(),
        )?)
    } else {
        None
    };

    // Ctrl-C → graceful shutdown.
    {
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(SupervisorEvent::ShutdownRequested).await;
        });
    }

    info!(
        label = %cfg.supervisor_section().target,
        mode = ?cfg.mode(),
        "supervising target"
    );

    Runtime::new(command, rx).run().await;
    Ok(())
}

#[cfg(not(unix))]
async fn run_supervisor(_args: &CliArgs, _config_path: &Path, _cfg: ConfigFile) -> Result<()> {
    anyhow::bail!("process groups are only supported on Unix platforms")
}

/// Figure out a sensible project root for watching.
///
/// - If the config path has a non-empty parent (e.g. "configs/Supervisor.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Supervisor.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Simple dry-run output: print the effective settings.
fn print_dry_run(cfg: &ConfigFile) {
    let sup = cfg.supervisor_section();
    let watch = cfg.watch_section();

    println!("change-supervisor dry-run");
    println!("  supervisor.target = {}", sup.target);
    println!("  supervisor.mode = {:?}", sup.mode);
    println!("  supervisor.termination = {:?}", sup.termination);
    if !sup.startup_args.is_empty() {
        println!("  supervisor.startup_args = {:?}", sup.startup_args);
    }
    if !sup.build_args.is_empty() {
        println!("  supervisor.build_args = {:?}", sup.build_args);
    }
    if !sup.program_args.is_empty() {
        println!("  supervisor.program_args = {:?}", sup.program_args);
    }
    println!("  builder.bazel = {}", cfg.builder_section().bazel.display());
    println!();

    println!("watch:");
    if let Some(ref root) = watch.root {
        println!("  root: {}", root.display());
    }
    println!("  patterns: {:?}", watch.patterns);
    if !watch.exclude.is_empty() {
        println!("  exclude: {:?}", watch.exclude);
    }
    println!("  debounce_ms: {}", watch.debounce_ms);

    debug!("dry-run complete (no execution)");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_root_uses_parent_dir() {
        assert_eq!(
            config_root_dir(Path::new("configs/Supervisor.toml")),
            PathBuf::from("configs")
        );
    }

    #[test]
    fn bare_config_name_falls_back_to_cwd() {
        let root = config_root_dir(Path::new("Supervisor.toml"));
        assert!(!root.as_os_str().is_empty());
    }
}
