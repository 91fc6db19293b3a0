// src/builder/bazel.rs

//! Production [`Builder`] backed by the `bazel` binary.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result};
use tempfile::TempDir;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{BuildFailure, BuildResult, Builder, BuilderFactory, OutputBuffer};
use crate::types::BoxFuture;

/// Creates [`BazelBuilder`]s that share one scratch directory for the run
/// scripts produced by `bazel run --script_path`.
#[derive(Debug, Clone)]
pub struct BazelBuilderFactory {
    bazel: PathBuf,
    script_dir: Arc<TempDir>,
}

impl BazelBuilderFactory {
    pub fn new(bazel: impl Into<PathBuf>) -> Result<Self> {
        let script_dir = tempfile::Builder::new()
            .prefix("change-supervisor-")
            .tempdir()
            .context("creating directory for run scripts")?;
        Ok(Self {
            bazel: bazel.into(),
            script_dir: Arc::new(script_dir),
        })
    }
}

impl BuilderFactory for BazelBuilderFactory {
    fn new_builder(&self) -> Box<dyn Builder> {
        Box::new(BazelBuilder {
            bazel: self.bazel.clone(),
            script_dir: Arc::clone(&self.script_dir),
            startup_args: Vec::new(),
            args: Vec::new(),
            echo_stdout: false,
            echo_stderr: false,
        })
    }
}

#[derive(Debug)]
pub struct BazelBuilder {
    bazel: PathBuf,
    script_dir: Arc<TempDir>,
    startup_args: Vec<String>,
    args: Vec<String>,
    echo_stdout: bool,
    echo_stderr: bool,
}

impl BazelBuilder {
    /// Full argument list for `bazel <startup> <verb> <extra> <args> <target>`.
    fn invocation(&self, verb: &str, extra: &[String], target: &str) -> Vec<String> {
        let mut argv = self.startup_args.clone();
        argv.push(verb.to_string());
        argv.extend(extra.iter().cloned());
        argv.extend(self.args.iter().cloned());
        argv.push(target.to_string());
        argv
    }

    async fn invoke(&self, argv: Vec<String>) -> (OutputBuffer, BuildResult<()>) {
        info!(bazel = %self.bazel.display(), args = ?argv, "invoking build tool");

        let mut cmd = Command::new(&self.bazel);
        cmd.args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return (Vec::new(), Err(BuildFailure::Invoke(e.to_string()))),
        };

        let mut output = OutputBuffer::new();
        let mut stdout = child.stdout.take().map(BufReader::new);
        let mut stderr = child.stderr.take().map(BufReader::new);
        let mut out_line = Vec::new();
        let mut err_line = Vec::new();

        // Interleave both streams into one buffer in arrival order. Bytes are
        // kept verbatim; the tool may print anything, not just UTF-8.
        while stdout.is_some() || stderr.is_some() {
            tokio::select! {
                read = read_line(&mut stdout, &mut out_line), if stdout.is_some() => {
                    let echo = self.echo_stdout.then_some(Echo::Stdout);
                    if !take_line(read, &mut out_line, &mut output, echo) {
                        stdout = None;
                    }
                }
                read = read_line(&mut stderr, &mut err_line), if stderr.is_some() => {
                    let echo = self.echo_stderr.then_some(Echo::Stderr);
                    if !take_line(read, &mut err_line, &mut output, echo) {
                        stderr = None;
                    }
                }
            }
        }

        let result = match child.wait().await {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => match status.code() {
                Some(code) => Err(BuildFailure::Exited(code)),
                None => Err(BuildFailure::Signalled),
            },
            Err(e) => Err(BuildFailure::Invoke(e.to_string())),
        };

        debug!(output_bytes = output.len(), ?result, "build tool finished");
        (output, result)
    }

    fn script_path(&self, target: &str) -> PathBuf {
        self.script_dir.path().join(script_file_name(target))
    }
}

impl Builder for BazelBuilder {
    fn set_startup_args(&mut self, args: Vec<String>) {
        self.startup_args = args;
    }

    fn set_arguments(&mut self, args: Vec<String>) {
        self.args = args;
    }

    fn write_to_stdout(&mut self, enabled: bool) {
        self.echo_stdout = enabled;
    }

    fn write_to_stderr(&mut self, enabled: bool) {
        self.echo_stderr = enabled;
    }

    fn build<'a>(&'a mut self, target: &'a str) -> BoxFuture<'a, (OutputBuffer, BuildResult<()>)> {
        Box::pin(async move {
            let argv = self.invocation("build", &[], target);
            self.invoke(argv).await
        })
    }

    fn prepare_run<'a>(
        &'a mut self,
        target: &'a str,
    ) -> BoxFuture<'a, (OutputBuffer, BuildResult<PathBuf>)> {
        Box::pin(async move {
            let script = self.script_path(target);
            let extra = vec![format!("--script_path={}", script.display())];
            let argv = self.invocation("run", &extra, target);
            let (output, result) = self.invoke(argv).await;
            let result = result.and_then(|()| ensure_script(&script));
            (output, result)
        })
    }
}

/// Where a captured line is echoed.
#[derive(Debug, Clone, Copy)]
enum Echo {
    Stdout,
    Stderr,
}

/// Read up to and including the next `\n` into `line`.
///
/// `read_until` keeps partial input in `line` when cancelled by `select!`,
/// so the next call picks up where this one stopped.
async fn read_line<R>(reader: &mut Option<R>, line: &mut Vec<u8>) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    match reader {
        Some(reader) => reader.read_until(b'\n', line).await,
        None => Ok(0),
    }
}

/// Move what `read_line` collected into `output`. Returns `false` once the
/// stream is finished.
fn take_line(
    read: io::Result<usize>,
    line: &mut Vec<u8>,
    output: &mut OutputBuffer,
    echo: Option<Echo>,
) -> bool {
    let open = match read {
        Ok(0) => false,
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "error reading build tool output");
            false
        }
    };
    if !line.is_empty() {
        match echo {
            Some(Echo::Stdout) => print!("{}", String::from_utf8_lossy(line)),
            Some(Echo::Stderr) => eprint!("{}", String::from_utf8_lossy(line)),
            None => {}
        }
        output.append(line);
    }
    open
}

fn ensure_script(script: &Path) -> BuildResult<PathBuf> {
    if script.is_file() {
        Ok(script.to_path_buf())
    } else {
        Err(BuildFailure::Invoke(format!(
            "build tool did not write run script {}",
            script.display()
        )))
    }
}

/// `//foo/bar:baz` -> `foo_bar_baz.sh`
fn script_file_name(target: &str) -> String {
    let stem: String = target
        .trim_start_matches('/')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{stem}.sh")
}
