use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use change_supervisor::builder::{BuildFailure, BuildResult, Builder, BuilderFactory, OutputBuffer};
use change_supervisor::process_group::{ProcessGroup, ProcessGroupFactory, RootProcess, StdinHandle};
use change_supervisor::types::BoxFuture;
use tokio::io::AsyncWrite;
use tracing::debug;

/// Program path returned by [`FakeBuilder::prepare_run`] unless overridden.
pub const FAKE_PROGRAM: &str = "/fake/bin/app";

/// Everything the supervisor asked its collaborators to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    PrepareRun {
        target: String,
        startup_args: Vec<String>,
        args: Vec<String>,
    },
    Build {
        target: String,
        startup_args: Vec<String>,
        args: Vec<String>,
    },
    Spawn {
        program: PathBuf,
        args: Vec<String>,
    },
    PipeStdin,
    SetEnv,
    Start,
    Kill,
    Terminate,
    Wait,
    Close,
    RefreshSignal,
}

impl Call {
    pub fn is_build(&self) -> bool {
        matches!(self, Call::Build { .. })
    }

    pub fn is_prepare_run(&self) -> bool {
        matches!(self, Call::PrepareRun { .. })
    }
}

/// Shared, ordered record of [`Call`]s.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: Call) {
        debug!(?call, "fake collaborator call");
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn contains(&self, call: &Call) -> bool {
        self.0.lock().unwrap().contains(call)
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder factory whose builds succeed unless told otherwise.
#[derive(Debug, Clone)]
pub struct FakeBuilderFactory {
    log: CallLog,
    results: Arc<Mutex<VecDeque<BuildResult<()>>>>,
    prepare_failure: Arc<Mutex<Option<BuildFailure>>>,
    program: PathBuf,
}

impl FakeBuilderFactory {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            results: Arc::new(Mutex::new(VecDeque::new())),
            prepare_failure: Arc::new(Mutex::new(None)),
            program: PathBuf::from(FAKE_PROGRAM),
        }
    }

    /// Program handed back by `prepare_run`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Queue the result of the next `build`; an empty queue means success.
    pub fn push_build_result(&self, result: BuildResult<()>) {
        self.results.lock().unwrap().push_back(result);
    }

    /// Make every following `prepare_run` fail with `failure`.
    pub fn fail_prepare_run(&self, failure: BuildFailure) {
        *self.prepare_failure.lock().unwrap() = Some(failure);
    }
}

impl BuilderFactory for FakeBuilderFactory {
    fn new_builder(&self) -> Box<dyn Builder> {
        Box::new(FakeBuilder {
            factory: self.clone(),
            startup_args: Vec::new(),
            args: Vec::new(),
        })
    }
}

#[derive(Debug)]
pub struct FakeBuilder {
    factory: FakeBuilderFactory,
    startup_args: Vec<String>,
    args: Vec<String>,
}

impl Builder for FakeBuilder {
    fn set_startup_args(&mut self, args: Vec<String>) {
        self.startup_args = args;
    }

    fn set_arguments(&mut self, args: Vec<String>) {
        self.args = args;
    }

    fn write_to_stdout(&mut self, _enabled: bool) {}

    fn write_to_stderr(&mut self, _enabled: bool) {}

    fn build<'a>(&'a mut self, target: &'a str) -> BoxFuture<'a, (OutputBuffer, BuildResult<()>)> {
        Box::pin(async move {
            self.factory.log.push(Call::Build {
                target: target.to_string(),
                startup_args: self.startup_args.clone(),
                args: self.args.clone(),
            });
            let result = self
                .factory
                .results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()));
            (format!("building {target}\n").into_bytes(), result)
        })
    }

    fn prepare_run<'a>(
        &'a mut self,
        target: &'a str,
    ) -> BoxFuture<'a, (OutputBuffer, BuildResult<PathBuf>)> {
        Box::pin(async move {
            self.factory.log.push(Call::PrepareRun {
                target: target.to_string(),
                startup_args: self.startup_args.clone(),
                args: self.args.clone(),
            });
            let output = format!("preparing {target}\n").into_bytes();
            match self.factory.prepare_failure.lock().unwrap().clone() {
                Some(failure) => (output, Err(failure)),
                None => (output, Ok(self.factory.program.clone())),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Process group
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ControlState {
    alive: bool,
    fail_start: bool,
    fail_pipe: bool,
    withhold_stdin: bool,
    stdin_broken: bool,
    fail_wait: bool,
    env: Vec<(String, String)>,
    stdin: Vec<u8>,
}

/// Test-side knobs and observations for the fake process group.
///
/// A supervisor owns at most one group at a time, so one shared state is
/// enough to describe "the" subprocess.
#[derive(Debug, Clone, Default)]
pub struct FakeControl(Arc<Mutex<ControlState>>);

impl FakeControl {
    /// The subprocess exits on its own.
    pub fn simulate_exit(&self) {
        self.0.lock().unwrap().alive = false;
    }

    pub fn is_alive(&self) -> bool {
        self.0.lock().unwrap().alive
    }

    /// Every following `start` fails.
    pub fn fail_start(&self, fail: bool) {
        self.0.lock().unwrap().fail_start = fail;
    }

    /// Requesting a stdin pipe fails.
    pub fn fail_stdin_pipe(&self, fail: bool) {
        self.0.lock().unwrap().fail_pipe = fail;
    }

    /// The pipe can be requested but never handed out after start.
    pub fn withhold_stdin(&self, withhold: bool) {
        self.0.lock().unwrap().withhold_stdin = withhold;
    }

    /// Writes to the subprocess's stdin fail (e.g. it closed the pipe).
    pub fn break_stdin(&self, broken: bool) {
        self.0.lock().unwrap().stdin_broken = broken;
    }

    /// `wait` reports an error (the group is still considered gone).
    pub fn fail_wait(&self, fail: bool) {
        self.0.lock().unwrap().fail_wait = fail;
    }

    /// Environment of the most recently configured root process.
    pub fn env(&self) -> Vec<(String, String)> {
        self.0.lock().unwrap().env.clone()
    }

    pub fn env_var(&self, key: &str) -> Option<String> {
        self.env()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Everything written to stdin so far, across all groups.
    pub fn stdin_text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap().stdin).into_owned()
    }

    pub fn stdin_lines(&self) -> Vec<String> {
        self.stdin_text().lines().map(str::to_string).collect()
    }
}

#[derive(Debug, Clone)]
pub struct FakeProcessGroupFactory {
    log: CallLog,
    control: FakeControl,
}

impl FakeProcessGroupFactory {
    pub fn new(log: CallLog, control: FakeControl) -> Self {
        Self { log, control }
    }
}

impl ProcessGroupFactory for FakeProcessGroupFactory {
    fn command(&self, program: &Path, args: &[String]) -> Box<dyn ProcessGroup> {
        self.log.push(Call::Spawn {
            program: program.to_path_buf(),
            args: args.to_vec(),
        });
        Box::new(FakeProcessGroup {
            log: self.log.clone(),
            control: self.control.clone(),
            piped: false,
            started: false,
        })
    }
}

#[derive(Debug)]
pub struct FakeProcessGroup {
    log: CallLog,
    control: FakeControl,
    piped: bool,
    started: bool,
}

impl RootProcess for FakeProcessGroup {
    fn is_running(&mut self) -> bool {
        self.started && self.control.is_alive()
    }

    fn set_env(&mut self, vars: Vec<(String, String)>) {
        self.log.push(Call::SetEnv);
        self.control.0.lock().unwrap().env = vars;
    }

    fn pipe_stdin(&mut self) -> io::Result<()> {
        self.log.push(Call::PipeStdin);
        if self.control.0.lock().unwrap().fail_pipe {
            return Err(io::Error::other("fake: no stdin pipe"));
        }
        self.piped = true;
        Ok(())
    }

    fn take_stdin(&mut self) -> Option<StdinHandle> {
        if !self.piped || !self.started || self.control.0.lock().unwrap().withhold_stdin {
            return None;
        }
        Some(Box::new(RecordingStdin {
            control: self.control.clone(),
        }))
    }
}

impl ProcessGroup for FakeProcessGroup {
    fn root_process(&mut self) -> &mut dyn RootProcess {
        self
    }

    fn start(&mut self) -> io::Result<()> {
        self.log.push(Call::Start);
        let mut state = self.control.0.lock().unwrap();
        if state.fail_start {
            return Err(io::Error::new(io::ErrorKind::NotFound, "fake: spawn failed"));
        }
        state.alive = true;
        self.started = true;
        Ok(())
    }

    fn kill(&mut self) -> io::Result<()> {
        self.log.push(Call::Kill);
        self.control.simulate_exit();
        Ok(())
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.log.push(Call::Terminate);
        self.control.simulate_exit();
        Ok(())
    }

    fn wait(&mut self) -> BoxFuture<'_, io::Result<()>> {
        self.log.push(Call::Wait);
        let fail = self.control.0.lock().unwrap().fail_wait;
        Box::pin(async move {
            if fail {
                Err(io::Error::other("fake: wait failed"))
            } else {
                Ok(())
            }
        })
    }

    fn close(&mut self) {
        self.log.push(Call::Close);
    }

    fn refresh_signal(&mut self) -> io::Result<()> {
        self.log.push(Call::RefreshSignal);
        Ok(())
    }
}

/// Stdin stand-in that appends to [`FakeControl`]'s buffer, or fails with
/// `BrokenPipe` once [`FakeControl::break_stdin`] is set.
#[derive(Debug)]
pub struct RecordingStdin {
    control: FakeControl,
}

impl AsyncWrite for RecordingStdin {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.control.0.lock().unwrap();
        if state.stdin_broken {
            return Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        state.stdin.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// A call log, builder factory, process-group factory and control wired
/// together.
#[derive(Debug, Clone)]
pub struct FakeHarness {
    pub log: CallLog,
    pub control: FakeControl,
    pub builders: FakeBuilderFactory,
    pub groups: FakeProcessGroupFactory,
}

impl FakeHarness {
    pub fn new() -> Self {
        let log = CallLog::new();
        let control = FakeControl::default();
        Self {
            builders: FakeBuilderFactory::new(log.clone()),
            groups: FakeProcessGroupFactory::new(log.clone(), control.clone()),
            log,
            control,
        }
    }

    pub fn builder_factory(&self) -> Arc<dyn BuilderFactory> {
        Arc::new(self.builders.clone())
    }

    pub fn group_factory(&self) -> Arc<dyn ProcessGroupFactory> {
        Arc::new(self.groups.clone())
    }
}

impl Default for FakeHarness {
    fn default() -> Self {
        Self::new()
    }
}
