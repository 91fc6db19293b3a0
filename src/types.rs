use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::Deserialize;

/// Boxed, `Send` future used at the trait seams (builder, process group,
/// supervisor) so they stay object safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Which channel the supervised process is told about rebuilds on.
///
/// - `Notify`: line protocol on the subprocess's stdin.
/// - `Signal`: a bare OS signal after each build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyMode {
    Notify,
    Signal,
}

impl Default for NotifyMode {
    fn default() -> Self {
        NotifyMode::Notify
    }
}

impl FromStr for NotifyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "notify" => Ok(NotifyMode::Notify),
            "signal" => Ok(NotifyMode::Signal),
            other => Err(format!(
                "invalid mode: {other} (expected \"notify\" or \"signal\")"
            )),
        }
    }
}

/// How a running process group is brought down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminationPolicy {
    /// Ask the group to exit (SIGTERM on Unix).
    Graceful,
    /// Kill the group outright (SIGKILL on Unix).
    Forced,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        TerminationPolicy::Graceful
    }
}

impl FromStr for TerminationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "graceful" => Ok(TerminationPolicy::Graceful),
            "forced" => Ok(TerminationPolicy::Forced),
            other => Err(format!(
                "invalid termination: {other} (expected \"graceful\" or \"forced\")"
            )),
        }
    }
}

/// Externally observable supervisor state.
///
/// `Starting` and `Terminating` only exist while `start` / `terminate` are
/// being awaited, so callers only ever see these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    NotRunning,
    Running,
}
