// src/watch/watcher.rs

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::engine::SupervisorEvent;
use crate::watch::patterns::{WatchFilter, relative_str};

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. Dropping this handle
/// stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `root` recursively and send one `SupervisorEvent::ChangesDetected`
/// per burst of matching changes.
///
/// A burst ends once no further matching event has arrived for `debounce`.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    filter: WatchFilter,
    debounce: Duration,
    events_tx: mpsc::Sender<SupervisorEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("change-supervisor: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("change-supervisor: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!("file watcher started on {:?}", root);

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let mut changed = matching_paths(&root, &filter, event);
            if changed.is_empty() {
                continue;
            }

            collect_burst(&mut event_rx, &root, &filter, debounce, &mut changed).await;

            let paths: Vec<String> = changed.into_iter().collect();
            debug!(?paths, "changes detected");
            if events_tx
                .send(SupervisorEvent::ChangesDetected { paths })
                .await
                .is_err()
            {
                break;
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}

/// Absorb events into `changed` until `debounce` has passed without a
/// matching one. Filtered-out events do not extend the burst.
async fn collect_burst(
    event_rx: &mut mpsc::UnboundedReceiver<Event>,
    root: &Path,
    filter: &WatchFilter,
    debounce: Duration,
    changed: &mut BTreeSet<String>,
) {
    let mut deadline = Instant::now() + debounce;
    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return,
            next = event_rx.recv() => match next {
                Some(event) => {
                    let matched = matching_paths(root, filter, event);
                    if !matched.is_empty() {
                        changed.extend(matched);
                        deadline = Instant::now() + debounce;
                    }
                }
                None => return,
            },
        }
    }
}

/// Relative paths in `event` that pass `filter`. Access events are ignored.
fn matching_paths(root: &Path, filter: &WatchFilter, event: Event) -> BTreeSet<String> {
    if matches!(event.kind, EventKind::Access(_)) {
        return BTreeSet::new();
    }
    event
        .paths
        .iter()
        .filter_map(|path| relative_str(root, path))
        .filter(|rel| filter.matches(rel))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind};

    fn filter() -> WatchFilter {
        WatchFilter::new(&["src/**".to_string()], &["**/*.tmp".to_string()]).unwrap()
    }

    #[test]
    fn only_matching_paths_are_kept() {
        let root = PathBuf::from("/project");
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/project/src/a.rs"))
            .add_path(PathBuf::from("/project/src/b.tmp"))
            .add_path(PathBuf::from("/project/README.md"));

        let paths = matching_paths(&root, &filter(), event);
        assert_eq!(paths.into_iter().collect::<Vec<_>>(), vec!["src/a.rs"]);
    }

    #[test]
    fn access_events_are_ignored() {
        let root = PathBuf::from("/project");
        let event = Event::new(EventKind::Access(AccessKind::Any))
            .add_path(PathBuf::from("/project/src/a.rs"));
        assert!(matching_paths(&root, &filter(), event).is_empty());
    }

    fn modify(path: &str) -> Event {
        Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from(path))
    }

    #[tokio::test]
    async fn unrelated_churn_does_not_hold_back_a_burst() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let noise = tokio::spawn(async move {
            for _ in 0..100 {
                if tx.send(modify("/project/out/noise.txt")).is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        });

        let mut changed = BTreeSet::from(["src/a.rs".to_string()]);
        let root = PathBuf::from("/project");
        tokio::time::timeout(
            Duration::from_millis(800),
            collect_burst(&mut rx, &root, &filter(), Duration::from_millis(100), &mut changed),
        )
        .await
        .expect("burst should end while only unrelated paths change");

        assert_eq!(changed.into_iter().collect::<Vec<_>>(), vec!["src/a.rs"]);
        noise.abort();
    }

    #[tokio::test]
    async fn matching_events_extend_the_burst() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let _ = tx.send(modify("/project/src/b.rs"));
            // Keep the channel open past the debounce window.
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        let mut changed = BTreeSet::from(["src/a.rs".to_string()]);
        let root = PathBuf::from("/project");
        collect_burst(&mut rx, &root, &filter(), Duration::from_millis(100), &mut changed).await;

        assert_eq!(
            changed.into_iter().collect::<Vec<_>>(),
            vec!["src/a.rs", "src/b.rs"]
        );
    }
}
