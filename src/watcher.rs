//! Debounced file watching for the profile directory and active pointer.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, TryRecvError, channel};
use std::time::{Duration, Instant};

pub struct ProfileWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    debounce: Duration,
    last_event: Option<Instant>,
    pending: HashSet<PathBuf>,
}

impl std::fmt::Debug for ProfileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileWatcher")
            .field("debounce", &self.debounce)
            .field("pending", &self.pending)
            .finish()
    }
}

impl ProfileWatcher {
    /// Watch `paths` (non-recursively). Paths that do not exist yet are skipped.
    pub fn new(paths: &[PathBuf], debounce_ms: u64) -> Result<Self> {
        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )
        .context("failed to create profile watcher")?;

        for path in paths.iter().filter(|p| p.exists()) {
            watcher
                .watch(path, RecursiveMode::NonRecursive)
                .with_context(|| format!("failed to watch {}", path.display()))?;
        }

        Ok(Self {
            _watcher: watcher,
            rx,
            debounce: Duration::from_millis(debounce_ms),
            last_event: None,
            pending: HashSet::new(),
        })
    }

    /// Changed paths, once no new event has arrived for the debounce period.
    pub fn poll_changes(&mut self) -> Option<Vec<PathBuf>> {
        let mut fresh = false;
        loop {
            match self.rx.try_recv() {
                Ok(Ok(event)) => {
                    if is_relevant(&event) {
                        self.pending.extend(event.paths);
                        fresh = true;
                    }
                }
                Ok(Err(e)) => log::warn!("profile watcher: {e}"),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        if fresh {
            self.last_event = Some(Instant::now());
        }

        let settled = self
            .last_event
            .is_some_and(|t| t.elapsed() >= self.debounce);
        if settled && !self.pending.is_empty() {
            self.last_event = None;
            return Some(self.pending.drain().collect());
        }
        None
    }
}

fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
