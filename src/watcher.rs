//! Data directory watcher
//!
//! Watches the data directory and calls back once per burst of changes to
//! recognized data files, after the directory has been quiet for the
//! debounce window. Every accepted event restarts the window.

use crate::error::LoadError;
use crate::format::DataFile;
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use notify::event::{AccessKind, AccessMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Decides which filesystem events count as data changes
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchFilter;

impl WatchFilter {
    /// Whether `event` may have changed a data file
    ///
    /// Pure reads are ignored; a close after writing is not. Events with
    /// no paths are accepted since the watcher could not tell what changed.
    pub fn accepts(&self, event: &Event) -> bool {
        if let EventKind::Access(kind) = &event.kind {
            if *kind != AccessKind::Close(AccessMode::Write) {
                return false;
            }
        }
        event.paths.is_empty() || event.paths.iter().any(|p| is_data_file(p))
    }
}

fn is_data_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(DataFile::from_file_name)
        .is_some()
}

/// Handle to the watcher thread and shutdown channel
struct WatcherThread {
    shutdown_tx: Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Drop for WatcherThread {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.try_send(());

        if let Some(handle) = self.handle.take() {
            // The last handle may be released from inside the callback
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

/// A running directory watcher
///
/// Dropping it stops the watch and joins the debounce thread.
pub struct DataWatcher {
    dir: PathBuf,
    // Field order matters: the notify watcher is dropped before the thread
    _watcher: RecommendedWatcher,
    _thread: WatcherThread,
}

impl DataWatcher {
    /// Start watching `dir`
    ///
    /// `on_change` runs on the watcher thread once the directory has been
    /// quiet for `debounce` after the last accepted event.
    pub fn spawn<F>(dir: &Path, debounce: Duration, on_change: F) -> Result<Self, LoadError>
    where
        F: FnMut() + Send + 'static,
    {
        let canonical = dir
            .canonicalize()
            .map_err(|e| LoadError::Watch(format!("cannot watch {}: {e}", dir.display())))?;

        let (event_tx, event_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = bounded(1);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = event_tx.send(res);
            },
            Config::default(),
        )
        .map_err(|e| LoadError::Watch(format!("failed to create watcher: {e}")))?;

        watcher
            .watch(&canonical, RecursiveMode::NonRecursive)
            .map_err(|e| LoadError::Watch(format!("cannot watch {}: {e}", canonical.display())))?;

        let handle = thread::Builder::new()
            .name("geodat-watch".to_string())
            .spawn(move || debounce_loop(event_rx, shutdown_rx, debounce, WatchFilter, on_change))
            .map_err(|e| LoadError::Watch(format!("failed to spawn watcher thread: {e}")))?;

        debug!(dir = %canonical.display(), ?debounce, "watching data directory");

        Ok(DataWatcher {
            dir: canonical,
            _watcher: watcher,
            _thread: WatcherThread {
                shutdown_tx,
                handle: Some(handle),
            },
        })
    }

    /// The watched directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl std::fmt::Debug for DataWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataWatcher").field("dir", &self.dir).finish()
    }
}

fn debounce_loop<F: FnMut()>(
    events: Receiver<notify::Result<Event>>,
    shutdown: Receiver<()>,
    debounce: Duration,
    filter: WatchFilter,
    mut on_change: F,
) {
    let mut last_event: Option<Instant> = None;

    loop {
        let received = match last_event {
            None => select! {
                recv(shutdown) -> _ => return,
                recv(events) -> msg => msg,
            },
            Some(at) => {
                let remaining = (at + debounce).saturating_duration_since(Instant::now());
                select! {
                    recv(shutdown) -> _ => return,
                    recv(events) -> msg => msg,
                    default(remaining) => {
                        info!("data files changed, reloading");
                        last_event = None;
                        on_change();
                        continue;
                    }
                }
            }
        };

        match received {
            Ok(Ok(event)) => {
                if filter.accepts(&event) {
                    last_event = Some(Instant::now());
                } else {
                    debug!(kind = ?event.kind, paths = ?event.paths, "ignoring watch event");
                }
            }
            Ok(Err(e)) => warn!(error = %e, "watch error"),
            // The notify watcher is gone
            Err(_) => return,
        }
    }
}
