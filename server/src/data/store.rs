//! File-backed snapshot store with hot reload.
//!
//! The store owns the current [`Snapshot`] and keeps it in sync with the
//! dataset file. A filesystem watcher turns changes to the file into reload
//! signals; a single background worker rebuilds a complete snapshot from the
//! file and publishes it with one atomic pointer swap.
//!
//! # Design
//!
//! - Readers call [`SnapshotStore::current`], a lock-free load of an
//!   `Arc<Snapshot>`. They never wait on a reload and never see a partially
//!   built snapshot.
//! - Reload signals are a `Notify` permit. Signals that arrive while a rebuild
//!   is running collapse into one follow-up rebuild; two rebuilds never overlap.
//! - A rebuild that fails (unreadable file, parse error, dangling team member)
//!   is logged and discarded. The previously published snapshot stays in place.
//! - The parent directory is watched rather than the file itself, so editors
//!   that save by writing a new file and renaming it over the old one are seen.
//!
//! # Lifecycle
//!
//! `open` -> running -> `close`/`shutdown` (also on drop). After closing, no
//! new reload starts and `current` keeps returning the last snapshot.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use ed25519_dalek::VerifyingKey;
use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;

use super::{DataError, DataRepository, Snapshot};

/// Delay between a reload signal and reading the file, so that the events of
/// a single save are handled by one rebuild.
pub const RELOAD_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Outcome counters of background reloads, observable via
/// [`SnapshotStore::reload_reports`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
    /// Number of snapshots published after the initial load.
    pub generation: u64,
    /// Number of rejected reloads.
    pub failures: u64,
    /// Error of the most recent reload, cleared by the next successful one.
    pub last_error: Option<String>,
}

/// Hot-reloading owner of the current dataset snapshot.
pub struct SnapshotStore {
    path: PathBuf,
    current: Arc<ArcSwap<Snapshot>>,
    reload: Arc<Notify>,
    stop: Arc<Notify>,
    stopped: AtomicBool,
    reports: watch::Receiver<ReloadReport>,
    watcher: Mutex<Option<RecommendedWatcher>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SnapshotStore {
    /// Load the dataset at `path` and start watching it.
    ///
    /// # Pre-conditions
    /// - Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns `DataError` if the file cannot be read or does not form a valid
    /// snapshot, or if the watcher cannot be started. No store exists in that case.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DataError> {
        let path = path.into();
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DataError::Watch(format!("no tokio runtime: {e}")))?;

        // Watch before the first read so an edit landing during `open` still
        // leaves a reload permit behind.
        let reload = Arc::new(Notify::new());
        let watcher = watch_file(&path, Arc::clone(&reload))?;

        let snapshot = Snapshot::load(&path)?;
        tracing::info!(
            path = %path.display(),
            users = snapshot.user_count(),
            teams = snapshot.team_count(),
            "loaded dataset"
        );
        tracing::debug!(team_ids = ?snapshot.team_ids(), "dataset teams");

        let current = Arc::new(ArcSwap::from_pointee(snapshot));
        let stop = Arc::new(Notify::new());
        let (reports_tx, reports_rx) = watch::channel(ReloadReport::default());

        let worker = ReloadWorker {
            path: path.clone(),
            current: Arc::clone(&current),
            reload: Arc::clone(&reload),
            stop: Arc::clone(&stop),
            reports: reports_tx,
        };
        let handle = runtime.spawn(worker.run());

        Ok(Self {
            path,
            current,
            reload,
            stop,
            stopped: AtomicBool::new(false),
            reports: reports_rx,
            watcher: Mutex::new(Some(watcher)),
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Path of the watched dataset file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The most recently published snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Ask the worker to rebuild the snapshot from the file.
    ///
    /// Has no effect once the store is closed.
    pub fn request_reload(&self) {
        if !self.stopped.load(Ordering::Acquire) {
            self.reload.notify_one();
        }
    }

    /// Subscribe to reload outcomes.
    #[must_use]
    pub fn reload_reports(&self) -> watch::Receiver<ReloadReport> {
        self.reports.clone()
    }

    /// Whether the reload worker is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .map(|worker| worker.as_ref().is_some_and(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }

    /// Stop watching the file and signal the worker to exit.
    ///
    /// Idempotent. A rebuild already in progress completes; no new one starts.
    pub fn close(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Ok(mut watcher) = self.watcher.lock() {
            watcher.take();
        }
        self.stop.notify_one();
        tracing::debug!(path = %self.path.display(), "closing snapshot store");
    }

    /// Close the store and wait for the worker to exit.
    pub async fn shutdown(&self) {
        self.close();
        let handle = self.worker.lock().ok().and_then(|mut worker| worker.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "snapshot reload worker failed");
            }
        }
    }
}

impl Drop for SnapshotStore {
    fn drop(&mut self) {
        self.close();
    }
}

impl DataRepository for SnapshotStore {
    fn user_exists(&self, username: &str) -> bool {
        self.current.load().contains_user(username)
    }

    fn user_public_key(&self, username: &str) -> Option<VerifyingKey> {
        self.current.load().public_key(username).copied()
    }

    fn team_members(&self, team_id: &str) -> Option<Vec<String>> {
        self.current
            .load()
            .team_members(team_id)
            .map(<[String]>::to_vec)
    }
}

/// Background task that rebuilds and publishes snapshots.
struct ReloadWorker {
    path: PathBuf,
    current: Arc<ArcSwap<Snapshot>>,
    reload: Arc<Notify>,
    stop: Arc<Notify>,
    reports: watch::Sender<ReloadReport>,
}

impl ReloadWorker {
    async fn run(self) {
        loop {
            tokio::select! {
                biased;
                () = self.stop.notified() => break,
                () = self.reload.notified() => {}
            }

            tokio::select! {
                biased;
                () = self.stop.notified() => break,
                () = tokio::time::sleep(RELOAD_SETTLE_DELAY) => {}
            }

            self.reload_once().await;
        }
        tracing::debug!(path = %self.path.display(), "snapshot reload worker stopped");
    }

    async fn reload_once(&self) {
        match Snapshot::load_async(&self.path).await {
            Ok(snapshot) => {
                let users = snapshot.user_count();
                let teams = snapshot.team_count();
                self.current.store(Arc::new(snapshot));

                self.reports.send_modify(|report| {
                    report.generation += 1;
                    report.last_error = None;
                });
                let generation = self.reports.borrow().generation;
                tracing::info!(
                    path = %self.path.display(),
                    generation,
                    users,
                    teams,
                    "published reloaded dataset"
                );
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "rejected dataset reload, keeping previous snapshot"
                );
                self.reports.send_modify(|report| {
                    report.failures += 1;
                    report.last_error = Some(e.to_string());
                });
            }
        }
    }
}

/// Watch the directory containing `path` and signal `reload` whenever the
/// file is created, written, renamed over or removed.
fn watch_file(path: &Path, reload: Arc<Notify>) -> Result<RecommendedWatcher, DataError> {
    let file_name: OsString = path
        .file_name()
        .ok_or_else(|| DataError::Watch(format!("{} does not name a file", path.display())))?
        .to_os_string();
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
        match result {
            Ok(event) => {
                let touches_file = event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(file_name.as_os_str()));
                if touches_file && is_content_change(event.kind) {
                    reload.notify_one();
                }
            }
            Err(e) => tracing::warn!(error = %e, "dataset watch error"),
        }
    })
    .map_err(|e| DataError::Watch(e.to_string()))?;

    watcher
        .watch(&directory, RecursiveMode::NonRecursive)
        .map_err(|e| DataError::Watch(e.to_string()))?;

    Ok(watcher)
}

// Reading the file during a rebuild produces access events; those must not
// schedule another rebuild.
fn is_content_change(kind: EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(_)
            | EventKind::Remove(_)
            | EventKind::Access(AccessKind::Close(AccessMode::Write))
    )
}
