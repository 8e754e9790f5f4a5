use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};

const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_millis(800);

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub event_tx: broadcast::Sender<()>,
    /// Held across a webhook's load/build/save of the desired-state
    /// repository. Each request works on its own on-disk snapshot, so
    /// unserialized saves could drop a concurrent request's tag write.
    pub build_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(root: PathBuf) -> Self {
        Self::with_watch_interval(root, DEFAULT_WATCH_INTERVAL)
    }

    /// Same as [`AppState::new`] with the records-watcher poll interval
    /// exposed, for tests that cannot wait out the default.
    pub fn with_watch_interval(root: PathBuf, interval: Duration) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        let state = Self {
            root,
            event_tx: event_tx.clone(),
            build_lock: Arc::new(Mutex::new(())),
        };

        // Only spawn inside a runtime; sync unit tests construct AppState
        // without one.
        if tokio::runtime::Handle::try_current().is_ok() {
            let records_file = convoy_core::paths::records_path(&state.root);
            tokio::spawn(watch_records(records_file, event_tx, interval));
        }

        state
    }
}

/// Poll the records file's mtime and broadcast on change. Catches
/// webhook-driven builds and external CLI activity alike.
async fn watch_records(path: PathBuf, tx: broadcast::Sender<()>, interval: Duration) {
    let mut last_mtime = None;
    loop {
        tokio::time::sleep(interval).await;
        let Ok(meta) = tokio::fs::metadata(&path).await else {
            continue;
        };
        let Ok(mtime) = meta.modified() else {
            continue;
        };
        if last_mtime != Some(mtime) {
            last_mtime = Some(mtime);
            let _ = tx.send(());
        }
    }
}
