//! Debounced filesystem watching for the workflows folder.
//!
//! Watches one directory, non-recursively, for `*.xml` definition files
//! and emits [`DirEvent`]s on a tokio channel. The notify debouncer runs
//! on its own thread; a seen-paths set (seeded with a directory scan)
//! classifies each debounced event as created, changed, or deleted.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, Result};

/// Default debounce window in milliseconds. Editors that save in two
/// syscalls collapse into a single event.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// A change in the workflows folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirEvent {
    /// A definition file appeared.
    Created(PathBuf),
    /// An existing definition file was modified.
    Changed(PathBuf),
    /// A definition file disappeared.
    Deleted(PathBuf),
}

impl DirEvent {
    pub fn path(&self) -> &Path {
        match self {
            DirEvent::Created(p) | DirEvent::Changed(p) | DirEvent::Deleted(p) => p,
        }
    }
}

/// Handle that keeps the watcher thread alive. Drop it to stop watching.
pub struct WatcherHandle {
    _thread: std::thread::JoinHandle<()>,
}

/// Configuration for the directory watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration in milliseconds.
    pub debounce_ms: u64,
    /// Event channel capacity.
    pub buffer_size: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            buffer_size: 64,
        }
    }
}

/// Watches the workflows folder for definition file changes.
pub struct DirWatcher {
    dir: PathBuf,
    config: WatcherConfig,
}

impl DirWatcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_config(dir, WatcherConfig::default())
    }

    pub fn with_config(dir: impl Into<PathBuf>, config: WatcherConfig) -> Self {
        Self {
            dir: dir.into(),
            config,
        }
    }

    /// Start watching and return a receiver for events.
    ///
    /// The directory is created if it doesn't exist. The watcher runs on a
    /// background thread for as long as the returned handle lives; events
    /// for the same path are delivered in arrival order.
    pub fn watch(&self) -> Result<(mpsc::Receiver<DirEvent>, WatcherHandle)> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir).map_err(|e| EngineError::WatchFailed {
                path: self.dir.clone(),
                error: e.to_string(),
            })?;
        }

        let (event_tx, event_rx) = mpsc::channel(self.config.buffer_size);
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        let mut debouncer = new_debouncer(Duration::from_millis(self.config.debounce_ms), notify_tx)
            .map_err(|e| EngineError::WatcherInit(e.to_string()))?;

        debouncer
            .watcher()
            .watch(&self.dir, RecursiveMode::NonRecursive)
            .map_err(|e| EngineError::WatchFailed {
                path: self.dir.clone(),
                error: e.to_string(),
            })?;

        let mut known = scan_definition_files(&self.dir);
        let dir = self.dir.clone();

        info!(
            "Watching {} ({} definition files, {}ms debounce)",
            dir.display(),
            known.len(),
            self.config.debounce_ms
        );

        // The notify receiver is std::sync; drain it on a plain thread and
        // bridge into the tokio channel.
        let handle = std::thread::spawn(move || {
            // Keep the debouncer alive in this thread.
            let _debouncer = debouncer;

            while let Ok(result) = notify_rx.recv() {
                let events = match result {
                    Ok(events) => events,
                    Err(e) => {
                        error!("File watcher error: {:?}", e);
                        continue;
                    }
                };

                for event in events {
                    let path = event.path;
                    if !is_definition_file(&path) || !path.starts_with(&dir) {
                        continue;
                    }

                    let dir_event = if path.exists() {
                        if known.insert(path.clone()) {
                            DirEvent::Created(path)
                        } else {
                            DirEvent::Changed(path)
                        }
                    } else {
                        known.remove(&path);
                        DirEvent::Deleted(path)
                    };

                    debug!("{:?}", dir_event);
                    if event_tx.blocking_send(dir_event).is_err() {
                        warn!("Event channel closed; watcher thread exiting");
                        return;
                    }
                }
            }

            debug!("File watcher thread exiting");
        });

        Ok((event_rx, WatcherHandle { _thread: handle }))
    }
}

/// Whether `path` names a workflow definition file.
pub(crate) fn is_definition_file(path: &Path) -> bool {
    path.extension().map(|ext| ext == "xml").unwrap_or(false)
}

/// The definition files currently present in `dir`.
fn scan_definition_files(dir: &Path) -> HashSet<PathBuf> {
    let mut files = HashSet::new();
    match std::fs::read_dir(dir) {
        Ok(entries) => {
            for entry in entries.flatten() {
                let path = entry.path();
                if is_definition_file(&path) {
                    files.insert(path);
                }
            }
        }
        Err(e) => warn!("Cannot scan {}: {}", dir.display(), e),
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_definition_file() {
        assert!(is_definition_file(Path::new("/wf/report.xml")));
        assert!(!is_definition_file(Path::new("/wf/report.XML")));
        assert!(!is_definition_file(Path::new("/wf/readme.md")));
        assert!(!is_definition_file(Path::new("/wf/noext")));
    }

    #[test]
    fn test_event_path_accessor() {
        let p = PathBuf::from("/wf/a.xml");
        assert_eq!(DirEvent::Created(p.clone()).path(), p);
        assert_eq!(DirEvent::Changed(p.clone()).path(), p);
        assert_eq!(DirEvent::Deleted(p.clone()).path(), p);
    }

    #[test]
    fn test_watch_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("workflows");

        let watcher = DirWatcher::new(&nested);
        let (_rx, _handle) = watcher.watch().unwrap();
        assert!(nested.exists());
    }

    // Integration test that exercises the real notify backend.
    #[tokio::test]
    async fn test_watcher_classifies_create_change_delete() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ignored.txt"), "not xml").unwrap();

        let watcher = DirWatcher::with_config(
            dir.path(),
            WatcherConfig {
                debounce_ms: 50,
                buffer_size: 16,
            },
        );
        let (mut rx, _handle) = watcher.watch().unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        let file = dir.path().join("wf.xml");
        std::fs::write(&file, "<workflow/>").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        match event {
            Ok(Some(DirEvent::Created(p))) => assert_eq!(p, file),
            Ok(Some(other)) => panic!("Expected Created, got {:?}", other),
            Ok(None) => panic!("Channel closed unexpectedly"),
            Err(_) => {
                // Native watching may be unavailable in CI; nothing more to
                // assert in that case.
                eprintln!("Warning: file creation not detected (may be expected in CI)");
                return;
            }
        }

        std::fs::write(&file, "<workflow id=\"1\"/>").unwrap();
        match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(DirEvent::Changed(p))) => assert_eq!(p, file),
            other => panic!("Expected Changed, got {:?}", other),
        }

        std::fs::remove_file(&file).unwrap();
        match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(DirEvent::Deleted(p))) => assert_eq!(p, file),
            other => panic!("Expected Deleted, got {:?}", other),
        }
    }
}
