//! File-watch collaborator registry
//!
//! The generation agent edits the project out-of-band, so a live watcher
//! reacting mid-validation could race with analysis and restore passes.
//! The registry owns one recursive watcher per directory and supports a
//! suspend/resume cycle that preserves registered change callbacks: the
//! snapshot layer closes the OS subscription around a mutation window and
//! recreates it afterwards.

use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

pub type ChangeCallback = Arc<dyn Fn(&Path) + Send + Sync>;

type CallbackList = Arc<Mutex<Vec<ChangeCallback>>>;

struct WatchEntry {
    // Dropping the watcher closes the OS subscription.
    _watcher: RecommendedWatcher,
    callbacks: CallbackList,
}

/// Process-wide map of live and suspended watchers, keyed by directory.
#[derive(Default)]
pub struct WatcherRegistry {
    active: Mutex<HashMap<PathBuf, WatchEntry>>,
    suspended: Mutex<HashMap<PathBuf, CallbackList>>,
}

impl WatcherRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Watch `dir` recursively, invoking `callback` for every changed
    /// path. Additional callbacks for an already-watched directory attach
    /// to the existing subscription.
    pub fn watch(&self, dir: &Path, callback: ChangeCallback) -> Result<()> {
        let key = dir.to_path_buf();

        {
            let active = self.active.lock().expect("watcher registry poisoned");
            if let Some(entry) = active.get(&key) {
                entry
                    .callbacks
                    .lock()
                    .expect("callback list poisoned")
                    .push(callback);
                return Ok(());
            }
        }
        {
            let suspended = self.suspended.lock().expect("watcher registry poisoned");
            if let Some(callbacks) = suspended.get(&key) {
                callbacks
                    .lock()
                    .expect("callback list poisoned")
                    .push(callback);
                return Ok(());
            }
        }

        let callbacks: CallbackList = Arc::new(Mutex::new(vec![callback]));
        let watcher = spawn_watcher(&key, Arc::clone(&callbacks))?;
        self.active
            .lock()
            .expect("watcher registry poisoned")
            .insert(
                key,
                WatchEntry {
                    _watcher: watcher,
                    callbacks,
                },
            );
        Ok(())
    }

    /// Close the OS subscription for `dir`, stashing its callbacks so
    /// `resume` can recreate it.
    pub fn suspend(&self, dir: &Path) {
        let key = dir.to_path_buf();
        let entry = self
            .active
            .lock()
            .expect("watcher registry poisoned")
            .remove(&key);
        if let Some(entry) = entry {
            debug!(dir = %key.display(), "Suspending file watcher");
            self.suspended
                .lock()
                .expect("watcher registry poisoned")
                .insert(key, entry.callbacks);
        }
    }

    /// Recreate the watcher for `dir` and re-attach the callbacks stashed
    /// by `suspend`. A directory that was never suspended is a no-op.
    pub fn resume(&self, dir: &Path) -> Result<()> {
        let key = dir.to_path_buf();
        let callbacks = self
            .suspended
            .lock()
            .expect("watcher registry poisoned")
            .remove(&key);
        let Some(callbacks) = callbacks else {
            return Ok(());
        };

        debug!(dir = %key.display(), "Resuming file watcher");
        let watcher = spawn_watcher(&key, Arc::clone(&callbacks))?;
        self.active
            .lock()
            .expect("watcher registry poisoned")
            .insert(
                key,
                WatchEntry {
                    _watcher: watcher,
                    callbacks,
                },
            );
        Ok(())
    }

    pub fn is_watching(&self, dir: &Path) -> bool {
        self.active
            .lock()
            .expect("watcher registry poisoned")
            .contains_key(dir)
    }

    pub fn is_suspended(&self, dir: &Path) -> bool {
        self.suspended
            .lock()
            .expect("watcher registry poisoned")
            .contains_key(dir)
    }
}

fn spawn_watcher(dir: &Path, callbacks: CallbackList) -> Result<RecommendedWatcher> {
    let handler_callbacks = Arc::clone(&callbacks);
    let mut watcher = RecommendedWatcher::new(
        move |event: notify::Result<Event>| {
            let Ok(event) = event else {
                return;
            };
            let snapshot: Vec<ChangeCallback> = handler_callbacks
                .lock()
                .expect("callback list poisoned")
                .clone();
            for path in &event.paths {
                for callback in &snapshot {
                    callback(path);
                }
            }
        },
        NotifyConfig::default(),
    )
    .context("Failed to create filesystem watcher")?;
    watcher
        .watch(dir, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch '{}'", dir.display()))?;
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_watch_suspend_resume_lifecycle() {
        let registry = WatcherRegistry::new();
        let dir = tempdir().unwrap();

        registry
            .watch(dir.path(), Arc::new(|_path: &Path| {}))
            .unwrap();
        assert!(registry.is_watching(dir.path()));
        assert!(!registry.is_suspended(dir.path()));

        registry.suspend(dir.path());
        assert!(!registry.is_watching(dir.path()));
        assert!(registry.is_suspended(dir.path()));

        registry.resume(dir.path()).unwrap();
        assert!(registry.is_watching(dir.path()));
        assert!(!registry.is_suspended(dir.path()));
    }

    #[test]
    fn test_resume_without_suspend_is_noop() {
        let registry = WatcherRegistry::new();
        let dir = tempdir().unwrap();
        registry.resume(dir.path()).unwrap();
        assert!(!registry.is_watching(dir.path()));
    }

    #[test]
    fn test_callbacks_survive_suspend_resume() {
        let registry = WatcherRegistry::new();
        let dir = tempdir().unwrap();
        let (tx, rx) = mpsc::channel::<PathBuf>();

        let sender = tx.clone();
        registry
            .watch(
                dir.path(),
                Arc::new(move |path: &Path| {
                    let _ = sender.send(path.to_path_buf());
                }),
            )
            .unwrap();

        registry.suspend(dir.path());
        registry.resume(dir.path()).unwrap();

        std::fs::write(dir.path().join("page.tsx"), "export default 1").unwrap();
        let event = rx.recv_timeout(Duration::from_secs(10));
        assert!(event.is_ok(), "expected a change event after resume");
    }

    #[test]
    fn test_suspended_watcher_stays_quiet() {
        let registry = WatcherRegistry::new();
        let dir = tempdir().unwrap();
        let (tx, rx) = mpsc::channel::<PathBuf>();

        registry
            .watch(
                dir.path(),
                Arc::new(move |path: &Path| {
                    let _ = tx.send(path.to_path_buf());
                }),
            )
            .unwrap();
        registry.suspend(dir.path());

        std::fs::write(dir.path().join("layout.tsx"), "export default 2").unwrap();
        let event = rx.recv_timeout(Duration::from_millis(300));
        assert!(event.is_err(), "suspended watcher must not deliver events");
    }
}
