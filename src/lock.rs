//! Per-path mutual exclusion with a timeout-based safety release
//!
//! Guards a project directory against overlapping validation/auto-fix
//! passes. Every lock arms a safety valve that force-releases it after the
//! timeout window, so a wedged holder cannot deadlock the pipeline; the
//! valve only fires if the holder has not already completed, and logs
//! loudly when it does.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct LockEntry {
    id: Uuid,
    acquired_at: DateTime<Utc>,
    released: Arc<Notify>,
    completed: Arc<AtomicBool>,
}

/// Process-wide registry of per-path locks. Share via `Arc`.
#[derive(Debug, Default)]
pub struct LockManager {
    locks: Mutex<HashMap<String, LockEntry>>,
}

/// Releases its lock on drop, so every exit path (including cancellation)
/// releases.
pub struct LockGuard {
    manager: Arc<LockManager>,
    key: String,
    id: Uuid,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.manager.release_key_if_current(&self.key, self.id);
    }
}

/// Locks are keyed by the absolute, case-folded path so that equivalent
/// spellings of one directory contend on one lock.
fn normalize_path(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    absolute.to_string_lossy().to_lowercase()
}

impl LockManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Acquire the lock for `path`, waiting up to `timeout` for the
    /// current holder. Timing out is a hard error, never a silent pass.
    pub async fn acquire(self: &Arc<Self>, path: &Path, timeout: Duration) -> Result<()> {
        self.acquire_internal(normalize_path(path), timeout)
            .await
            .map(|_| ())
    }

    pub fn release(&self, path: &Path) {
        let key = normalize_path(path);
        let entry = self.locks.lock().expect("lock registry poisoned").remove(&key);
        if let Some(entry) = entry {
            entry.completed.store(true, Ordering::SeqCst);
            entry.released.notify_waiters();
        }
    }

    pub fn is_locked(&self, path: &Path) -> bool {
        let key = normalize_path(path);
        self.locks
            .lock()
            .expect("lock registry poisoned")
            .contains_key(&key)
    }

    /// Drop every live lock and wake all waiters.
    pub fn clear_all(&self) {
        let mut locks = self.locks.lock().expect("lock registry poisoned");
        for (_, entry) in locks.drain() {
            entry.completed.store(true, Ordering::SeqCst);
            entry.released.notify_waiters();
        }
    }

    /// Run `operation` while holding the lock for `path`. The lock is
    /// released on every exit path via the guard's destructor.
    pub async fn with_lock<T, Fut>(
        self: &Arc<Self>,
        path: &Path,
        timeout: Duration,
        operation: Fut,
    ) -> Result<T>
    where
        Fut: std::future::Future<Output = T>,
    {
        let key = normalize_path(path);
        let id = self.acquire_internal(key.clone(), timeout).await?;
        let _guard = LockGuard {
            manager: Arc::clone(self),
            key,
            id,
        };
        Ok(operation.await)
    }

    async fn acquire_internal(self: &Arc<Self>, key: String, timeout: Duration) -> Result<Uuid> {
        let deadline = Instant::now() + timeout;
        loop {
            let released = match self.try_register(&key) {
                Ok(entry) => {
                    debug!(path = %key, acquired_at = %entry.acquired_at, "Lock acquired");
                    let id = entry.id;
                    self.arm_safety_valve(key, entry, timeout);
                    return Ok(id);
                }
                Err(released) => released,
            };

            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                bail!("Lock timeout waiting for '{}'", key);
            };

            // Register the waiter before re-checking the registry, so a
            // release between the check and the await cannot be missed.
            let notified = released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let locks = self.locks.lock().expect("lock registry poisoned");
                if !locks.contains_key(&key) {
                    continue;
                }
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                bail!(
                    "Lock timeout after {}ms waiting for '{}'",
                    timeout.as_millis(),
                    key
                );
            }
            // Woken; loop back and race for the registry slot.
        }
    }

    /// Register a fresh lock for `key`, or hand back the current
    /// holder's release signal to wait on.
    fn try_register(&self, key: &str) -> std::result::Result<LockEntry, Arc<Notify>> {
        let mut locks = self.locks.lock().expect("lock registry poisoned");
        match locks.entry(key.to_string()) {
            Entry::Occupied(existing) => Err(existing.get().released.clone()),
            Entry::Vacant(slot) => {
                let entry = LockEntry {
                    id: Uuid::new_v4(),
                    acquired_at: Utc::now(),
                    released: Arc::new(Notify::new()),
                    completed: Arc::new(AtomicBool::new(false)),
                };
                slot.insert(entry.clone());
                Ok(entry)
            }
        }
    }

    /// Deadlock-prevention valve: force-release after the timeout window
    /// unless the holder already completed.
    fn arm_safety_valve(self: &Arc<Self>, key: String, entry: LockEntry, timeout: Duration) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if entry.completed.load(Ordering::SeqCst) {
                return;
            }
            if manager.release_key_if_current(&key, entry.id) {
                warn!(
                    path = %key,
                    timeout_ms = timeout.as_millis() as u64,
                    "Lock force-released by safety valve; holder had not finished"
                );
            }
        });
    }

    /// Release only if the registered lock is still the one identified by
    /// `id`; a stale valve or guard must not free a successor's lock.
    fn release_key_if_current(&self, key: &str, id: Uuid) -> bool {
        let mut locks = self.locks.lock().expect("lock registry poisoned");
        let is_current = locks.get(key).map(|entry| entry.id == id).unwrap_or(false);
        if !is_current {
            return false;
        }
        if let Some(entry) = locks.remove(key) {
            drop(locks);
            entry.completed.store(true, Ordering::SeqCst);
            entry.released.notify_waiters();
            true
        } else {
            false
        }
    }
}
