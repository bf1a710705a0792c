//! Per-thread turn serialization.
//!
//! `ThreadLocks` hands out one async mutex per thread id, stored in a
//! `DashMap`. The entry is removed when the last holder releases it, so the
//! map only contains threads with a turn in flight or waiting. The DashMap
//! entry guard is never held across `.await`.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
pub struct ThreadLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other turn holds `thread_id`, then hold it until the
    /// returned guard is dropped.
    pub async fn acquire(&self, thread_id: &str) -> ThreadGuard {
        let lock = self
            .inner
            .entry(thread_id.to_string())
            .or_default()
            .value()
            .clone();
        let guard = lock.lock_owned().await;
        ThreadGuard {
            thread_id: thread_id.to_string(),
            locks: Arc::clone(&self.inner),
            guard: Some(guard),
        }
    }

    /// Number of threads with a held or awaited lock.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Held for the duration of a turn.
#[derive(Debug)]
pub struct ThreadGuard {
    thread_id: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        // Release first so the map's Arc is the only one left when idle.
        drop(self.guard.take());
        self.locks
            .remove_if(&self.thread_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
