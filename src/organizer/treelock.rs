//! Hierarchical path locking.
//!
//! Locking `/music/A/B` excludes anyone locking `/music/A`, `/music/A/B` or
//! anything below it, while `/music/A/D` stays free. A request for several
//! paths is granted all at once or not at all, so two imports can never
//! hold half of each other's paths.
//!
//! Requests are served in arrival order among those that conflict, so a
//! steady stream of small locks cannot starve a lock on a common ancestor.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::pathformat::clean_path;

#[derive(Debug, Default)]
struct State {
    next_ticket: u64,
    held: Vec<(u64, Vec<PathBuf>)>,
    waiting: Vec<(u64, Vec<PathBuf>)>,
}

impl State {
    fn can_acquire(&self, ticket: u64, paths: &[PathBuf]) -> bool {
        let held_conflict = self.held.iter().any(|(_, held)| conflicts(held, paths));
        let earlier_conflict = self
            .waiting
            .iter()
            .any(|(t, waiting)| *t < ticket && conflicts(waiting, paths));
        !held_conflict && !earlier_conflict
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    released: Condvar,
}

/// Process-wide lock over directory trees. Clones share the same lock table.
#[derive(Debug, Clone, Default)]
pub struct TreeLock {
    inner: Arc<Inner>,
}

/// Held tree lock; released on drop
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct TreeLockGuard {
    inner: Arc<Inner>,
    ticket: u64,
    paths: Vec<PathBuf>,
}

impl TreeLockGuard {
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for TreeLockGuard {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        state.held.retain(|(t, _)| *t != self.ticket);
        drop(state);
        self.inner.released.notify_all();
    }
}

impl TreeLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until every path can be locked, then lock them together
    pub fn lock<P: AsRef<Path>>(&self, paths: impl IntoIterator<Item = P>) -> TreeLockGuard {
        let paths = normalize(paths);
        let mut state = self.inner.state.lock();

        let ticket = state.next_ticket;
        state.next_ticket += 1;

        if !state.can_acquire(ticket, &paths) {
            state.waiting.push((ticket, paths.clone()));
            tracing::debug!(target: "treelock", ?paths, "Waiting for conflicting lock");
            while !state.can_acquire(ticket, &paths) {
                self.inner.released.wait(&mut state);
            }
            state.waiting.retain(|(t, _)| *t != ticket);
        }

        state.held.push((ticket, paths.clone()));
        drop(state);
        // a waiter behind us may have been blocked only by our queue entry
        self.inner.released.notify_all();

        TreeLockGuard {
            inner: Arc::clone(&self.inner),
            ticket,
            paths,
        }
    }

    /// Lock without blocking, or `None` if anything conflicts
    pub fn try_lock<P: AsRef<Path>>(&self, paths: impl IntoIterator<Item = P>) -> Option<TreeLockGuard> {
        let paths = normalize(paths);
        let mut state = self.inner.state.lock();

        let ticket = state.next_ticket;
        if !state.can_acquire(ticket, &paths) {
            return None;
        }
        state.next_ticket += 1;
        state.held.push((ticket, paths.clone()));

        Some(TreeLockGuard {
            inner: Arc::clone(&self.inner),
            ticket,
            paths,
        })
    }

    /// [`TreeLock::lock`] on the blocking pool so async callers don't stall a runtime worker
    pub async fn lock_owned(&self, paths: Vec<PathBuf>) -> Result<TreeLockGuard, tokio::task::JoinError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.lock(paths)).await
    }
}

/// Clean, sort and deduplicate
fn normalize<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = paths
        .into_iter()
        .map(|p| clean_path(p.as_ref()))
        .collect();
    paths.sort();
    paths.dedup();
    paths
}

/// Whether any path in `a` is an ancestor of, equal to, or below any path in `b`
fn conflicts(a: &[PathBuf], b: &[PathBuf]) -> bool {
    a.iter()
        .any(|x| b.iter().any(|y| x.starts_with(y) || y.starts_with(x)))
}
