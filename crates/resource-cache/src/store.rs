//! Cache stores.
//!
//! A [`CacheStore`] holds the entries of one resource kind together with the
//! validity metadata describing them. Every field lives behind a single
//! reader/writer lock so a reader always sees a status that matches the
//! entries handed out with it.
//!
//! Stores carry no threading logic of their own: the scanner fills them under
//! the write lock, the coordinator invalidates them, and UI code reads them.

mod buffer;

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockWriteGuard};

pub use buffer::{EntryBuffer, INITIAL_CAPACITY, SHRINK_MIN_CAPACITY};

use crate::error::{CacheError, Result};
use crate::types::{CacheEntry, CacheSnapshot, CacheStatus, StoreStatistics};

/// Lock-protected contents of a store.
#[derive(Debug)]
pub struct StoreState<E> {
    entries: EntryBuffer<E>,
    scan_time: Option<DateTime<Utc>>,
    is_valid: bool,
}

impl<E: CacheEntry> StoreState<E> {
    fn new(max_entries: usize) -> Self {
        Self {
            entries: EntryBuffer::new(max_entries),
            scan_time: None,
            is_valid: false,
        }
    }

    pub fn status_at(&self, now: DateTime<Utc>, ttl: Duration) -> CacheStatus {
        if !self.is_valid {
            return CacheStatus::Invalid;
        }
        if self.entries.is_empty() {
            return CacheStatus::Empty;
        }
        let expired = self
            .scan_time
            .and_then(|scanned| now.signed_duration_since(scanned).to_std().ok())
            .is_some_and(|elapsed| elapsed > ttl);
        if expired {
            CacheStatus::Expired
        } else {
            CacheStatus::Ok
        }
    }

    pub fn entries(&self) -> &[E] {
        self.entries.as_slice()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    pub fn max_entries(&self) -> usize {
        self.entries.max_entries()
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn scan_time(&self) -> Option<DateTime<Utc>> {
        self.scan_time
    }

    /// Releases memory held by an oversized buffer that the last scan
    /// barely used.
    pub fn shrink_if_underused(&mut self) {
        if let Some(capacity) = self.entries.shrink_if_underused() {
            log::info!("{} cache shrunk capacity={}", E::KIND, capacity);
        }
    }

    /// Starts a scan. Entries pushed through the returned [`Staging`] stay
    /// invisible until [`Staging::commit`]; dropping it uncommitted leaves
    /// the store exactly as it was.
    pub fn stage(&mut self) -> Staging<'_, E> {
        self.entries.begin_stage();
        Staging {
            state: self,
            committed: false,
        }
    }

    /// Stages `entries` and commits them in one step.
    pub fn commit(&mut self, entries: Vec<E>, current: Option<&str>) -> Result<usize> {
        let mut staging = self.stage();
        for entry in entries {
            if !staging.try_push(entry)? {
                break;
            }
        }
        Ok(staging.commit(current))
    }

    /// Clears every marker, then flags the first entry matching `identifier`.
    pub fn mark_current(&mut self, identifier: &str) -> bool {
        let mut found = false;
        for entry in self.entries.as_mut_slice() {
            let matches = !found && entry.matches_selection(identifier);
            entry.set_current(matches);
            found |= matches;
        }
        found
    }

    pub fn invalidate(&mut self) {
        self.is_valid = false;
    }

    fn release(&mut self) {
        self.entries.release();
        self.scan_time = None;
        self.is_valid = false;
    }
}

/// An in-progress scan of one store.
#[derive(Debug)]
#[must_use = "dropping the staging discards the scan"]
pub struct Staging<'a, E: CacheEntry> {
    state: &'a mut StoreState<E>,
    committed: bool,
}

impl<E: CacheEntry> Staging<'_, E> {
    pub fn len(&self) -> usize {
        self.state.entries.staged_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_entries(&self) -> usize {
        self.state.entries.max_entries()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.max_entries()
    }

    /// Adds an entry. Returns `Ok(false)` when the store is full.
    pub fn try_push(&mut self, entry: E) -> Result<bool> {
        let requested = self.len() + 1;
        self.state
            .entries
            .try_push(entry)
            .map_err(|_| CacheError::Allocation {
                kind: E::KIND,
                requested,
            })
    }

    /// Publishes the staged entries, marks `current`, and stamps the store
    /// valid. The scan time never moves backwards.
    pub fn commit(mut self, current: Option<&str>) -> usize {
        self.committed = true;
        let state = &mut *self.state;
        state.entries.commit_stage();
        if let Some(identifier) = current {
            state.mark_current(identifier);
        }
        let now = Utc::now();
        state.scan_time = Some(match state.scan_time {
            Some(previous) if previous > now => previous,
            _ => now,
        });
        state.is_valid = true;
        state.entries.len()
    }
}

impl<E: CacheEntry> Drop for Staging<'_, E> {
    fn drop(&mut self) {
        if !self.committed {
            self.state.entries.abort_stage();
        }
    }
}

/// One resource kind's cache.
#[derive(Debug)]
pub struct CacheStore<E> {
    ttl: Duration,
    state: RwLock<StoreState<E>>,
}

impl<E: CacheEntry> CacheStore<E> {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(StoreState::new(max_entries)),
        }
    }

    pub fn status(&self) -> CacheStatus {
        self.status_at(Utc::now())
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> CacheStatus {
        self.state.read().status_at(now, self.ttl)
    }

    /// Copies status and entries out under one read lock.
    pub fn snapshot(&self) -> CacheSnapshot<E> {
        let state = self.state.read();
        let status = state.status_at(Utc::now(), self.ttl);
        if status.is_readable() {
            CacheSnapshot {
                status,
                entries: Some(state.entries().to_vec()),
            }
        } else {
            CacheSnapshot::unavailable(status)
        }
    }

    /// Lends the entries to `f` without copying. The slice is only valid for
    /// the duration of the call, and writers wait until `f` returns.
    pub fn with_entries<R>(&self, f: impl FnOnce(CacheStatus, Option<&[E]>) -> R) -> R {
        let state = self.state.read();
        let status = state.status_at(Utc::now(), self.ttl);
        if status.is_readable() {
            f(status, Some(state.entries()))
        } else {
            f(status, None)
        }
    }

    pub fn is_valid(&self) -> bool {
        self.state.read().is_valid()
    }

    pub fn invalidate(&self) {
        self.state.write().invalidate();
        log::info!("{} cache invalidated", E::KIND);
    }

    /// Moves the "current" marker without rescanning.
    pub fn update_current(&self, identifier: &str) -> bool {
        self.state.write().mark_current(identifier)
    }

    pub fn statistics(&self) -> StoreStatistics {
        let state = self.state.read();
        StoreStatistics {
            count: state.len(),
            scan_time: state.scan_time(),
        }
    }

    /// Exclusive access for scanners.
    pub fn write(&self) -> RwLockWriteGuard<'_, StoreState<E>> {
        self.state.write()
    }

    /// Frees the entries and resets all metadata.
    pub fn release(&self) {
        self.state.write().release();
        log::info!("{} cache released", E::KIND);
    }
}
