//! Capacity-managed entry storage.
//!
//! The backing `Vec`s are sized by an explicit policy instead of the standard
//! library's amortized growth:
//! - grow: start at [`INITIAL_CAPACITY`], then double, never past the maximum
//! - shrink: halve (not below [`INITIAL_CAPACITY`]) when capacity exceeds
//!   [`SHRINK_MIN_CAPACITY`] and fewer than a quarter of the slots are in use
//!
//! A scan fills a staging `Vec` while the live entries stay readable. On
//! commit the two swap, and the old live allocation becomes the next scan's
//! staging area, so neither is reallocated from scratch.

use std::collections::TryReserveError;
use std::mem;

pub const INITIAL_CAPACITY: usize = 32;
pub const SHRINK_MIN_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct EntryBuffer<E> {
    items: Vec<E>,
    staged: Vec<E>,
    capacity: usize,
    staged_capacity: usize,
    max_entries: usize,
}

impl<E> EntryBuffer<E> {
    pub fn new(max_entries: usize) -> Self {
        Self {
            items: Vec::new(),
            staged: Vec::new(),
            capacity: 0,
            staged_capacity: 0,
            max_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Policy capacity of the live entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn as_slice(&self) -> &[E] {
        &self.items
    }

    pub fn as_mut_slice(&mut self) -> &mut [E] {
        &mut self.items
    }

    /// Halves an oversized, underused buffer. Returns the new capacity when
    /// it shrank.
    pub fn shrink_if_underused(&mut self) -> Option<usize> {
        if self.capacity <= SHRINK_MIN_CAPACITY || self.items.len() >= self.capacity / 4 {
            return None;
        }
        let capacity = (self.capacity / 2).max(INITIAL_CAPACITY);
        self.items.shrink_to(capacity);
        self.staged.shrink_to(capacity);
        self.capacity = capacity;
        Some(capacity)
    }

    /// Empties the staging area. Its allocation and the live policy
    /// capacity carry over.
    pub fn begin_stage(&mut self) {
        self.staged.clear();
        self.staged_capacity = self.capacity;
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Appends to the staging area, growing it by the policy.
    ///
    /// Returns `Ok(false)` once the maximum is reached. On allocation
    /// failure the staged entries are untouched and the live ones too.
    pub fn try_push(&mut self, entry: E) -> Result<bool, TryReserveError> {
        let needed = self.staged.len() + 1;
        if needed > self.max_entries {
            return Ok(false);
        }
        if needed > self.staged_capacity {
            self.staged_capacity = grown_capacity(self.staged_capacity, needed, self.max_entries);
        }
        if needed > self.staged.capacity() {
            let additional = self.staged_capacity - self.staged.len();
            self.staged.try_reserve_exact(additional)?;
        }
        self.staged.push(entry);
        Ok(true)
    }

    /// Makes the staged entries live.
    pub fn commit_stage(&mut self) {
        mem::swap(&mut self.items, &mut self.staged);
        self.staged.clear();
        self.capacity = self.staged_capacity;
    }

    /// Drops the staged entries; the live ones are unchanged.
    pub fn abort_stage(&mut self) {
        self.staged.clear();
    }

    /// Stages `entries` and commits them. Entries past the maximum are
    /// dropped; on allocation failure the live entries are left as they were.
    #[cfg(test)]
    pub fn replace(&mut self, entries: Vec<E>) -> Result<(), TryReserveError> {
        self.begin_stage();
        for entry in entries {
            match self.try_push(entry) {
                Ok(true) => {}
                Ok(false) => break,
                Err(error) => {
                    self.abort_stage();
                    return Err(error);
                }
            }
        }
        self.commit_stage();
        Ok(())
    }

    /// Frees both allocations entirely.
    pub fn release(&mut self) {
        self.items = Vec::new();
        self.staged = Vec::new();
        self.capacity = 0;
        self.staged_capacity = 0;
    }
}

/// Capacity the grow policy settles on to hold `needed` entries, starting
/// from `current`.
pub fn grown_capacity(current: usize, needed: usize, max_entries: usize) -> usize {
    let mut capacity = current;
    while capacity < needed {
        capacity = if capacity == 0 {
            INITIAL_CAPACITY
        } else {
            capacity.saturating_mul(2)
        };
        if capacity >= max_entries {
            return max_entries;
        }
    }
    capacity.min(max_entries)
}
