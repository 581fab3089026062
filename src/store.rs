//! # Event Store
//! Working set of transactions that are still inside the trailing window.
//!
//! Layout: an arena of slots in insertion order (`slots`, addressed by a
//! monotonically increasing sequence number) plus a time index ordered by
//! `(timestamp, seq)`. Pruning pops expired entries off the ends of the index
//! and tombstones their slots, so it only touches what it removes. Tombstones
//! are reclaimed from the front of the arena, and the arena is compacted when
//! they outnumber live entries.
//!
//! The store is not synchronized; [`crate::service::StatsService`] owns it
//! behind a single lock.

use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};

use crate::stats::Statistics;
use crate::transaction::{Transaction, ValidationError};
use crate::window::TrailingWindow;

/// Arenas smaller than this are never compacted.
const COMPACT_MIN_SLOTS: usize = 64;

#[derive(Debug)]
pub struct EventStore {
    window: TrailingWindow,
    slots: VecDeque<Option<Transaction>>,
    /// Sequence number of `slots[0]`.
    base_seq: u64,
    next_seq: u64,
    by_time: BTreeSet<(DateTime<Utc>, u64)>,
}

impl EventStore {
    pub fn new(window: TrailingWindow) -> Self {
        Self {
            window,
            slots: VecDeque::new(),
            base_seq: 0,
            next_seq: 0,
            by_time: BTreeSet::new(),
        }
    }

    pub fn window(&self) -> &TrailingWindow {
        &self.window
    }

    /// Number of retained transactions.
    pub fn len(&self) -> usize {
        self.by_time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_time.is_empty()
    }

    /// Validate and store a transaction observed at `now`.
    ///
    /// Expired entries are pruned before the append. A valid transaction that
    /// is already older than the window is accepted but never retained.
    /// Returns how many entries the prune dropped.
    pub fn add(
        &mut self,
        value: f64,
        timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<usize, ValidationError> {
        let tx = Transaction::new(value, timestamp, now)?;
        let dropped = self.prune(now);
        if self.window.contains_at(tx.timestamp(), now) {
            self.push(tx);
        }
        Ok(dropped)
    }

    /// Drop everything. Idempotent.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.by_time.clear();
        self.base_seq = self.next_seq;
    }

    /// Remove every entry that is outside the window at `now`: older than
    /// `now - duration`, or ahead of `now` after the clock stepped backwards.
    /// Survivors keep their insertion order.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let (start, end) = self.window.bounds_at(now);
        let mut dropped = 0;

        while let Some(&(ts, seq)) = self.by_time.first() {
            if ts >= start {
                break;
            }
            self.by_time.pop_first();
            self.tombstone(seq);
            dropped += 1;
        }
        while let Some(&(ts, seq)) = self.by_time.last() {
            if ts <= end {
                break;
            }
            self.by_time.pop_last();
            self.tombstone(seq);
            dropped += 1;
        }

        if dropped > 0 {
            self.reclaim();
        }
        dropped
    }

    /// Retained transactions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Transaction> + '_ {
        self.slots.iter().flatten()
    }

    /// Aggregate over what is currently retained (no pruning).
    pub fn statistics(&self) -> Statistics {
        Statistics::compute(self.iter().map(Transaction::value))
    }

    fn push(&mut self, tx: Transaction) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots.push_back(Some(tx));
        self.by_time.insert((tx.timestamp(), seq));
    }

    fn tombstone(&mut self, seq: u64) {
        let idx = (seq - self.base_seq) as usize;
        if let Some(slot) = self.slots.get_mut(idx) {
            *slot = None;
        }
    }

    fn reclaim(&mut self) {
        while let Some(None) = self.slots.front() {
            self.slots.pop_front();
            self.base_seq += 1;
        }
        if self.slots.is_empty() {
            self.base_seq = self.next_seq;
            return;
        }
        let live = self.by_time.len();
        if self.slots.len() >= COMPACT_MIN_SLOTS && self.slots.len() > live * 2 {
            self.compact();
        }
    }

    /// Renumber survivors densely and rebuild the time index.
    fn compact(&mut self) {
        let survivors: VecDeque<Option<Transaction>> =
            self.slots.drain(..).filter(Option::is_some).collect();
        self.by_time.clear();
        for (i, tx) in survivors.iter().flatten().enumerate() {
            self.by_time.insert((tx.timestamp(), self.base_seq + i as u64));
        }
        self.next_seq = self.base_seq + survivors.len() as u64;
        self.slots = survivors;
    }
}
