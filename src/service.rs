//! # Stats Service
//! The shared entry point: one exclusive lock around the [`EventStore`].
//!
//! Statistics queries prune, so they take the same lock as writes. Every
//! operation reads the clock once inside the critical section and uses that
//! instant for validation, pruning and aggregation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, gauge};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::stats::Statistics;
use crate::store::EventStore;
use crate::transaction::ValidationError;
use crate::window::{InvalidWindow, TrailingWindow};

#[derive(Debug)]
pub struct StatsService {
    store: Mutex<EventStore>,
}

impl StatsService {
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Result<Self, InvalidWindow> {
        let window = TrailingWindow::new(window, clock)?;
        gauge!("stats_window_seconds").set(window.duration().num_seconds() as f64);
        Ok(Self {
            store: Mutex::new(EventStore::new(window)),
        })
    }

    /// Validate and record a transaction.
    pub fn add_transaction(
        &self,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        let (result, retained) = {
            let mut store = self.store.lock();
            let now = store.window().now();
            let result = store.add(value, timestamp, now);
            (result, store.len())
        };

        match result {
            Ok(pruned) => {
                record_pruned(pruned);
                counter!("stats_transactions_accepted_total").increment(1);
                gauge!("stats_retained_transactions").set(retained as f64);
                debug!(target: "stats", value, %timestamp, retained, "transaction accepted");
                Ok(())
            }
            Err(e) => {
                counter!("stats_transactions_rejected_total", "reason" => e.kind()).increment(1);
                warn!(target: "stats", reason = e.kind(), error = %e, "transaction rejected");
                Err(e)
            }
        }
    }

    /// Drop every retained transaction.
    pub fn clear_transactions(&self) {
        let removed = {
            let mut store = self.store.lock();
            let n = store.len();
            store.clear();
            n
        };
        counter!("stats_clears_total").increment(1);
        gauge!("stats_retained_transactions").set(0.0);
        info!(target: "stats", removed, "transactions cleared");
    }

    /// Prune, then aggregate what is left. Never fails.
    pub fn get_statistics(&self) -> Statistics {
        let (stats, pruned) = {
            let mut store = self.store.lock();
            let now = store.window().now();
            let pruned = store.prune(now);
            (store.statistics(), pruned)
        };
        record_pruned(pruned);
        gauge!("stats_retained_transactions").set(stats.count as f64);
        debug!(
            target: "stats",
            count = stats.count,
            sum = stats.sum,
            avg = stats.avg,
            min = stats.min,
            max = stats.max,
            "statistics computed"
        );
        stats
    }

    pub fn window_secs(&self) -> i64 {
        self.store.lock().window().duration().num_seconds()
    }
}

fn record_pruned(n: usize) {
    if n > 0 {
        counter!("stats_transactions_pruned_total").increment(n as u64);
        debug!(target: "stats", pruned = n, "expired transactions pruned");
    }
}
