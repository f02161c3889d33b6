//! Alert counters shared by workers and the flush scheduler

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-worker `sent` counters plus the cross-worker `all` counter
///
/// Both reset on every flush tick; only `sent` is reported.
#[derive(Debug)]
pub struct DispatchCounters {
    /// Events handed to the bulk sink since the last flush
    all: AtomicU64,
    /// Alerts accepted per worker since the last flush
    sent: Vec<AtomicU64>,
}

impl DispatchCounters {
    /// Create counters for `workers` workers
    pub fn new(workers: usize) -> Self {
        Self {
            all: AtomicU64::new(0),
            sent: (0..workers).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Number of worker slots
    pub fn workers(&self) -> usize {
        self.sent.len()
    }

    pub fn all(&self) -> u64 {
        self.all.load(Ordering::Relaxed)
    }

    pub fn inc_all(&self) {
        self.all.fetch_add(1, Ordering::Relaxed);
    }

    /// Alerts accepted by `worker_id`; 0 for unknown ids
    pub fn sent(&self, worker_id: usize) -> u64 {
        self.sent
            .get(worker_id)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn inc_sent(&self, worker_id: usize) {
        if let Some(counter) = self.sent.get(worker_id) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Zero every counter
    pub fn reset(&self) {
        self.all.store(0, Ordering::Relaxed);
        for counter in &self.sent {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            all: self.all(),
            sent: self.sent.iter().map(|c| c.load(Ordering::Relaxed)).collect(),
        }
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub all: u64,
    pub sent: Vec<u64>,
}

impl CountersSnapshot {
    /// Alerts accepted across all workers
    pub fn total_sent(&self) -> u64 {
        self.sent.iter().sum()
    }
}
