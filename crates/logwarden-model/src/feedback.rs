use chrono::Utc;
use logwarden_common::{FeedbackEntry, FeedbackRecord};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Bounded store of labeled examples awaiting the next training pass.
///
/// Feedback is collected, not acted on: retraining consumes it only
/// when whoever schedules training decides to. On overflow the oldest
/// entries are dropped.
pub struct FeedbackStore {
    entries: Mutex<VecDeque<FeedbackEntry>>,
    capacity: usize,
    total_received: AtomicU64,
}

impl FeedbackStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            total_received: AtomicU64::new(0),
        }
    }

    /// Appends the given records, stamped at ingest time. Returns the
    /// number accepted (always the full batch; overflow evicts oldest).
    pub fn ingest(&self, records: Vec<FeedbackRecord>) -> usize {
        let count = records.len();
        let now = Utc::now();
        let mut entries = self.entries.lock().expect("feedback store lock poisoned");
        for record in records {
            if entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.push_back(FeedbackEntry {
                log: record.log,
                is_anomaly: record.is_anomaly,
                received_at: now,
            });
        }
        self.total_received.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    /// Takes all stored entries, leaving the store empty.
    pub fn drain(&self) -> Vec<FeedbackEntry> {
        let mut entries = self.entries.lock().expect("feedback store lock poisoned");
        entries.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("feedback store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lifetime count of accepted records, including evicted ones.
    pub fn total_received(&self) -> u64 {
        self.total_received.load(Ordering::Relaxed)
    }
}
