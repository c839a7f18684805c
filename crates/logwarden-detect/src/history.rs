use logwarden_common::AnomalyRecord;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Hard ceiling on how many records a single query may return.
pub const MAX_QUERY_LIMIT: usize = 1000;

/// Summary of the current history contents.
#[derive(Debug, Clone, Copy)]
pub struct HistoryStats {
    pub total: usize,
    pub mean_score: Option<f64>,
}

/// Bounded in-memory ring of recent anomalies. Writes are O(1) and all
/// access goes through one short-held lock. Nothing survives a process
/// restart.
pub struct AnomalyHistory {
    records: Mutex<VecDeque<AnomalyRecord>>,
    capacity: usize,
}

impl AnomalyHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Appends a record, evicting the oldest when at capacity.
    pub fn append(&self, record: AnomalyRecord) {
        let mut records = self.records.lock().expect("history lock poisoned");
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Up to `limit` most recent records, newest first. The limit is
    /// clamped into `1..=MAX_QUERY_LIMIT`.
    pub fn recent(&self, limit: usize) -> Vec<AnomalyRecord> {
        let limit = limit.clamp(1, MAX_QUERY_LIMIT);
        let records = self.records.lock().expect("history lock poisoned");
        records.iter().rev().take(limit).cloned().collect()
    }

    pub fn clear(&self) {
        self.records.lock().expect("history lock poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("history lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> HistoryStats {
        let records = self.records.lock().expect("history lock poisoned");
        let total = records.len();
        let mean_score = if total == 0 {
            None
        } else {
            Some(records.iter().map(|r| r.anomaly_score).sum::<f64>() / total as f64)
        };
        HistoryStats { total, mean_score }
    }
}
