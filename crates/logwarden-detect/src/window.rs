use chrono::{DateTime, Duration, Utc};
use logwarden_common::AnomalyRecord;
use std::collections::VecDeque;

/// Rolling window of anomaly arrivals for one service, trimmed on every
/// insert so it never holds entries older than its span.
pub struct RateWindow {
    window_secs: i64,
    entries: VecDeque<(DateTime<Utc>, AnomalyRecord)>,
}

impl RateWindow {
    pub fn new(window_secs: u64) -> Self {
        Self {
            window_secs: window_secs as i64,
            entries: VecDeque::new(),
        }
    }

    pub fn push(&mut self, at: DateTime<Utc>, record: AnomalyRecord) {
        self.entries.push_back((at, record));
        self.evict(at);
    }

    pub fn evict(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::seconds(self.window_secs);
        while let Some((at, _)) = self.entries.front() {
            if *at < cutoff {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Up to `limit` most recent records, newest first.
    pub fn samples(&self, limit: usize) -> Vec<AnomalyRecord> {
        self.entries
            .iter()
            .rev()
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn oldest(&self) -> Option<DateTime<Utc>> {
        self.entries.front().map(|(at, _)| *at)
    }
}
