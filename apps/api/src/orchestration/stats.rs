//! Per-participant invocation statistics.
//!
//! Response times are a display heuristic derived from reply length plus
//! jitter. They are not measured and carry no timing guarantee.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

/// Records kept per participant; readers only look at the tail.
const RECENT_WINDOW: usize = 20;
const SECONDS_PER_CHAR: f64 = 0.01;
const JITTER_SECONDS: std::ops::Range<f64> = 0.5..2.0;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InvocationRecord {
    pub timestamp: DateTime<Utc>,
    pub content_length: usize,
    pub response_time: f64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AgentStatistics {
    pub invocation_count: u32,
    pub cumulative_response_time: f64,
    pub average_response_time: f64,
    pub first_invocation_time: Option<DateTime<Utc>>,
    pub last_invocation_time: Option<DateTime<Utc>>,
    pub recent: VecDeque<InvocationRecord>,
}

impl AgentStatistics {
    fn fold(&mut self, content_length: usize, response_time: f64, timestamp: DateTime<Utc>) {
        self.invocation_count += 1;
        self.last_invocation_time = Some(timestamp);
        if self.first_invocation_time.is_none() {
            self.first_invocation_time = Some(timestamp);
        }

        self.cumulative_response_time += response_time;
        self.average_response_time =
            self.cumulative_response_time / f64::from(self.invocation_count);

        if self.recent.len() == RECENT_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(InvocationRecord {
            timestamp,
            content_length,
            response_time,
        });
    }

    /// The `n` most recent records, oldest first.
    pub fn latest(&self, n: usize) -> Vec<InvocationRecord> {
        let skip = self.recent.len().saturating_sub(n);
        self.recent.iter().skip(skip).cloned().collect()
    }
}

/// Simulated response time for a reply of `content_length` characters.
pub fn simulated_response_time(content_length: usize) -> f64 {
    content_length as f64 * SECONDS_PER_CHAR + rand::thread_rng().gen_range(JITTER_SECONDS)
}

/// Thread-safe statistics keyed by participant id.
///
/// The outer map lock is held only to find or insert an entry; updates lock
/// the participant's own entry, so different participants never contend.
#[derive(Debug, Default)]
pub struct StatisticsTracker {
    entries: RwLock<HashMap<String, Arc<Mutex<AgentStatistics>>>>,
}

impl StatisticsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, participant_id: &str, content: &str, timestamp: DateTime<Utc>) {
        let length = content.chars().count();
        self.record_sample(
            participant_id,
            length,
            simulated_response_time(length),
            timestamp,
        );
    }

    fn record_sample(
        &self,
        participant_id: &str,
        content_length: usize,
        response_time: f64,
        timestamp: DateTime<Utc>,
    ) {
        let entry = self.entry(participant_id);
        let mut stats = entry.lock().unwrap_or_else(PoisonError::into_inner);
        stats.fold(content_length, response_time, timestamp);
    }

    fn entry(&self, participant_id: &str) -> Arc<Mutex<AgentStatistics>> {
        if let Some(entry) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(participant_id)
        {
            return Arc::clone(entry);
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(participant_id.to_string()).or_default())
    }

    pub fn snapshot(&self, participant_id: &str) -> Option<AgentStatistics> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(participant_id).map(|entry| {
            entry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        })
    }

    /// Forgets every participant. Called when a new run starts.
    pub fn reset(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_first_record_initializes_stats() {
        let tracker = StatisticsTracker::new();
        assert!(tracker.snapshot("recruiter").is_none());

        let now = Utc::now();
        tracker.record("recruiter", "hello", now);

        let stats = tracker.snapshot("recruiter").unwrap();
        assert_eq!(stats.invocation_count, 1);
        assert_eq!(stats.first_invocation_time, Some(now));
        assert_eq!(stats.last_invocation_time, Some(now));
        assert_eq!(stats.recent.len(), 1);
        assert_eq!(stats.recent[0].content_length, 5);
    }

    #[test]
    fn test_average_is_cumulative_over_count() {
        let tracker = StatisticsTracker::new();
        let start = Utc::now();
        for i in 0..7 {
            tracker.record("workflow", &"x".repeat(i * 40), start + Duration::seconds(i as i64));
        }

        let stats = tracker.snapshot("workflow").unwrap();
        assert_eq!(stats.invocation_count, 7);
        let expected = stats.cumulative_response_time / 7.0;
        assert!((stats.average_response_time - expected).abs() < 1e-9);
        assert_eq!(stats.first_invocation_time, Some(start));
        assert_eq!(stats.last_invocation_time, Some(start + Duration::seconds(6)));
    }

    #[test]
    fn test_explicit_samples_fold_exactly() {
        let tracker = StatisticsTracker::new();
        let now = Utc::now();
        tracker.record_sample("A", 10, 1.0, now);
        tracker.record_sample("A", 20, 2.0, now);
        tracker.record_sample("A", 30, 6.0, now);

        let stats = tracker.snapshot("A").unwrap();
        assert!((stats.cumulative_response_time - 9.0).abs() < 1e-9);
        assert!((stats.average_response_time - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_simulated_response_time_bounds() {
        for _ in 0..100 {
            let t = simulated_response_time(100);
            assert!((1.5..3.0).contains(&t), "{t} out of range");
        }
    }

    #[test]
    fn test_window_is_bounded_and_latest_returns_tail() {
        let tracker = StatisticsTracker::new();
        let now = Utc::now();
        for i in 0..(RECENT_WINDOW + 5) {
            tracker.record_sample("A", i, 1.0, now);
        }

        let stats = tracker.snapshot("A").unwrap();
        assert_eq!(stats.recent.len(), RECENT_WINDOW);
        assert_eq!(stats.invocation_count as usize, RECENT_WINDOW + 5);

        let tail: Vec<usize> = stats.latest(5).iter().map(|r| r.content_length).collect();
        let n = RECENT_WINDOW + 5;
        assert_eq!(tail, vec![n - 5, n - 4, n - 3, n - 2, n - 1]);
    }

    #[test]
    fn test_participants_are_tracked_independently() {
        let tracker = StatisticsTracker::new();
        let now = Utc::now();
        tracker.record("A", "one", now);
        tracker.record("A", "two", now);
        tracker.record("B", "three", now);

        assert_eq!(tracker.snapshot("A").unwrap().invocation_count, 2);
        assert_eq!(tracker.snapshot("B").unwrap().invocation_count, 1);
    }

    #[test]
    fn test_reset_clears_everything() {
        let tracker = StatisticsTracker::new();
        tracker.record("A", "one", Utc::now());
        tracker.reset();
        assert!(tracker.snapshot("A").is_none());
    }

    #[test]
    fn test_concurrent_records_for_different_participants() {
        let tracker = Arc::new(StatisticsTracker::new());
        let handles: Vec<_> = ["A", "B", "C", "D"]
            .into_iter()
            .map(|id| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        tracker.record(id, "reply", Utc::now());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for id in ["A", "B", "C", "D"] {
            assert_eq!(tracker.snapshot(id).unwrap().invocation_count, 50);
        }
    }
}
