//! Rate-limited, append-only status logs.
//!
//! A classifier runs at frame rate; the log keeps at most one entry per
//! `min_interval` of wall-clock time so the dashboard sees a readable trail.

use crate::constants::{DEFAULT_LOG_INTERVAL_SECS, DEFAULT_TAIL_LEN};
use chrono::{DateTime, Duration, Local};
use serde::Serialize;

/// One logged label with the wall-clock time it was recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry<L> {
    /// Logged label
    pub label: L,
    /// Time of recording
    pub timestamp: DateTime<Local>,
}

/// Append-only log that drops entries arriving too soon after the last one
#[derive(Debug, Clone)]
pub struct StatusLogger<L> {
    entries: Vec<LogEntry<L>>,
    min_interval: Duration,
    last_append: Option<DateTime<Local>>,
}

impl<L: Clone> StatusLogger<L> {
    /// Create an empty log accepting one entry per `min_interval_secs`
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Interval is validated to a sane range
    pub fn new(min_interval_secs: f64) -> Self {
        let millis = (min_interval_secs.max(0.0) * 1000.0).round() as i64;
        Self {
            entries: Vec::new(),
            min_interval: Duration::milliseconds(millis),
            last_append: None,
        }
    }

    /// Append `label` if the interval since the last append has passed.
    ///
    /// Returns whether the entry was recorded. A clock that stepped
    /// backwards counts as due, so logging resumes immediately.
    pub fn append_if_due(&mut self, label: L, now: DateTime<Local>) -> bool {
        if let Some(last) = self.last_append {
            let elapsed = now.signed_duration_since(last);
            if elapsed >= Duration::zero() && elapsed < self.min_interval {
                return false;
            }
        }

        self.entries.push(LogEntry { label, timestamp: now });
        self.last_append = Some(now);
        true
    }

    /// Drop every entry; the next append is accepted immediately
    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_append = None;
    }

    /// Most recent `n` entries, oldest first
    #[must_use]
    pub fn tail(&self, n: usize) -> &[LogEntry<L>] {
        &self.entries[self.entries.len().saturating_sub(n)..]
    }

    /// Tail with the default window
    #[must_use]
    pub fn recent(&self) -> &[LogEntry<L>] {
        self.tail(DEFAULT_TAIL_LEN)
    }

    /// Every entry, oldest first
    #[must_use]
    pub fn entries(&self) -> &[LogEntry<L>] {
        &self.entries
    }

    /// Most recent entry
    #[must_use]
    pub fn last(&self) -> Option<&LogEntry<L>> {
        self.entries.last()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<L: Clone> Default for StatusLogger<L> {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_INTERVAL_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion_classifier::ReadingStatus;

    fn t0() -> DateTime<Local> {
        Local::now()
    }

    #[test]
    fn test_burst_is_rate_limited() {
        let mut log = StatusLogger::default();
        let start = t0();
        for i in 0..30 {
            log.append_if_due(ReadingStatus::Reading, start + Duration::milliseconds(i * 30));
        }
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].timestamp, start);
    }

    #[test]
    fn test_appends_after_interval() {
        let mut log = StatusLogger::default();
        let start = t0();

        assert!(log.append_if_due("a", start));
        assert!(!log.append_if_due("b", start + Duration::milliseconds(999)));
        assert!(log.append_if_due("c", start + Duration::milliseconds(1000)));
        assert!(log.append_if_due("d", start + Duration::milliseconds(2500)));

        let labels: Vec<_> = log.entries().iter().map(|e| e.label).collect();
        assert_eq!(labels, vec!["a", "c", "d"]);
    }

    #[test]
    fn test_no_deduplication() {
        let mut log = StatusLogger::new(0.0);
        let start = t0();
        for i in 0..5 {
            log.append_if_due(ReadingStatus::NotReading, start + Duration::milliseconds(i));
        }
        assert_eq!(log.len(), 5);
    }

    #[test]
    fn test_clock_stepping_back_is_due() {
        let mut log = StatusLogger::default();
        let start = t0();
        log.append_if_due(1, start);
        assert!(log.append_if_due(2, start - Duration::seconds(30)));
    }

    #[test]
    fn test_tail_is_chronological() {
        let mut log = StatusLogger::new(1.0);
        let start = t0();
        for i in 0..15 {
            log.append_if_due(i, start + Duration::seconds(i64::from(i)));
        }

        let tail: Vec<_> = log.tail(3).iter().map(|e| e.label).collect();
        assert_eq!(tail, vec![12, 13, 14]);
        assert_eq!(log.recent().len(), DEFAULT_TAIL_LEN);
        assert_eq!(log.tail(100).len(), 15);
        assert!(log.tail(0).is_empty());
    }

    #[test]
    fn test_clear() {
        let mut log = StatusLogger::default();
        let start = t0();
        log.append_if_due("x", start);
        log.clear();

        assert!(log.is_empty());
        assert!(log.last().is_none());
        assert!(log.append_if_due("y", start + Duration::milliseconds(10)));
    }
}
