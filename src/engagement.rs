//! Session engagement metrics and saved history snapshots.

use crate::absence::AbsenceWatchdog;
use crate::emotion::Emotion;
use crate::motion_classifier::ReadingStatus;
use crate::status_log::LogEntry;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Label frequencies over an emotion log window
pub type EmotionDistribution = BTreeMap<Emotion, usize>;

/// Point-in-time engagement record; never modified once saved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementSnapshot {
    /// When the snapshot was taken
    pub timestamp: DateTime<Local>,
    /// Share of reading-log entries that are `Reading`, 0-100
    pub reading_percentage: f64,
    /// Share of emotion-log entries with a positive label, 0-100
    pub emotion_percentage: f64,
    /// Label counts over the full emotion log
    pub emotion_distribution: EmotionDistribution,
}

/// Live metrics for the dashboard, including the absence state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementMetrics {
    /// Share of reading-log entries that are `Reading`, 0-100
    pub reading_percentage: f64,
    /// Share of emotion-log entries with a positive label, 0-100
    pub emotion_percentage: f64,
    /// Label counts over the full emotion log
    pub emotion_distribution: EmotionDistribution,
    /// Whether the absence alert is raised
    pub absence_alert: bool,
    /// Seconds since a face was last seen
    pub absence_secs: f64,
}

/// Running counts over the reading and emotion logs.
///
/// Updated on every accepted log entry so live metrics never rescan a log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngagementTally {
    reading_total: usize,
    reading_count: usize,
    emotion_total: usize,
    positive_count: usize,
    distribution: EmotionDistribution,
}

impl EngagementTally {
    /// Count one reading-log entry
    pub fn record_reading(&mut self, status: ReadingStatus) {
        self.reading_total += 1;
        if status == ReadingStatus::Reading {
            self.reading_count += 1;
        }
    }

    /// Count one emotion-log entry
    pub fn record_emotion(&mut self, emotion: Emotion, positive: bool) {
        self.emotion_total += 1;
        if positive {
            self.positive_count += 1;
        }
        *self.distribution.entry(emotion).or_insert(0) += 1;
    }

    pub fn clear_reading(&mut self) {
        self.reading_total = 0;
        self.reading_count = 0;
    }

    pub fn clear_emotions(&mut self) {
        self.emotion_total = 0;
        self.positive_count = 0;
        self.distribution.clear();
    }

    #[must_use]
    pub fn reading_percentage(&self) -> f64 {
        percentage(self.reading_count, self.reading_total)
    }

    #[must_use]
    pub fn emotion_percentage(&self) -> f64 {
        percentage(self.positive_count, self.emotion_total)
    }

    /// Label counts over everything recorded since the last clear
    #[must_use]
    pub fn emotion_distribution(&self) -> &EmotionDistribution {
        &self.distribution
    }
}

/// Ordered, append-only list of saved snapshots
#[derive(Debug, Clone, Default)]
pub struct EngagementHistory {
    snapshots: Vec<EngagementSnapshot>,
}

impl EngagementHistory {
    /// Saved snapshots, oldest first
    #[must_use]
    pub fn snapshots(&self) -> &[EngagementSnapshot] {
        &self.snapshots
    }

    /// Most recently saved snapshot
    #[must_use]
    pub fn latest(&self) -> Option<&EngagementSnapshot> {
        self.snapshots.last()
    }

    /// Number of saved snapshots
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether nothing has been saved yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    fn push(&mut self, snapshot: EngagementSnapshot) -> &EngagementSnapshot {
        self.snapshots.push(snapshot);
        &self.snapshots[self.snapshots.len() - 1]
    }
}

/// Read-side computation over the reading and emotion logs
#[derive(Debug, Clone)]
pub struct EngagementAggregator {
    positive_emotions: BTreeSet<Emotion>,
}

impl EngagementAggregator {
    /// Aggregator counting `positive` labels towards the emotion percentage
    pub fn new(positive: impl IntoIterator<Item = Emotion>) -> Self {
        Self {
            positive_emotions: positive.into_iter().collect(),
        }
    }

    /// Labels counted as positive
    #[must_use]
    pub fn positive_emotions(&self) -> &BTreeSet<Emotion> {
        &self.positive_emotions
    }

    /// `100 * Reading / total`, 0 for an empty window
    #[must_use]
    pub fn reading_percentage(&self, entries: &[LogEntry<ReadingStatus>]) -> f64 {
        percentage(entries.iter().filter(|e| e.label == ReadingStatus::Reading).count(), entries.len())
    }

    /// `100 * positive / total`, 0 for an empty window
    #[must_use]
    pub fn emotion_percentage(&self, entries: &[LogEntry<Emotion>]) -> f64 {
        let positive = entries
            .iter()
            .filter(|e| self.positive_emotions.contains(&e.label))
            .count();
        percentage(positive, entries.len())
    }

    /// Label counts over the given window
    #[must_use]
    pub fn emotion_distribution(&self, entries: &[LogEntry<Emotion>]) -> EmotionDistribution {
        entries.iter().fold(EmotionDistribution::new(), |mut counts, e| {
            *counts.entry(e.label).or_insert(0) += 1;
            counts
        })
    }

    /// Whether `emotion` counts towards the emotion percentage
    #[must_use]
    pub fn is_positive(&self, emotion: Emotion) -> bool {
        self.positive_emotions.contains(&emotion)
    }

    /// Count `emotion` into `tally` with this aggregator's positive set
    pub fn record_emotion(&self, tally: &mut EngagementTally, emotion: Emotion) {
        tally.record_emotion(emotion, self.is_positive(emotion));
    }

    /// Tally built by scanning whole logs
    #[must_use]
    pub fn tally(&self, reading: &[LogEntry<ReadingStatus>], emotions: &[LogEntry<Emotion>]) -> EngagementTally {
        let mut tally = EngagementTally::default();
        for entry in reading {
            tally.record_reading(entry.label);
        }
        for entry in emotions {
            self.record_emotion(&mut tally, entry.label);
        }
        tally
    }

    /// Live metrics from the running tally plus the watchdog state
    #[must_use]
    pub fn metrics(&self, tally: &EngagementTally, watchdog: &AbsenceWatchdog, now: DateTime<Local>) -> EngagementMetrics {
        EngagementMetrics {
            reading_percentage: tally.reading_percentage(),
            emotion_percentage: tally.emotion_percentage(),
            emotion_distribution: tally.emotion_distribution().clone(),
            absence_alert: watchdog.is_alert(),
            absence_secs: watchdog.absence_secs(now),
        }
    }

    /// Capture the tally into `history`
    pub fn save_snapshot<'h>(
        &self,
        tally: &EngagementTally,
        history: &'h mut EngagementHistory,
        now: DateTime<Local>,
    ) -> &'h EngagementSnapshot {
        let snapshot = EngagementSnapshot {
            timestamp: now,
            reading_percentage: tally.reading_percentage(),
            emotion_percentage: tally.emotion_percentage(),
            emotion_distribution: tally.emotion_distribution().clone(),
        };
        log::info!(
            "Saved engagement snapshot: reading {:.1}%, positive emotion {:.1}%",
            snapshot.reading_percentage,
            snapshot.emotion_percentage
        );
        history.push(snapshot)
    }
}

impl Default for EngagementAggregator {
    fn default() -> Self {
        Self::new([Emotion::Happy, Emotion::Neutral])
    }
}

#[allow(clippy::cast_precision_loss)] // Log lengths stay far below 2^52
fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    100.0 * count as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status_log::StatusLogger;
    use chrono::Duration;

    fn filled<L: Clone>(labels: &[L], start: DateTime<Local>) -> StatusLogger<L> {
        let mut log = StatusLogger::new(1.0);
        for (i, label) in labels.iter().enumerate() {
            log.append_if_due(label.clone(), start + Duration::seconds(i64::try_from(i).unwrap()));
        }
        log
    }

    #[test]
    fn test_reading_percentage() {
        use ReadingStatus::{NotReading, Reading};
        let log = filled(&[Reading, Reading, NotReading, Reading], Local::now());
        let aggregator = EngagementAggregator::default();
        assert!((aggregator.reading_percentage(log.entries()) - 75.0).abs() < 1e-10);
    }

    #[test]
    fn test_emotion_percentage_and_distribution() {
        use Emotion::{Happy, Neutral, Sad};
        let log = filled(&[Happy, Sad, Neutral, Happy], Local::now());
        let aggregator = EngagementAggregator::default();

        assert!((aggregator.emotion_percentage(log.entries()) - 75.0).abs() < 1e-10);
        let distribution = aggregator.emotion_distribution(log.entries());
        assert_eq!(distribution.get(&Happy), Some(&2));
        assert_eq!(distribution.get(&Sad), Some(&1));
        assert_eq!(distribution.get(&Neutral), Some(&1));
        assert_eq!(distribution.get(&Emotion::Angry), None);
    }

    #[test]
    fn test_empty_logs_are_zero() {
        let aggregator = EngagementAggregator::default();
        assert!(aggregator.reading_percentage(&[]).abs() < f64::EPSILON);
        assert!(aggregator.emotion_percentage(&[]).abs() < f64::EPSILON);
        assert!(aggregator.emotion_distribution(&[]).is_empty());
    }

    #[test]
    fn test_custom_positive_set() {
        use Emotion::{Happy, Surprise};
        let log = filled(&[Happy, Surprise], Local::now());
        let aggregator = EngagementAggregator::new([Surprise]);
        assert!((aggregator.emotion_percentage(log.entries()) - 50.0).abs() < 1e-10);
    }

    #[test]
    fn test_tail_window_distribution() {
        use Emotion::{Happy, Sad};
        let log = filled(&[Sad, Sad, Happy, Happy], Local::now());
        let aggregator = EngagementAggregator::default();
        let distribution = aggregator.emotion_distribution(log.tail(2));
        assert_eq!(distribution.get(&Happy), Some(&2));
        assert_eq!(distribution.get(&Sad), None);
    }

    #[test]
    fn test_snapshot_unaffected_by_later_logging() {
        use ReadingStatus::{NotReading, Reading};
        let start = Local::now();
        let mut reading = filled(&[Reading, Reading, NotReading, Reading], start);
        let mut emotions = filled(&[Emotion::Happy], start);
        let aggregator = EngagementAggregator::default();
        let mut history = EngagementHistory::default();

        let tally = aggregator.tally(reading.entries(), emotions.entries());
        let saved = aggregator.save_snapshot(&tally, &mut history, start).clone();

        for i in 10..20 {
            reading.append_if_due(NotReading, start + Duration::seconds(i));
            emotions.append_if_due(Emotion::Sad, start + Duration::seconds(i));
        }
        reading.clear();

        assert_eq!(history.len(), 1);
        assert_eq!(history.latest(), Some(&saved));
        assert!((history.snapshots()[0].reading_percentage - 75.0).abs() < 1e-10);
        assert!((history.snapshots()[0].emotion_percentage - 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_metrics_include_absence() {
        let start = Local::now();
        let mut watchdog = AbsenceWatchdog::with_defaults(start);
        watchdog.evaluate(start + Duration::seconds(12));

        let tally = EngagementTally::default();
        let metrics = EngagementAggregator::default().metrics(&tally, &watchdog, start + Duration::seconds(12));
        assert!(metrics.absence_alert);
        assert!((metrics.absence_secs - 12.0).abs() < 1e-10);
    }

    #[test]
    fn test_tally_matches_full_scan() {
        use Emotion::{Angry, Happy, Neutral, Sad};
        use ReadingStatus::{NotReading, Reading};
        let start = Local::now();
        let reading = filled(&[Reading, NotReading, Reading, Reading, NotReading], start);
        let emotions = filled(&[Happy, Sad, Angry, Neutral, Happy, Sad], start);
        let aggregator = EngagementAggregator::default();

        let mut running = EngagementTally::default();
        for entry in reading.entries() {
            running.record_reading(entry.label);
        }
        for entry in emotions.entries() {
            aggregator.record_emotion(&mut running, entry.label);
        }

        assert_eq!(running, aggregator.tally(reading.entries(), emotions.entries()));
        assert!((running.reading_percentage() - aggregator.reading_percentage(reading.entries())).abs() < 1e-10);
        assert!((running.emotion_percentage() - aggregator.emotion_percentage(emotions.entries())).abs() < 1e-10);
        assert_eq!(running.emotion_distribution(), &aggregator.emotion_distribution(emotions.entries()));
    }

    #[test]
    fn test_tally_clear_is_per_log() {
        let aggregator = EngagementAggregator::default();
        let mut tally = EngagementTally::default();
        tally.record_reading(ReadingStatus::Reading);
        aggregator.record_emotion(&mut tally, Emotion::Happy);

        tally.clear_emotions();
        assert!(tally.emotion_percentage().abs() < f64::EPSILON);
        assert!(tally.emotion_distribution().is_empty());
        assert!((tally.reading_percentage() - 100.0).abs() < 1e-10);

        tally.clear_reading();
        assert_eq!(tally, EngagementTally::default());
    }
}
