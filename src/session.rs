//! Per-session state and the per-frame pipeline.
//!
//! [`MonitorSession`] owns every piece of tracking state for one viewer.
//! A frame goes through two stages: [`FrameObserver`] does the eye crops and
//! pupil search, which only reads the frame, and
//! [`MonitorSession::record_frame`] folds the result into the classifier,
//! logs and watchdog. [`SharedSession`] runs the first stage without holding
//! its lock, so dashboard readers only ever wait on the short second stage.

use crate::absence::AbsenceWatchdog;
use crate::config::Config;
use crate::emotion::Emotion;
use crate::engagement::{EngagementAggregator, EngagementHistory, EngagementMetrics, EngagementSnapshot, EngagementTally};
use crate::eye_region::EyeRegionExtractor;
use crate::landmarks::FaceLandmarks;
use crate::motion_classifier::{Displacement, MotionClassifier, PupilPair, ReadingStatus};
use crate::pupil::PupilLocalizer;
use crate::status_log::{LogEntry, StatusLogger};
use chrono::{DateTime, Local};
use opencv::core::{Mat, Point, Rect};
use opencv::prelude::*;
use parking_lot::RwLock;
use std::sync::Arc;

/// Everything the pipeline needs for one frame
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    /// BGR frame the landmarks refer to
    pub frame: &'a Mat,
    /// Detected faces, primary face first
    pub faces: &'a [FaceLandmarks],
    /// Whether a face was seen, even one without usable landmarks
    pub face_present: bool,
    /// Emotion label for this frame, if one was classified
    pub emotion: Option<Emotion>,
}

impl<'a> FrameInput<'a> {
    /// Input with no emotion; a face counts as present when `faces` is non-empty
    #[must_use]
    pub fn new(frame: &'a Mat, faces: &'a [FaceLandmarks]) -> Self {
        Self {
            frame,
            faces,
            face_present: !faces.is_empty(),
            emotion: None,
        }
    }

    #[must_use]
    pub fn with_emotion(mut self, emotion: Option<Emotion>) -> Self {
        self.emotion = emotion;
        self
    }

    /// Mark a face as seen even if none of them carry landmarks
    #[must_use]
    pub fn with_face_present(mut self, present: bool) -> Self {
        self.face_present = present || !self.faces.is_empty();
        self
    }
}

/// One eye's center, crop bounds and pupil estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeObservation {
    /// Eye center in frame coordinates
    pub center: Point,
    /// Crop taken around the center, clamped to the frame
    pub region: Rect,
    /// Pupil estimate in frame coordinates
    pub pupil: Point,
}

/// Per-face result; an eye is `None` when it could not be processed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceObservation {
    /// Face box from the detector
    pub bbox: Rect,
    /// Viewer's left eye
    pub left: Option<EyeObservation>,
    /// Viewer's right eye
    pub right: Option<EyeObservation>,
}

impl FaceObservation {
    /// Both pupils, when both eyes were processed
    #[must_use]
    pub fn pupils(&self) -> Option<PupilPair> {
        Some(PupilPair::new(self.left?.pupil, self.right?.pupil))
    }
}

/// What happened to the session on one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// Observations for every face, in input order
    pub faces: Vec<FaceObservation>,
    /// Reading status after this frame
    pub status: ReadingStatus,
    /// Whether both pupils of the primary face were found
    pub classified: bool,
    /// Pupil shift behind the classification, if one was computed
    pub displacement: Option<Displacement>,
    /// Whether a reading-log entry was appended
    pub reading_logged: bool,
    /// Whether an emotion-log entry was appended
    pub emotion_logged: bool,
    /// Whether the absence alert is raised after this frame
    pub absence_alert: bool,
    /// Seconds since a face was last seen
    pub absence_secs: f64,
}

/// Selects one of the two status logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// Reading / not-reading log
    Reading,
    /// Emotion label log
    Emotion,
}

/// Owned copy of what the dashboard shows
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    /// Current reading status
    pub status: ReadingStatus,
    /// Most recent emotion label, logged or not
    pub last_emotion: Option<Emotion>,
    /// Latest reading-log entries, oldest first
    pub reading_tail: Vec<LogEntry<ReadingStatus>>,
    /// Latest emotion-log entries, oldest first
    pub emotion_tail: Vec<LogEntry<Emotion>>,
    /// Live engagement metrics
    pub metrics: EngagementMetrics,
    /// Number of saved snapshots
    pub history_len: usize,
    /// Frames seen since the session started
    pub frames_processed: u64,
    /// Seconds since the session started
    pub elapsed_secs: f64,
}

/// Eye crop and pupil search for a frame; holds no session state
#[derive(Debug, Clone, Copy)]
pub struct FrameObserver {
    extractor: EyeRegionExtractor,
    localizer: PupilLocalizer,
}

impl FrameObserver {
    #[must_use]
    pub fn new(extractor: EyeRegionExtractor, localizer: PupilLocalizer) -> Self {
        Self { extractor, localizer }
    }

    /// Observe every face, in input order.
    ///
    /// Eye-level failures are logged and leave that eye `None`.
    #[must_use]
    pub fn observe(&self, frame: &Mat, faces: &[FaceLandmarks]) -> Vec<FaceObservation> {
        faces.iter().map(|face| self.observe_face(frame, face)).collect()
    }

    fn observe_face(&self, frame: &Mat, face: &FaceLandmarks) -> FaceObservation {
        FaceObservation {
            bbox: face.bbox,
            left: self.observe_eye(frame, &face.left_eye),
            right: self.observe_eye(frame, &face.right_eye),
        }
    }

    fn observe_eye(&self, frame: &Mat, points: &[Point]) -> Option<EyeObservation> {
        let region = match self.extractor.extract(frame, points) {
            Ok(region) => region?,
            Err(e) => {
                log::warn!("Eye region extraction failed: {e}");
                return None;
            }
        };

        match self.localizer.locate(&region.crop, region.center) {
            Ok(pupil) => Some(EyeObservation {
                center: region.center,
                region: region.bounds,
                pupil,
            }),
            Err(e) => {
                log::warn!("Pupil localization failed: {e}");
                None
            }
        }
    }
}

/// Tracking state for one viewer
#[derive(Debug)]
pub struct MonitorSession {
    observer: FrameObserver,
    classifier: MotionClassifier,
    reading_log: StatusLogger<ReadingStatus>,
    emotion_log: StatusLogger<Emotion>,
    tally: EngagementTally,
    watchdog: AbsenceWatchdog,
    aggregator: EngagementAggregator,
    history: EngagementHistory,
    started_at: DateTime<Local>,
    tail_len: usize,
    last_emotion: Option<Emotion>,
    frames_processed: u64,
}

impl MonitorSession {
    /// Start a session at `now` with the given settings
    #[must_use]
    pub fn new(config: &Config, now: DateTime<Local>) -> Self {
        log::info!("Starting monitor session");
        Self {
            observer: FrameObserver::new(config.eye_region_extractor(), config.pupil_localizer()),
            classifier: config.motion_classifier(),
            reading_log: StatusLogger::new(config.logging.min_interval_secs),
            emotion_log: StatusLogger::new(config.logging.min_interval_secs),
            tally: EngagementTally::default(),
            watchdog: AbsenceWatchdog::new(now, config.absence.alert_after_secs, config.absence.clear_below_secs),
            aggregator: config.engagement_aggregator(),
            history: EngagementHistory::default(),
            started_at: now,
            tail_len: config.logging.tail_len,
            last_emotion: None,
            frames_processed: 0,
        }
    }

    /// Eye analysis stage of this session
    #[must_use]
    pub fn observer(&self) -> FrameObserver {
        self.observer
    }

    /// Run the pipeline on one frame.
    ///
    /// Eye-level failures are logged and count as missed detections; the
    /// frame itself never fails.
    pub fn process_frame(&mut self, input: &FrameInput<'_>, now: DateTime<Local>) -> FrameReport {
        let faces = self.observer.observe(input.frame, input.faces);
        self.record_frame(faces, input, now)
    }

    /// Fold observations made by [`FrameObserver::observe`] on `input` into
    /// the classifier, logs and absence watchdog
    pub fn record_frame(
        &mut self,
        faces: Vec<FaceObservation>,
        input: &FrameInput<'_>,
        now: DateTime<Local>,
    ) -> FrameReport {
        self.frames_processed += 1;

        let pupils = faces.first().and_then(FaceObservation::pupils);
        let classified = pupils.is_some();
        let status = self.classifier.update(pupils, input.frame.cols());
        let displacement = if classified {
            self.classifier.last_displacement()
        } else {
            None
        };

        let reading_logged = classified && self.reading_log.append_if_due(status, now);
        if reading_logged {
            self.tally.record_reading(status);
            log::debug!("Logged reading status: {status}");
        }

        let emotion_logged = match input.emotion {
            Some(emotion) => {
                self.last_emotion = Some(emotion);
                let logged = self.emotion_log.append_if_due(emotion, now);
                if logged {
                    self.aggregator.record_emotion(&mut self.tally, emotion);
                }
                logged
            }
            None => false,
        };

        let face_present = input.face_present || !input.faces.is_empty();
        let absence_alert = self.watchdog.observe(face_present, now);

        FrameReport {
            faces,
            status,
            classified,
            displacement,
            reading_logged,
            emotion_logged,
            absence_alert,
            absence_secs: self.watchdog.absence_secs(now),
        }
    }

    /// Snapshot of everything the dashboard reads
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Millisecond counts stay far below 2^52
    pub fn view(&self, now: DateTime<Local>) -> SessionView {
        let elapsed_ms = now.signed_duration_since(self.started_at).num_milliseconds().max(0);
        SessionView {
            status: self.classifier.status(),
            last_emotion: self.last_emotion,
            reading_tail: self.reading_log.tail(self.tail_len).to_vec(),
            emotion_tail: self.emotion_log.tail(self.tail_len).to_vec(),
            metrics: self.metrics(now),
            history_len: self.history.len(),
            frames_processed: self.frames_processed,
            elapsed_secs: elapsed_ms as f64 / 1000.0,
        }
    }

    /// Live engagement metrics over the full logs
    #[must_use]
    pub fn metrics(&self, now: DateTime<Local>) -> EngagementMetrics {
        self.aggregator.metrics(&self.tally, &self.watchdog, now)
    }

    /// Clear one of the status logs
    pub fn clear_log(&mut self, kind: LogKind) {
        match kind {
            LogKind::Reading => {
                self.reading_log.clear();
                self.tally.clear_reading();
            }
            LogKind::Emotion => {
                self.emotion_log.clear();
                self.tally.clear_emotions();
            }
        }
        log::info!("Cleared {kind:?} log");
    }

    /// Save the current metrics into the session history
    pub fn save_snapshot(&mut self, now: DateTime<Local>) -> &EngagementSnapshot {
        self.aggregator.save_snapshot(&self.tally, &mut self.history, now)
    }

    /// Saved snapshots
    #[must_use]
    pub fn history(&self) -> &EngagementHistory {
        &self.history
    }

    #[must_use]
    pub fn reading_log(&self) -> &StatusLogger<ReadingStatus> {
        &self.reading_log
    }

    #[must_use]
    pub fn emotion_log(&self) -> &StatusLogger<Emotion> {
        &self.emotion_log
    }

    /// Current reading status
    #[must_use]
    pub fn status(&self) -> ReadingStatus {
        self.classifier.status()
    }
}

/// Session handle shared between the frame loop and UI readers
#[derive(Debug, Clone)]
pub struct SharedSession {
    inner: Arc<RwLock<MonitorSession>>,
    observer: FrameObserver,
}

impl SharedSession {
    #[must_use]
    pub fn new(session: MonitorSession) -> Self {
        Self {
            observer: session.observer(),
            inner: Arc::new(RwLock::new(session)),
        }
    }

    /// Observe eyes lock-free, then record the frame under the write lock
    pub fn process_frame(&self, input: &FrameInput<'_>, now: DateTime<Local>) -> FrameReport {
        let faces = self.observer.observe(input.frame, input.faces);
        self.inner.write().record_frame(faces, input, now)
    }

    /// Dashboard view under one read lock
    #[must_use]
    pub fn view(&self, now: DateTime<Local>) -> SessionView {
        self.inner.read().view(now)
    }

    pub fn clear_log(&self, kind: LogKind) {
        self.inner.write().clear_log(kind);
    }

    /// Save a snapshot and return a copy of it
    pub fn save_snapshot(&self, now: DateTime<Local>) -> EngagementSnapshot {
        self.inner.write().save_snapshot(now).clone()
    }

    /// Copy of the saved snapshots
    #[must_use]
    pub fn history(&self) -> Vec<EngagementSnapshot> {
        self.inner.read().history().snapshots().to_vec()
    }

    /// Copy of the last `n` reading-log entries
    #[must_use]
    pub fn reading_tail(&self, n: usize) -> Vec<LogEntry<ReadingStatus>> {
        self.inner.read().reading_log().tail(n).to_vec()
    }

    /// Copy of the last `n` emotion-log entries
    #[must_use]
    pub fn emotion_tail(&self, n: usize) -> Vec<LogEntry<Emotion>> {
        self.inner.read().emotion_log().tail(n).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_TAIL_LEN;
    use chrono::Duration;
    use opencv::core::{Scalar, CV_8UC3};
    use opencv::imgproc;

    const LEFT_CENTER: Point = Point { x: 100, y: 50 };
    const RIGHT_CENTER: Point = Point { x: 300, y: 50 };

    fn eye_around(c: Point) -> [Point; 6] {
        [
            Point::new(c.x - 10, c.y - 5),
            Point::new(c.x + 10, c.y - 5),
            Point::new(c.x + 10, c.y + 5),
            Point::new(c.x - 10, c.y + 5),
            Point::new(c.x - 5, c.y),
            Point::new(c.x + 5, c.y),
        ]
    }

    fn face() -> FaceLandmarks {
        FaceLandmarks {
            bbox: Rect::new(60, 10, 280, 160),
            left_eye: eye_around(LEFT_CENTER),
            right_eye: eye_around(RIGHT_CENTER),
        }
    }

    fn frame_with_pupils(left: Point, right: Point) -> Mat {
        let mut frame = Mat::new_rows_cols_with_default(200, 400, CV_8UC3, Scalar::all(255.0)).unwrap();
        for p in [left, right] {
            imgproc::circle(&mut frame, p, 2, Scalar::all(0.0), imgproc::FILLED, imgproc::LINE_8, 0).unwrap();
        }
        frame
    }

    fn run(session: &mut MonitorSession, frame: &Mat, faces: &[FaceLandmarks], now: DateTime<Local>) -> FrameReport {
        session.process_frame(&FrameInput::new(frame, faces), now)
    }

    #[test]
    fn test_reading_motion_is_logged() {
        let start = Local::now();
        let mut session = MonitorSession::new(&Config::default(), start);
        let faces = [face()];

        let first = frame_with_pupils(Point::new(95, 50), Point::new(295, 50));
        let report = run(&mut session, &first, &faces, start);
        assert!(report.classified);
        assert_eq!(report.status, ReadingStatus::NotReading);
        assert!(report.displacement.is_none());

        let second = frame_with_pupils(Point::new(99, 50), Point::new(299, 50));
        let report = run(&mut session, &second, &faces, start + Duration::milliseconds(1100));
        assert_eq!(report.status, ReadingStatus::Reading);
        assert!(report.reading_logged);

        let entries = session.reading_log().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].label, ReadingStatus::Reading);
    }

    #[test]
    fn test_pupil_reported_in_frame_coordinates() {
        let start = Local::now();
        let mut session = MonitorSession::new(&Config::default(), start);
        let frame = frame_with_pupils(Point::new(95, 50), Point::new(295, 50));

        let report = run(&mut session, &frame, &[face()], start);
        let left = report.faces[0].left.unwrap();
        assert_eq!(left.center, LEFT_CENTER);
        assert_eq!(left.region, Rect::new(90, 40, 20, 20));
        // Crop-local centroid (5, 10) added to the eye center
        assert!((left.pupil.x - 105).abs() <= 1);
        assert!((left.pupil.y - 60).abs() <= 1);
    }

    #[test]
    fn test_no_face_keeps_status_and_skips_log() {
        let start = Local::now();
        let mut session = MonitorSession::new(&Config::default(), start);
        let faces = [face()];

        run(&mut session, &frame_with_pupils(Point::new(95, 50), Point::new(295, 50)), &faces, start);
        run(
            &mut session,
            &frame_with_pupils(Point::new(99, 50), Point::new(299, 50)),
            &faces,
            start + Duration::seconds(1),
        );
        assert_eq!(session.status(), ReadingStatus::Reading);

        let blank = frame_with_pupils(Point::new(-20, -20), Point::new(-20, -20));
        let report = run(&mut session, &blank, &[], start + Duration::seconds(3));
        assert!(!report.classified);
        assert!(!report.reading_logged);
        assert!(report.faces.is_empty());
        assert_eq!(report.status, ReadingStatus::Reading);
        assert_eq!(session.reading_log().len(), 2);
    }

    #[test]
    fn test_eye_outside_frame_is_missed() {
        let start = Local::now();
        let mut session = MonitorSession::new(&Config::default(), start);
        let mut off_frame = face();
        off_frame.right_eye = eye_around(Point::new(900, 50));

        let frame = frame_with_pupils(Point::new(95, 50), Point::new(295, 50));
        let report = run(&mut session, &frame, &[off_frame], start);
        assert!(report.faces[0].left.is_some());
        assert!(report.faces[0].right.is_none());
        assert!(!report.classified);
        assert!(session.reading_log().is_empty());
    }

    #[test]
    fn test_absence_alert_through_session() {
        let start = Local::now();
        let mut session = MonitorSession::new(&Config::default(), start);
        let frame = frame_with_pupils(Point::new(95, 50), Point::new(295, 50));

        let report = run(&mut session, &frame, &[], start + Duration::seconds(11));
        assert!(report.absence_alert);

        let report = run(&mut session, &frame, &[face()], start + Duration::seconds(12));
        assert!(!report.absence_alert);
        assert!(report.absence_secs.abs() < f64::EPSILON);
    }

    #[test]
    fn test_emotion_logging_and_view() {
        let start = Local::now();
        let mut session = MonitorSession::new(&Config::default(), start);
        let frame = frame_with_pupils(Point::new(95, 50), Point::new(295, 50));
        let faces = [face()];

        for (i, emotion) in [Emotion::Happy, Emotion::Sad, Emotion::Neutral, Emotion::Happy]
            .into_iter()
            .enumerate()
        {
            let input = FrameInput::new(&frame, &faces).with_emotion(Some(emotion));
            let report = session.process_frame(&input, start + Duration::seconds(i64::try_from(i).unwrap()));
            assert!(report.emotion_logged);
        }

        let view = session.view(start + Duration::seconds(4));
        assert_eq!(view.last_emotion, Some(Emotion::Happy));
        assert_eq!(view.emotion_tail.len(), 4);
        assert!((view.metrics.emotion_percentage - 75.0).abs() < 1e-10);
        assert_eq!(view.frames_processed, 4);
        assert!((view.elapsed_secs - 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_clear_log_and_snapshots() {
        let start = Local::now();
        let shared = SharedSession::new(MonitorSession::new(&Config::default(), start));
        let frame = frame_with_pupils(Point::new(95, 50), Point::new(295, 50));
        let faces = [face()];

        let input = FrameInput::new(&frame, &faces).with_emotion(Some(Emotion::Happy));
        shared.process_frame(&input, start);
        let snapshot = shared.save_snapshot(start);
        assert!((snapshot.emotion_percentage - 100.0).abs() < 1e-10);

        shared.clear_log(LogKind::Emotion);
        assert!(shared.emotion_tail(10).is_empty());
        assert_eq!(shared.reading_tail(10).len(), 1);

        let history = shared.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0], snapshot);
        assert_eq!(shared.view(start).history_len, 1);
    }

    #[test]
    fn test_shared_session_across_threads() {
        let start = Local::now();
        let shared = SharedSession::new(MonitorSession::new(&Config::default(), start));
        let reader = shared.clone();

        let handle = std::thread::spawn(move || reader.view(start).frames_processed);
        let frame = frame_with_pupils(Point::new(95, 50), Point::new(295, 50));
        shared.process_frame(&FrameInput::new(&frame, &[]), start);

        assert!(handle.join().unwrap() <= 1);
        assert_eq!(shared.view(start).frames_processed, 1);
    }

    #[test]
    fn test_face_without_landmarks_is_not_absent() {
        let start = Local::now();
        let mut session = MonitorSession::new(&Config::default(), start);
        let frame = frame_with_pupils(Point::new(95, 50), Point::new(295, 50));

        let input = FrameInput::new(&frame, &[]).with_face_present(true);
        let report = session.process_frame(&input, start + Duration::seconds(11));
        assert!(!report.absence_alert);
        assert!(report.absence_secs.abs() < f64::EPSILON);
        assert!(!report.classified);

        let report = run(&mut session, &frame, &[], start + Duration::seconds(22));
        assert!(report.absence_alert);
    }

    #[test]
    fn test_running_metrics_match_logs_after_clear() {
        let start = Local::now();
        let mut config = Config::default();
        config.logging.min_interval_secs = 0.0;
        let mut session = MonitorSession::new(&config, start);
        let faces = [face()];
        let emotions = [Emotion::Happy, Emotion::Sad, Emotion::Angry, Emotion::Neutral];

        for i in 0..20 {
            let shift = if i % 3 == 0 { 0 } else { 4 * (i % 2) };
            let frame = frame_with_pupils(Point::new(95 + shift, 50), Point::new(295 + shift, 50));
            let input = FrameInput::new(&frame, &faces).with_emotion(Some(emotions[i as usize % emotions.len()]));
            session.process_frame(&input, start + Duration::milliseconds(i64::from(i) * 100));
        }
        session.clear_log(LogKind::Emotion);
        let frame = frame_with_pupils(Point::new(95, 50), Point::new(295, 50));
        let input = FrameInput::new(&frame, &faces).with_emotion(Some(Emotion::Sad));
        session.process_frame(&input, start + Duration::seconds(3));

        let now = start + Duration::seconds(3);
        let aggregator = EngagementAggregator::default();
        let rescanned = aggregator.tally(session.reading_log().entries(), session.emotion_log().entries());
        let metrics = session.metrics(now);
        assert!((metrics.reading_percentage - rescanned.reading_percentage()).abs() < 1e-10);
        assert!(metrics.emotion_percentage.abs() < f64::EPSILON);
        assert_eq!(&metrics.emotion_distribution, rescanned.emotion_distribution());
        assert_eq!(session.emotion_log().len(), 1);
    }

    #[test]
    fn test_eye_analysis_runs_while_readers_hold_the_lock() {
        let start = Local::now();
        let shared = SharedSession::new(MonitorSession::new(&Config::default(), start));

        let guard = shared.inner.read();
        let observer = shared.observer;
        let faces = std::thread::spawn(move || {
            let frame = frame_with_pupils(Point::new(95, 50), Point::new(295, 50));
            observer.observe(&frame, &[face()])
        })
        .join()
        .unwrap();
        assert!(faces[0].pupils().is_some());
        assert_eq!(guard.view(start).frames_processed, 0);
        drop(guard);

        let frame = frame_with_pupils(Point::new(95, 50), Point::new(295, 50));
        let report = shared.inner.write().record_frame(faces, &FrameInput::new(&frame, &[face()]), start);
        assert!(report.classified);
        assert_eq!(shared.view(start).frames_processed, 1);
    }

    #[test]
    fn test_frames_progress_under_constant_view_polling() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let start = Local::now();
        let mut config = Config::default();
        config.logging.min_interval_secs = 0.0;
        let shared = SharedSession::new(MonitorSession::new(&config, start));
        let stop = Arc::new(AtomicBool::new(false));

        let poller = {
            let shared = shared.clone();
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut polls = 0u64;
                loop {
                    let view = shared.view(start);
                    assert!(view.reading_tail.len() <= DEFAULT_TAIL_LEN);
                    polls += 1;
                    if stop.load(Ordering::Relaxed) {
                        break polls;
                    }
                }
            })
        };

        let faces = [face()];
        for i in 0..200 {
            let shift = 4 * (i % 2);
            let frame = frame_with_pupils(Point::new(95 + shift, 50), Point::new(295 + shift, 50));
            let input = FrameInput::new(&frame, &faces).with_emotion(Some(Emotion::Happy));
            shared.process_frame(&input, start + Duration::milliseconds(i64::from(i) * 10));
        }
        stop.store(true, Ordering::Relaxed);
        assert!(poller.join().unwrap() > 0);

        let view = shared.view(start + Duration::seconds(2));
        assert_eq!(view.frames_processed, 200);
        assert_eq!(shared.reading_tail(usize::MAX).len(), 200);
        assert!((view.metrics.emotion_percentage - 100.0).abs() < 1e-10);
    }
}
