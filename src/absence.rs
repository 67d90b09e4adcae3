//! Face-absence watchdog with hysteresis.
//!
//! The alert rises once the viewer has been gone longer than `alert_after`
//! and falls only after a fresh sighting brings the absence below
//! `clear_below`. Absences in between leave the flag as it was.

use crate::constants::{DEFAULT_ABSENCE_ALERT_SECS, DEFAULT_ABSENCE_CLEAR_SECS};
use chrono::{DateTime, Local};

/// Tracks time since the last detected face
#[derive(Debug, Clone)]
pub struct AbsenceWatchdog {
    last_face_seen: DateTime<Local>,
    alert: bool,
    alert_after_secs: f64,
    clear_below_secs: f64,
}

impl AbsenceWatchdog {
    /// Start watching at `started_at`, which counts as the last sighting
    #[must_use]
    pub fn new(started_at: DateTime<Local>, alert_after_secs: f64, clear_below_secs: f64) -> Self {
        Self {
            last_face_seen: started_at,
            alert: false,
            alert_after_secs,
            clear_below_secs,
        }
    }

    /// Watchdog with the default 10 s / 2 s thresholds
    #[must_use]
    pub fn with_defaults(started_at: DateTime<Local>) -> Self {
        Self::new(started_at, DEFAULT_ABSENCE_ALERT_SECS, DEFAULT_ABSENCE_CLEAR_SECS)
    }

    /// Record that at least one face was detected at `now`
    pub fn face_seen(&mut self, now: DateTime<Local>) {
        if now > self.last_face_seen {
            self.last_face_seen = now;
        }
    }

    /// Seconds since the last sighting, never negative
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Millisecond counts stay far below 2^52
    pub fn absence_secs(&self, now: DateTime<Local>) -> f64 {
        let millis = now.signed_duration_since(self.last_face_seen).num_milliseconds();
        millis.max(0) as f64 / 1000.0
    }

    /// Re-evaluate the alert flag at `now` and return it
    pub fn evaluate(&mut self, now: DateTime<Local>) -> bool {
        let absence = self.absence_secs(now);

        if !self.alert && absence > self.alert_after_secs {
            self.alert = true;
            log::warn!("Viewer absent for {absence:.1}s, raising absence alert");
        } else if self.alert && absence < self.clear_below_secs {
            self.alert = false;
            log::info!("Viewer is back, clearing absence alert");
        }

        self.alert
    }

    /// Feed one frame's detection result and evaluate
    pub fn observe(&mut self, face_detected: bool, now: DateTime<Local>) -> bool {
        if face_detected {
            self.face_seen(now);
        }
        self.evaluate(now)
    }

    /// Current alert flag, as of the last evaluation
    #[must_use]
    pub fn is_alert(&self) -> bool {
        self.alert
    }

    /// Time of the last sighting
    #[must_use]
    pub fn last_face_seen(&self) -> DateTime<Local> {
        self.last_face_seen
    }
}
