//! Reading detection from frame-to-frame pupil displacement.
//!
//! Reading shows up as small, bounded horizontal pupil shifts with almost no
//! vertical motion. The classifier compares each frame's pupils with the
//! previous pair and keeps nothing else.

use crate::constants::{
    DEFAULT_MAX_HORIZONTAL_DIVISOR, DEFAULT_MAX_VERTICAL_SHIFT, DEFAULT_MIN_HORIZONTAL_SHIFT,
    DEFAULT_STALE_RESET_FRAMES,
};
use opencv::core::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of one classification step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingStatus {
    /// Eye motion matches a reading pattern
    Reading,
    /// Anything else, including "unknown"
    #[default]
    NotReading,
}

impl ReadingStatus {
    /// Whether this is `Reading`
    #[must_use]
    pub fn is_reading(self) -> bool {
        self == Self::Reading
    }
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reading => write!(f, "Reading"),
            Self::NotReading => write!(f, "Not Reading"),
        }
    }
}

/// Pupil positions of both eyes in one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PupilPair {
    /// Left pupil, frame coordinates
    pub left: Point,
    /// Right pupil, frame coordinates
    pub right: Point,
}

impl PupilPair {
    /// Pair up two pupil positions
    #[must_use]
    pub fn new(left: Point, right: Point) -> Self {
        Self { left, right }
    }
}

/// Mean absolute pupil displacement between two frames
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Displacement {
    /// Mean of the two eyes' horizontal shifts
    pub horizontal: f64,
    /// Mean of the two eyes' vertical shifts
    pub vertical: f64,
}

impl Displacement {
    /// Displacement from `previous` to `current`
    #[must_use]
    pub fn between(previous: &PupilPair, current: &PupilPair) -> Self {
        let shift = |a: i32, b: i32| f64::from(a.abs_diff(b));
        Self {
            horizontal: (shift(current.left.x, previous.left.x) + shift(current.right.x, previous.right.x)) / 2.0,
            vertical: (shift(current.left.y, previous.left.y) + shift(current.right.y, previous.right.y)) / 2.0,
        }
    }
}

/// Stateful reading classifier holding the previous pupil pair
#[derive(Debug, Clone)]
pub struct MotionClassifier {
    min_horizontal: f64,
    max_horizontal_divisor: i32,
    max_vertical: f64,
    stale_reset_frames: u32,
    previous: Option<PupilPair>,
    missed_frames: u32,
    status: ReadingStatus,
    last_displacement: Option<Displacement>,
}

impl MotionClassifier {
    /// Create a classifier.
    ///
    /// The horizontal upper bound is `frame_width / max_horizontal_divisor`
    /// (integer division). After `stale_reset_frames` consecutive frames
    /// without both pupils the previous pair is forgotten; `0` never forgets.
    #[must_use]
    pub fn new(min_horizontal: f64, max_horizontal_divisor: i32, max_vertical: f64, stale_reset_frames: u32) -> Self {
        Self {
            min_horizontal,
            max_horizontal_divisor,
            max_vertical,
            stale_reset_frames,
            previous: None,
            missed_frames: 0,
            status: ReadingStatus::NotReading,
            last_displacement: None,
        }
    }

    /// Horizontal upper bound for a frame of the given width
    #[must_use]
    pub fn max_horizontal(&self, frame_width: i32) -> f64 {
        f64::from(frame_width.checked_div(self.max_horizontal_divisor).unwrap_or(0))
    }

    /// Classify `current` against the stored pair without changing state.
    ///
    /// Without a previous pair the answer is `NotReading`.
    #[must_use]
    pub fn classify(&self, current: &PupilPair, frame_width: i32) -> ReadingStatus {
        self.previous
            .map(|previous| self.decide(&Displacement::between(&previous, current), frame_width))
            .unwrap_or(ReadingStatus::NotReading)
    }

    fn decide(&self, displacement: &Displacement, frame_width: i32) -> ReadingStatus {
        let horizontal_ok = (self.min_horizontal..=self.max_horizontal(frame_width)).contains(&displacement.horizontal);
        if horizontal_ok && displacement.vertical <= self.max_vertical {
            ReadingStatus::Reading
        } else {
            ReadingStatus::NotReading
        }
    }

    /// Advance one frame.
    ///
    /// `None` means at least one eye was missed: the status is frozen and
    /// the previous pair is kept until the stale limit is reached.
    pub fn update(&mut self, current: Option<PupilPair>, frame_width: i32) -> ReadingStatus {
        let Some(current) = current else {
            self.missed_frames = self.missed_frames.saturating_add(1);
            if self.stale_reset_frames > 0 && self.missed_frames == self.stale_reset_frames && self.previous.is_some() {
                log::debug!("Pupils missing for {} frames, forgetting previous position", self.missed_frames);
                self.previous = None;
                self.last_displacement = None;
            }
            return self.status;
        };

        self.missed_frames = 0;
        self.last_displacement = self.previous.map(|previous| Displacement::between(&previous, &current));
        self.status = self
            .last_displacement
            .map(|d| self.decide(&d, frame_width))
            .unwrap_or(ReadingStatus::NotReading);
        self.previous = Some(current);
        self.status
    }

    /// Most recent classification
    #[must_use]
    pub fn status(&self) -> ReadingStatus {
        self.status
    }

    /// Stored pupil pair, if any
    #[must_use]
    pub fn previous(&self) -> Option<PupilPair> {
        self.previous
    }

    /// Displacement computed on the last classified frame
    #[must_use]
    pub fn last_displacement(&self) -> Option<Displacement> {
        self.last_displacement
    }

    /// Consecutive frames without both pupils
    #[must_use]
    pub fn missed_frames(&self) -> u32 {
        self.missed_frames
    }

    /// Forget all state
    pub fn reset(&mut self) {
        self.previous = None;
        self.missed_frames = 0;
        self.status = ReadingStatus::NotReading;
        self.last_displacement = None;
    }
}

impl Default for MotionClassifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_MIN_HORIZONTAL_SHIFT,
            DEFAULT_MAX_HORIZONTAL_DIVISOR,
            DEFAULT_MAX_VERTICAL_SHIFT,
            DEFAULT_STALE_RESET_FRAMES,
        )
    }
}
