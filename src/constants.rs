//! Constants used throughout the application

/// Number of facial landmarks produced by the landmark model
pub const NUM_FACIAL_LANDMARKS: usize = 68;

/// Number of landmarks outlining one eye
pub const EYE_POINT_COUNT: usize = 6;

/// First landmark index of the viewer's left eye (iBUG 68-point layout)
pub const LEFT_EYE_START: usize = 36;

/// First landmark index of the viewer's right eye (iBUG 68-point layout)
pub const RIGHT_EYE_START: usize = 42;

/// Half side of the square crop taken around each eye center, in pixels
pub const DEFAULT_EYE_HALF_WINDOW: i32 = 10;

/// Grayscale cutoff; pixels at or below it are treated as pupil
pub const DEFAULT_PUPIL_THRESHOLD: f64 = 50.0;

/// Minimum mean horizontal pupil displacement for a reading saccade
pub const DEFAULT_MIN_HORIZONTAL_SHIFT: f64 = 2.0;

/// Maximum horizontal displacement is `frame_width / divisor`
pub const DEFAULT_MAX_HORIZONTAL_DIVISOR: i32 = 10;

/// Maximum mean vertical pupil displacement while reading
pub const DEFAULT_MAX_VERTICAL_SHIFT: f64 = 5.0;

/// Consecutive frames without both pupils before the classifier forgets them
pub const DEFAULT_STALE_RESET_FRAMES: u32 = 30;

/// Minimum wall-clock gap between two log entries, in seconds
pub const DEFAULT_LOG_INTERVAL_SECS: f64 = 1.0;

/// Number of entries returned by a default tail query
pub const DEFAULT_TAIL_LEN: usize = 10;

/// Absence longer than this raises the alert, in seconds
pub const DEFAULT_ABSENCE_ALERT_SECS: f64 = 10.0;

/// Absence shorter than this clears a raised alert, in seconds
pub const DEFAULT_ABSENCE_CLEAR_SECS: f64 = 2.0;

/// Emotion model input side length (48x48 grayscale)
pub const EMOTION_INPUT_SIZE: i32 = 48;

/// Image normalization constants for face detection
pub const IMAGE_NORMALIZATION_OFFSET: f32 = 127.5;
pub const IMAGE_NORMALIZATION_SCALE: f32 = 128.0;

/// Relative expansion applied to face boxes before landmark detection
pub const FACE_BOX_EXPANSION: f32 = 0.2;

