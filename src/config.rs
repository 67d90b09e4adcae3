//! Configuration management for the reading monitor

use crate::constants::{
    DEFAULT_ABSENCE_ALERT_SECS, DEFAULT_ABSENCE_CLEAR_SECS, DEFAULT_EYE_HALF_WINDOW, DEFAULT_LOG_INTERVAL_SECS,
    DEFAULT_MAX_HORIZONTAL_DIVISOR, DEFAULT_MAX_VERTICAL_SHIFT, DEFAULT_MIN_HORIZONTAL_SHIFT,
    DEFAULT_PUPIL_THRESHOLD, DEFAULT_STALE_RESET_FRAMES, DEFAULT_TAIL_LEN, FACE_BOX_EXPANSION,
};
use crate::emotion::Emotion;
use crate::engagement::EngagementAggregator;
use crate::eye_region::EyeRegionExtractor;
use crate::motion_classifier::MotionClassifier;
use crate::pupil::PupilLocalizer;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model configuration
    pub models: ModelConfig,

    /// Face detection configuration
    pub face_detection: FaceDetectionConfig,

    /// Eye crop and pupil segmentation
    pub eye: EyeConfig,

    /// Reading classifier thresholds
    pub motion: MotionConfig,

    /// Status log rate limiting
    pub logging: LoggingConfig,

    /// Absence alert thresholds
    pub absence: AbsenceConfig,

    /// Engagement metrics
    pub engagement: EngagementConfig,

    /// Display configuration
    pub display: DisplayConfig,
}

/// Model file paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to face detection ONNX model
    pub face_detector: PathBuf,

    /// Path to facial landmarks ONNX model
    pub face_landmarks: PathBuf,

    /// Path to emotion ONNX model; emotion tracking is off without it
    pub emotion: Option<PathBuf>,
}

/// Face detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceDetectionConfig {
    /// Confidence threshold for face detection (0.0-1.0)
    pub confidence_threshold: f32,

    /// IOU threshold for non-maximum suppression (0.0-1.0)
    pub iou_threshold: f32,

    /// Maximum number of faces to keep per frame
    pub max_faces: usize,

    /// Face region expansion factor before landmark detection
    pub bbox_expansion: f32,
}

/// Eye crop and pupil segmentation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EyeConfig {
    /// Half side of the square eye crop, pixels
    pub half_window: i32,

    /// Grayscale cutoff for the pupil (0-255)
    pub pupil_threshold: f64,
}

/// Reading classifier thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Minimum mean horizontal pupil shift, pixels
    pub min_horizontal_shift: f64,

    /// Maximum horizontal shift is frame width divided by this
    pub max_horizontal_divisor: i32,

    /// Maximum mean vertical pupil shift, pixels
    pub max_vertical_shift: f64,

    /// Missed frames before the previous pupils are forgotten (0 = never)
    pub stale_reset_frames: u32,
}

/// Status log rate limiting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum seconds between two entries of the same log
    pub min_interval_secs: f64,

    /// Entries shown by default tail queries
    pub tail_len: usize,
}

/// Absence alert thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AbsenceConfig {
    /// Absence that raises the alert, seconds
    pub alert_after_secs: f64,

    /// Absence below which a raised alert clears, seconds
    pub clear_below_secs: f64,
}

/// Engagement metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementConfig {
    /// Labels counted towards the emotion percentage
    pub positive_emotions: Vec<Emotion>,

    /// Minimum softmax probability to accept an emotion label
    pub emotion_min_confidence: f32,
}

/// Display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Show the camera window
    pub show_window: bool,

    /// Draw eye centers and pupils
    pub show_eyes: bool,

    /// Flip image horizontally
    pub flip_x: bool,

    /// Flip image vertically
    pub flip_y: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            face_detector: PathBuf::from("assets/face_detector.onnx"),
            face_landmarks: PathBuf::from("assets/face_landmarks.onnx"),
            emotion: None,
        }
    }
}

impl Default for FaceDetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            iou_threshold: 0.4,
            max_faces: 4,
            bbox_expansion: FACE_BOX_EXPANSION,
        }
    }
}

impl Default for EyeConfig {
    fn default() -> Self {
        Self {
            half_window: DEFAULT_EYE_HALF_WINDOW,
            pupil_threshold: DEFAULT_PUPIL_THRESHOLD,
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            min_horizontal_shift: DEFAULT_MIN_HORIZONTAL_SHIFT,
            max_horizontal_divisor: DEFAULT_MAX_HORIZONTAL_DIVISOR,
            max_vertical_shift: DEFAULT_MAX_VERTICAL_SHIFT,
            stale_reset_frames: DEFAULT_STALE_RESET_FRAMES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: DEFAULT_LOG_INTERVAL_SECS,
            tail_len: DEFAULT_TAIL_LEN,
        }
    }
}

impl Default for AbsenceConfig {
    fn default() -> Self {
        Self {
            alert_after_secs: DEFAULT_ABSENCE_ALERT_SECS,
            clear_below_secs: DEFAULT_ABSENCE_CLEAR_SECS,
        }
    }
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            positive_emotions: vec![Emotion::Happy, Emotion::Neutral],
            emotion_min_confidence: 0.0,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_window: true,
            show_eyes: true,
            flip_x: false,
            flip_y: false,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Eye-region extractor for these settings
    #[must_use]
    pub fn eye_region_extractor(&self) -> EyeRegionExtractor {
        EyeRegionExtractor::new(self.eye.half_window)
    }

    /// Pupil localizer for these settings
    #[must_use]
    pub fn pupil_localizer(&self) -> PupilLocalizer {
        PupilLocalizer::new(self.eye.pupil_threshold)
    }

    /// Motion classifier for these settings
    #[must_use]
    pub fn motion_classifier(&self) -> MotionClassifier {
        MotionClassifier::new(
            self.motion.min_horizontal_shift,
            self.motion.max_horizontal_divisor,
            self.motion.max_vertical_shift,
            self.motion.stale_reset_frames,
        )
    }

    /// Engagement aggregator for these settings
    #[must_use]
    pub fn engagement_aggregator(&self) -> EngagementAggregator {
        EngagementAggregator::new(self.engagement.positive_emotions.iter().copied())
    }

    /// Validate tuning parameters
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first invalid value.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(Error::ConfigError(msg.to_string()));
        // NaN fails both checks
        let non_negative = |v: f64| v.is_finite() && v >= 0.0;

        if !(0.0..=1.0).contains(&self.face_detection.confidence_threshold) {
            return fail("Confidence threshold must be between 0.0 and 1.0");
        }
        if !(0.0..=1.0).contains(&self.face_detection.iou_threshold) {
            return fail("IOU threshold must be between 0.0 and 1.0");
        }
        if self.face_detection.max_faces == 0 {
            return fail("max_faces must be greater than 0");
        }
        if self.eye.half_window <= 0 {
            return fail("Eye half window must be greater than 0");
        }
        if !(0.0..=255.0).contains(&self.eye.pupil_threshold) {
            return fail("Pupil threshold must be between 0 and 255");
        }
        if self.motion.max_horizontal_divisor <= 0 {
            return fail("max_horizontal_divisor must be greater than 0");
        }
        if !non_negative(self.motion.min_horizontal_shift) || !non_negative(self.motion.max_vertical_shift) {
            return fail("Pupil shift bounds must be finite and not negative");
        }
        if !(0.0..=3600.0).contains(&self.logging.min_interval_secs) {
            return fail("Log interval must be between 0 and 3600 seconds");
        }
        let absence = &self.absence;
        if !non_negative(absence.clear_below_secs)
            || !non_negative(absence.alert_after_secs)
            || absence.clear_below_secs >= absence.alert_after_secs
        {
            return fail("Absence clear threshold must be non-negative and below the alert threshold");
        }
        if !(0.0..=1.0).contains(&self.engagement.emotion_min_confidence) {
            return fail("Emotion confidence must be between 0.0 and 1.0");
        }

        Ok(())
    }

    /// Check that every configured model file exists
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first missing file.
    pub fn validate_models(&self) -> Result<()> {
        let required = [
            ("Face detector model", Some(&self.models.face_detector)),
            ("Face landmarks model", Some(&self.models.face_landmarks)),
            ("Emotion model", self.models.emotion.as_ref()),
        ];
        for (what, path) in required {
            if let Some(path) = path {
                if !path.exists() {
                    return Err(Error::ConfigError(format!("{what} not found: {}", path.display())));
                }
            }
        }
        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Reading Monitor Configuration

# Model paths
models:
  face_detector: "assets/face_detector.onnx"
  face_landmarks: "assets/face_landmarks.onnx"
  emotion: "assets/emotion.onnx"

# Face detection parameters
face_detection:
  confidence_threshold: 0.5
  iou_threshold: 0.4
  max_faces: 4
  bbox_expansion: 0.2

# Eye crop and pupil segmentation
eye:
  half_window: 10
  pupil_threshold: 50.0

# Reading classifier
motion:
  min_horizontal_shift: 2.0
  max_horizontal_divisor: 10
  max_vertical_shift: 5.0
  stale_reset_frames: 30

# Status logs
logging:
  min_interval_secs: 1.0
  tail_len: 10

# Absence alert
absence:
  alert_after_secs: 10.0
  clear_below_secs: 2.0

# Engagement metrics
engagement:
  positive_emotions: [happy, neutral]
  emotion_min_confidence: 0.0

# Display settings
display:
  show_window: true
  show_eyes: true
  flip_x: false
  flip_y: false
"#;
