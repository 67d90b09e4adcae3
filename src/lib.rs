//! Reading and attentiveness monitor for a single webcam viewer.
//!
//! Per video frame the library:
//! 1. Takes the 68-point facial landmarks of each detected face
//! 2. Cuts a small window around each eye and finds the pupil as the
//!    centroid of the largest dark blob
//! 3. Classifies the frame-to-frame pupil motion as reading or not
//! 4. Logs that status at most once per interval, together with an
//!    optional emotion label
//! 5. Raises an alert when no face has been seen for too long
//!
//! Engagement percentages and saved snapshots are computed from the logs on
//! demand.
//!
//! # Examples
//!
//! ## Driving a session without a camera
//!
//! ```no_run
//! use chrono::Local;
//! use opencv::core::{Mat, Point, Rect, Scalar, CV_8UC3};
//! use reading_monitor::{
//!     config::Config,
//!     landmarks::FaceLandmarks,
//!     session::{FrameInput, MonitorSession},
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = MonitorSession::new(&Config::default(), Local::now());
//!
//! let frame = Mat::new_rows_cols_with_default(480, 640, CV_8UC3, Scalar::all(255.0))?;
//! let face = FaceLandmarks {
//!     bbox: Rect::new(200, 100, 240, 240),
//!     left_eye: [Point::new(260, 200); 6],
//!     right_eye: [Point::new(380, 200); 6],
//! };
//!
//! let report = session.process_frame(
//!     &FrameInput::new(&frame, &[face]),
//!     Local::now(),
//! );
//! println!("Status: {}", report.status);
//!
//! let view = session.view(Local::now());
//! println!("Reading {:.1}%", view.metrics.reading_percentage);
//! # Ok(())
//! # }
//! ```
//!
//! ## Complete Pipeline Example
//!
//! ```no_run
//! use chrono::Local;
//! use opencv::{core::Mat, prelude::*, videoio};
//! use reading_monitor::{
//!     config::Config,
//!     face_detection::FaceDetector,
//!     landmarks::LandmarkDetector,
//!     mark_detection::{MarkDetector, OnnxLandmarkDetector},
//!     session::{FrameInput, MonitorSession},
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let face_detector = FaceDetector::new(&config.models.face_detector, 0.5, 0.4)?;
//! let mark_detector = MarkDetector::new(&config.models.face_landmarks)?;
//! let mut detector = OnnxLandmarkDetector::new(face_detector, mark_detector, 0.2, 1);
//! let mut session = MonitorSession::new(&config, Local::now());
//!
//! let mut cap = videoio::VideoCapture::new(0, videoio::CAP_ANY)?;
//! let mut frame = Mat::default();
//! while cap.read(&mut frame)? {
//!     let detections = detector.detect(&frame)?;
//!     let input = FrameInput::new(&frame, &detections.faces).with_face_present(detections.face_present());
//!     let report = session.process_frame(&input, Local::now());
//!     if report.absence_alert {
//!         println!("Viewer absent for {:.0}s", report.absence_secs);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Face-absence watchdog with hysteresis
pub mod absence;

/// Main application module
pub mod app;

/// Configuration management
pub mod config;

/// Constants used throughout the application
pub mod constants;

/// Emotion labels and classifiers
pub mod emotion;

/// Engagement percentages and history snapshots
pub mod engagement;

/// Error types and result handling
pub mod error;

/// Eye window extraction around landmark points
pub mod eye_region;

/// Face detection module for finding faces in images
pub mod face_detection;

/// Fixed-shape landmark records and the detector seam
pub mod landmarks;

/// Facial landmark detection module for finding 68 key points
pub mod mark_detection;

/// Reading classification from pupil motion
pub mod motion_classifier;

/// Frame annotation
pub mod overlay;

/// Pupil localization by thresholding and contour moments
pub mod pupil;

/// Per-session state and the per-frame pipeline
pub mod session;

/// Rate-limited status logs
pub mod status_log;

/// Utility functions for rectangles and numeric conversions
pub mod utils;

pub use error::{Error, Result};
