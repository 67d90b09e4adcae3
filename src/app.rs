//! Main application module for the reading monitor.

use crate::{
    config::Config,
    emotion::{Emotion, EmotionClassifier, OnnxEmotionClassifier},
    error::Result,
    face_detection::FaceDetector,
    landmarks::{Detections, FaceLandmarks, LandmarkDetector},
    mark_detection::{MarkDetector, OnnxLandmarkDetector},
    overlay::{self, OverlayOptions},
    session::{FrameInput, LogKind, MonitorSession, SharedSession},
    utils::clamp_rect,
};
use chrono::Local;
use log::{info, warn};
use opencv::{
    core::Mat,
    highgui::{self, WINDOW_NORMAL},
    prelude::*,
    videoio::{self, VideoCapture, CAP_PROP_BUFFERSIZE},
};
use std::time::{Duration, Instant};

const WINDOW_NAME: &str = "Reading Monitor";

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Camera index or video file path
    pub video_source: VideoSource,
    /// GUI display mode
    pub gui_mode: GuiMode,
    /// Image inversion mode
    pub invert_mode: InvertMode,
    /// Models and tracking parameters
    pub settings: Config,
}

/// Video source type
#[derive(Debug, Clone, PartialEq)]
pub enum VideoSource {
    /// Webcam index
    Camera(i32),
    /// Video file path
    File(String),
}

/// GUI display mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GuiMode {
    /// Show the annotated camera window
    Camera,
    /// No GUI (headless)
    None,
}

/// Image inversion mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvertMode {
    /// No inversion
    None,
    /// Mirror horizontally
    X,
    /// Flip vertically
    Y,
    /// Both horizontal and vertical
    XY,
}

impl InvertMode {
    /// Mode for a pair of flip flags
    #[must_use]
    pub fn from_flags(flip_x: bool, flip_y: bool) -> Self {
        match (flip_x, flip_y) {
            (false, false) => Self::None,
            (true, false) => Self::X,
            (false, true) => Self::Y,
            (true, true) => Self::XY,
        }
    }

    fn flip_code(self) -> Option<i32> {
        match self {
            Self::None => None,
            Self::X => Some(1),
            Self::Y => Some(0),
            Self::XY => Some(-1),
        }
    }
}

/// What the frame loop should do after a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Continue,
    Quit,
}

/// Mirror `frame` in place
///
/// # Errors
///
/// Returns an error if `OpenCV` fails to flip the image.
pub fn apply_inversion(frame: &mut Mat, mode: InvertMode) -> Result<()> {
    if let Some(code) = mode.flip_code() {
        let temp = frame.clone();
        opencv::core::flip(&temp, frame, code)?;
    }
    Ok(())
}

/// Face with the largest bounding box
#[must_use]
pub fn largest_face(faces: &[FaceLandmarks]) -> Option<&FaceLandmarks> {
    faces.iter().max_by_key(|face| face.area())
}

/// Run the landmark detector; a failed frame counts as one with no faces
pub fn detect_faces(detector: &mut dyn LandmarkDetector, frame: &Mat) -> Detections {
    detector.detect(frame).unwrap_or_else(|e| {
        warn!("Landmark detection failed: {e}");
        Detections::default()
    })
}

/// Classify the emotion of the largest face; any failure counts as no label
pub fn classify_emotion(
    classifier: &mut dyn EmotionClassifier,
    frame: &Mat,
    faces: &[FaceLandmarks],
) -> Option<Emotion> {
    let face = largest_face(faces)?;
    let bounds = clamp_rect(face.bbox, frame.cols(), frame.rows())?;

    let result = Mat::roi(frame, bounds)
        .and_then(|roi| roi.try_clone())
        .map_err(crate::Error::from)
        .and_then(|crop| classifier.classify(&crop));

    match result {
        Ok(emotion) => emotion,
        Err(e) => {
            warn!("Emotion classification failed: {e}");
            None
        }
    }
}

/// Apply a dashboard key command to the session
pub fn handle_key(key: i32, session: &SharedSession) -> KeyAction {
    let Some(key) = u8::try_from(key).ok().map(char::from) else {
        return KeyAction::Continue;
    };

    match key {
        'q' | '\u{1b}' => {
            info!("Exit requested by user");
            return KeyAction::Quit;
        }
        'c' => session.clear_log(LogKind::Reading),
        'e' => session.clear_log(LogKind::Emotion),
        's' => {
            let snapshot = session.save_snapshot(Local::now());
            info!(
                "Snapshot {}: reading {:.1}%, positive emotion {:.1}%",
                snapshot.timestamp.format("%H:%M:%S"),
                snapshot.reading_percentage,
                snapshot.emotion_percentage
            );
        }
        _ => {}
    }
    KeyAction::Continue
}

/// Main application struct
pub struct MonitorApp {
    config: AppConfig,
    detector: Box<dyn LandmarkDetector>,
    emotion_classifier: Option<Box<dyn EmotionClassifier>>,
    session: SharedSession,
    video_capture: VideoCapture,
}

impl MonitorApp {
    /// Open the video source and load every model
    ///
    /// # Errors
    ///
    /// Returns an error if the video source cannot be opened, a model fails
    /// to load, or the GUI window cannot be created.
    pub fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing reading monitor");

        let video_capture = match &config.video_source {
            VideoSource::Camera(index) => {
                info!("Opening camera {index}");
                let mut cap = VideoCapture::new(*index, videoio::CAP_ANY)?;
                cap.set(CAP_PROP_BUFFERSIZE, 1.0)?;
                cap
            }
            VideoSource::File(path) => {
                info!("Opening video file: {path}");
                VideoCapture::from_file(path, videoio::CAP_ANY)?
            }
        };
        if !video_capture.is_opened()? {
            return Err(crate::Error::VideoSourceError(format!(
                "Could not open {:?}",
                config.video_source
            )));
        }

        let settings = &config.settings;
        let face_detector = FaceDetector::new(
            &settings.models.face_detector,
            settings.face_detection.confidence_threshold,
            settings.face_detection.iou_threshold,
        )?;
        let mark_detector = MarkDetector::new(&settings.models.face_landmarks)?;
        let detector = Box::new(OnnxLandmarkDetector::new(
            face_detector,
            mark_detector,
            settings.face_detection.bbox_expansion,
            settings.face_detection.max_faces,
        ));

        let emotion_classifier: Option<Box<dyn EmotionClassifier>> = match &settings.models.emotion {
            Some(path) => Some(Box::new(OnnxEmotionClassifier::new(
                path,
                settings.engagement.emotion_min_confidence,
            )?)),
            None => {
                info!("No emotion model configured, emotion tracking disabled");
                None
            }
        };

        let session = SharedSession::new(MonitorSession::new(settings, Local::now()));

        if config.gui_mode == GuiMode::Camera {
            highgui::named_window(WINDOW_NAME, WINDOW_NORMAL)?;
        }

        Ok(Self {
            config,
            detector,
            emotion_classifier,
            session,
            video_capture,
        })
    }

    /// Handle for dashboard readers on other threads
    #[must_use]
    pub fn session(&self) -> SharedSession {
        self.session.clone()
    }

    /// Run the main application loop
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the video source or drawing fails.
    #[allow(clippy::cast_precision_loss)] // Frame counts stay far below 2^52
    pub fn run(&mut self) -> Result<()> {
        info!("Starting main application loop");

        let mut frame_count: u64 = 0;
        let start_time = Instant::now();
        let mut last_fps_update = Instant::now();
        let mut fps = 0.0;

        loop {
            let mut frame = Mat::default();
            if !self.video_capture.read(&mut frame)? || frame.empty() {
                if matches!(self.config.video_source, VideoSource::File(_)) {
                    info!("End of video file reached");
                    break;
                }
                warn!("Failed to read frame, retrying...");
                continue;
            }

            apply_inversion(&mut frame, self.config.invert_mode)?;

            let detections = detect_faces(&mut *self.detector, &frame);
            let emotion = self
                .emotion_classifier
                .as_deref_mut()
                .and_then(|classifier| classify_emotion(classifier, &frame, &detections.faces));

            let now = Local::now();
            let input = FrameInput::new(&frame, &detections.faces)
                .with_face_present(detections.face_present())
                .with_emotion(emotion);
            let report = self.session.process_frame(&input, now);

            frame_count += 1;
            if last_fps_update.elapsed() >= Duration::from_secs(1) {
                fps = frame_count as f64 / start_time.elapsed().as_secs_f64();
                last_fps_update = Instant::now();
            }

            if self.config.gui_mode == GuiMode::Camera {
                let view = self.session.view(now);
                let options = OverlayOptions {
                    show_eyes: self.config.settings.display.show_eyes,
                    fps,
                };
                overlay::draw(&mut frame, &report, &view, options)?;
                highgui::imshow(WINDOW_NAME, &frame)?;

                if handle_key(highgui::wait_key(1)?, &self.session) == KeyAction::Quit {
                    break;
                }
            }
        }

        let view = self.session.view(Local::now());
        info!(
            "Session ended after {frame_count} frames: reading {:.1}%, positive emotion {:.1}%, {} snapshot(s)",
            view.metrics.reading_percentage, view.metrics.emotion_percentage, view.history_len
        );
        Ok(())
    }
}
