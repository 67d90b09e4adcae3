//! 68-point facial landmark model and the ONNX-backed [`LandmarkDetector`].

use crate::constants::NUM_FACIAL_LANDMARKS;
use crate::face_detection::FaceDetector;
use crate::landmarks::{Detections, FaceLandmarks, LandmarkDetector};
use crate::utils::{expand_face_box, safe_cast::{i32_to_usize, usize_to_i32}};
use crate::{Error, Result};
use ndarray::{Array4, CowArray};
use opencv::core::{Mat, Point2f, Rect, Size, Vec3f, CV_32F};
use opencv::imgproc::{self, InterpolationFlags};
use opencv::prelude::*;
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;

/// Default landmark detector input size
const DEFAULT_LANDMARK_INPUT_SIZE: i32 = 128;

/// Facial landmark detector using `ONNX` Runtime
pub struct MarkDetector {
    session: Session,
    input_size: i32,
}

impl MarkDetector {
    /// Create a new landmark detector from an `ONNX` model file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The ONNX model file cannot be loaded
    /// - The model has no inputs or outputs
    /// - The ONNX runtime environment cannot be created
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        log::info!("Loading landmark model: {}", model_path.as_ref().display());
        let environment = Arc::new(
            Environment::builder()
                .with_name("mark_detector")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        if session.inputs.is_empty() {
            return Err(Error::ModelError("Landmark model has no inputs".to_string()));
        }
        if session.outputs.is_empty() {
            return Err(Error::ModelOutputError("Landmark model has no outputs".to_string()));
        }

        Ok(Self {
            session,
            input_size: DEFAULT_LANDMARK_INPUT_SIZE,
        })
    }

    /// Detect 68 landmarks in a face crop, in crop pixel coordinates
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Image preprocessing fails
    /// - The ONNX model inference fails
    /// - The output holds fewer than 68 points
    pub fn detect(&self, face_image: &Mat) -> Result<Vec<Point2f>> {
        let input = to_nhwc(face_image, self.input_size)?;
        let raw = self.forward(input)?;
        scale_marks(&raw, face_image.cols(), face_image.rows(), self.input_size)
    }

    fn forward(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        let cow_array = CowArray::from(input.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        let marks = outputs
            .first()
            .ok_or_else(|| Error::ModelOutputError("No output from landmark model".to_string()))?
            .try_extract::<f32>()?;
        let view = marks.view();
        Ok(view.iter().copied().collect())
    }
}

/// Resize to `input_size` square and lay out as NHWC RGB in `[0, 1]`
fn to_nhwc(image: &Mat, input_size: i32) -> Result<Array4<f32>> {
    let mut resized = Mat::default();
    imgproc::resize(
        image,
        &mut resized,
        Size::new(input_size, input_size),
        0.0,
        0.0,
        InterpolationFlags::INTER_LINEAR as i32,
    )?;

    let mut rgb_image = Mat::default();
    imgproc::cvt_color(&resized, &mut rgb_image, imgproc::COLOR_BGR2RGB, 0)?;

    let mut float_image = Mat::default();
    rgb_image.convert_to(&mut float_image, CV_32F, 1.0 / 255.0, 0.0)?;

    let size = i32_to_usize(input_size)?;
    let mut input = Array4::<f32>::zeros((1, size, size, 3));
    for row in 0..size {
        for col in 0..size {
            let pixel = float_image.at_2d::<Vec3f>(usize_to_i32(row)?, usize_to_i32(col)?)?;
            for ch in 0..3 {
                input[[0, row, col, ch]] = pixel[ch];
            }
        }
    }
    Ok(input)
}

/// Convert raw `[x0, y0, x1, y1, ...]` model output (input-size units) to
/// crop pixel coordinates
#[allow(clippy::cast_precision_loss)] // Pixel dimensions are small
fn scale_marks(raw: &[f32], face_width: i32, face_height: i32, input_size: i32) -> Result<Vec<Point2f>> {
    if raw.len() < NUM_FACIAL_LANDMARKS * 2 {
        return Err(Error::ModelOutputError(format!(
            "Expected {} landmark values, got {}",
            NUM_FACIAL_LANDMARKS * 2,
            raw.len()
        )));
    }

    let sx = face_width as f32 / input_size as f32;
    let sy = face_height as f32 / input_size as f32;
    Ok(raw
        .chunks_exact(2)
        .take(NUM_FACIAL_LANDMARKS)
        .map(|xy| Point2f::new(xy[0] * sx, xy[1] * sy))
        .collect())
}

/// Shift crop-local marks into frame coordinates
#[allow(clippy::cast_precision_loss)]
fn to_frame_coords(marks: &mut [Point2f], origin: Rect) {
    for mark in marks {
        mark.x += origin.x as f32;
        mark.y += origin.y as f32;
    }
}

/// Face detector followed by the 68-point landmark model
pub struct OnnxLandmarkDetector {
    face_detector: FaceDetector,
    mark_detector: MarkDetector,
    expansion: f32,
    max_faces: usize,
}

impl OnnxLandmarkDetector {
    /// Combine a face detector and a landmark model.
    ///
    /// Face boxes are grown by `expansion` and squared before landmarking;
    /// at most `max_faces` faces are kept per frame.
    #[must_use]
    pub fn new(face_detector: FaceDetector, mark_detector: MarkDetector, expansion: f32, max_faces: usize) -> Self {
        Self {
            face_detector,
            mark_detector,
            expansion,
            max_faces,
        }
    }

    fn landmark_face(&self, frame: &Mat, bbox: Rect) -> Result<FaceLandmarks> {
        let region = expand_face_box(bbox, frame.cols(), frame.rows(), self.expansion);
        if region.width <= 0 || region.height <= 0 {
            return Err(Error::InvalidInput(format!("Face box {bbox:?} lies outside the frame")));
        }

        let crop = Mat::roi(frame, region)?.try_clone()?;
        let mut marks = self.mark_detector.detect(&crop)?;
        to_frame_coords(&mut marks, region);
        FaceLandmarks::from_marks(bbox, &marks)
    }
}

impl LandmarkDetector for OnnxLandmarkDetector {
    fn detect(&mut self, frame: &Mat) -> Result<Detections> {
        let boxes = self.face_detector.detect(frame)?;
        let face_count = boxes.len();

        let mut faces = Vec::with_capacity(face_count.min(self.max_faces));
        for face in boxes.into_iter().take(self.max_faces) {
            match self.landmark_face(frame, face.bbox) {
                Ok(landmarks) => faces.push(landmarks),
                Err(e) => log::warn!("Skipping face at {:?}: {e}", face.bbox),
            }
        }
        Ok(Detections { faces, face_count })
    }
}
