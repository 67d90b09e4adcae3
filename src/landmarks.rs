//! Fixed-shape landmark records and the detector seam.
//!
//! Whatever a landmark model produces is translated into [`FaceLandmarks`]
//! before any tracking logic sees it: a face box plus exactly six integer
//! points per eye.

use crate::constants::{EYE_POINT_COUNT, LEFT_EYE_START, NUM_FACIAL_LANDMARKS, RIGHT_EYE_START};
use crate::utils::safe_cast::f32_to_i32;
use crate::{Error, Result};
use opencv::core::{Mat, Point, Point2f, Rect};

/// Six ordered points outlining one eye
pub type EyePoints = [Point; EYE_POINT_COUNT];

/// Eye landmarks of a single detected face, in frame coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceLandmarks {
    /// Face bounding box in the frame
    pub bbox: Rect,
    /// Points 36-41 of the 68-point layout
    pub left_eye: EyePoints,
    /// Points 42-47 of the 68-point layout
    pub right_eye: EyePoints,
}

impl FaceLandmarks {
    /// Build from a full 68-point landmark set already in frame coordinates.
    ///
    /// # Errors
    ///
    /// Returns an error if the set does not hold exactly 68 points or a
    /// coordinate is not finite.
    pub fn from_marks(bbox: Rect, marks: &[Point2f]) -> Result<Self> {
        if marks.len() != NUM_FACIAL_LANDMARKS {
            return Err(Error::InvalidInput(format!(
                "Expected {NUM_FACIAL_LANDMARKS} landmarks, got {}",
                marks.len()
            )));
        }

        Ok(Self {
            bbox,
            left_eye: eye_points(&marks[LEFT_EYE_START..LEFT_EYE_START + EYE_POINT_COUNT])?,
            right_eye: eye_points(&marks[RIGHT_EYE_START..RIGHT_EYE_START + EYE_POINT_COUNT])?,
        })
    }

    /// Area of the face box, used to rank faces
    #[must_use]
    pub fn area(&self) -> i64 {
        i64::from(self.bbox.width.max(0)) * i64::from(self.bbox.height.max(0))
    }
}

fn eye_points(marks: &[Point2f]) -> Result<EyePoints> {
    let mut points = [Point::default(); EYE_POINT_COUNT];
    for (point, mark) in points.iter_mut().zip(marks) {
        *point = Point::new(f32_to_i32(mark.x.round())?, f32_to_i32(mark.y.round())?);
    }
    Ok(points)
}

/// Faces found in one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detections {
    /// Faces with usable eye landmarks, most confident first
    pub faces: Vec<FaceLandmarks>,
    /// Face boxes found, counting faces whose landmarks failed
    pub face_count: usize,
}

impl Detections {
    /// Detections where every found face has landmarks
    #[must_use]
    pub fn from_faces(faces: Vec<FaceLandmarks>) -> Self {
        let face_count = faces.len();
        Self { faces, face_count }
    }

    /// Whether any face was seen, with or without landmarks
    #[must_use]
    pub fn face_present(&self) -> bool {
        self.face_count > 0 || !self.faces.is_empty()
    }
}

/// Source of eye landmarks for a frame.
///
/// No faces is a normal outcome, not an error.
pub trait LandmarkDetector {
    /// Detect faces in a BGR frame, ordered most confident first
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying model fails to run.
    fn detect(&mut self, frame: &Mat) -> Result<Detections>;
}
