//! SCRFD face detector running on ONNX Runtime.

use crate::constants::{IMAGE_NORMALIZATION_OFFSET, IMAGE_NORMALIZATION_SCALE};
use crate::utils::safe_cast::{f32_to_i32, i32_to_usize, usize_to_i32};
use crate::{Error, Result};
use ndarray::{Array4, CowArray};
use opencv::core::{Mat, Rect, Scalar, Size, Vec3b, CV_8UC3};
use opencv::imgproc::{self, InterpolationFlags};
use opencv::prelude::*;
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;

const DEFAULT_INPUT_SIZE: i32 = 640;

/// Detected face box with its confidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    /// Bounding box in frame coordinates
    pub bbox: Rect,
    /// Detection confidence
    pub score: f32,
}

/// Box corners `[x1, y1, x2, y2]` in model input coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    corners: [f32; 4],
    score: f32,
}

/// SCRFD face detector
pub struct FaceDetector {
    session: Session,
    input_size: (i32, i32),
    conf_threshold: f32,
    nms_threshold: f32,
    num_anchors: usize,
    strides: Vec<i32>,
    offset: usize,
}

impl FaceDetector {
    /// Load a SCRFD model
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded or has no inputs.
    pub fn new<P: AsRef<Path>>(model_path: P, conf_threshold: f32, nms_threshold: f32) -> Result<Self> {
        log::info!("Loading face detector: {}", model_path.as_ref().display());
        let environment = Arc::new(
            Environment::builder()
                .with_name("face_detector")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        let input_meta = session
            .inputs
            .first()
            .ok_or_else(|| Error::ModelError("Face detector has no inputs".to_string()))?;

        // [batch, channels, height, width]
        let dim = |i: usize| {
            input_meta
                .dimensions
                .get(i)
                .copied()
                .flatten()
                .and_then(|d| i32::try_from(d).ok())
                .unwrap_or(DEFAULT_INPUT_SIZE)
        };
        let input_size = (dim(3), dim(2));

        let (offset, strides, num_anchors) = match session.outputs.len() {
            6 | 9 => (3, vec![8, 16, 32], 2),
            10 | 15 => (5, vec![8, 16, 32, 64, 128], 1),
            n => {
                log::warn!("Unknown face detector layout with {n} outputs, assuming 3 strides");
                (3, vec![8, 16, 32], 2)
            }
        };

        Ok(Self {
            session,
            input_size,
            conf_threshold,
            nms_threshold,
            num_anchors,
            strides,
            offset,
        })
    }

    /// Detect faces, most confident first
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or inference fails.
    pub fn detect(&mut self, image: &Mat) -> Result<Vec<FaceBox>> {
        if image.empty() {
            return Ok(Vec::new());
        }
        let (input, det_scale) = self.letterbox(image)?;
        let candidates = self.forward(input)?;

        let faces = nms(candidates, self.nms_threshold)
            .into_iter()
            .map(|c| to_face_box(&c, det_scale))
            .collect::<Result<Vec<_>>>()?;
        log::debug!("Detected {} face(s)", faces.len());
        Ok(faces)
    }

    /// Resize keeping aspect ratio, pad bottom-right, normalize to NCHW
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn letterbox(&self, image: &Mat) -> Result<(Array4<f32>, f32)> {
        let (input_width, input_height) = self.input_size;
        let ratio_img = image.rows() as f32 / image.cols() as f32;
        let ratio_model = input_height as f32 / input_width as f32;

        let (new_width, new_height) = if ratio_img > ratio_model {
            ((input_height as f32 / ratio_img) as i32, input_height)
        } else {
            (input_width, (input_width as f32 * ratio_img) as i32)
        };
        let det_scale = new_height as f32 / image.rows() as f32;

        let mut resized = Mat::default();
        imgproc::resize(
            image,
            &mut resized,
            Size::new(new_width.max(1), new_height.max(1)),
            0.0,
            0.0,
            InterpolationFlags::INTER_LINEAR as i32,
        )?;

        let mut padded = Mat::new_rows_cols_with_default(input_height, input_width, CV_8UC3, Scalar::all(0.0))?;
        {
            let mut roi = padded.roi_mut(Rect::new(0, 0, resized.cols(), resized.rows()))?;
            resized.copy_to(&mut roi)?;
        }

        let height = i32_to_usize(input_height)?;
        let width = i32_to_usize(input_width)?;
        let mut input = Array4::<f32>::zeros((1, 3, height, width));
        for row in 0..height {
            for col in 0..width {
                let pixel = padded.at_2d::<Vec3b>(usize_to_i32(row)?, usize_to_i32(col)?)?;
                // BGR in, RGB out
                for ch in 0..3 {
                    input[[0, ch, row, col]] =
                        (f32::from(pixel[2 - ch]) - IMAGE_NORMALIZATION_OFFSET) / IMAGE_NORMALIZATION_SCALE;
                }
            }
        }

        Ok((input, det_scale))
    }

    #[allow(clippy::cast_precision_loss)]
    fn forward(&self, input: Array4<f32>) -> Result<Vec<Candidate>> {
        let input_height = usize_to_i32(input.shape()[2])?;
        let input_width = usize_to_i32(input.shape()[3])?;

        let cow_array = CowArray::from(input.into_dyn());
        let tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![tensor])?;

        let output = |idx: usize| {
            outputs
                .get(idx)
                .ok_or_else(|| Error::ModelOutputError(format!("Face detector output {idx} missing")))
        };

        let mut candidates = Vec::new();
        for (idx, &stride) in self.strides.iter().enumerate() {
            let scores = output(idx)?.try_extract::<f32>()?;
            let distances = output(idx + self.offset)?.try_extract::<f32>()?;
            let scores: Vec<f32> = scores.view().iter().copied().collect();
            let distances: Vec<f32> = distances.view().iter().copied().collect();

            let centers = anchor_centers(input_height / stride, input_width / stride, stride, self.num_anchors);
            if distances.len() < centers.len() * 4 || scores.len() < centers.len() {
                return Err(Error::ModelOutputError(format!(
                    "Stride {stride}: {} anchors but {} scores and {} distances",
                    centers.len(),
                    scores.len(),
                    distances.len()
                )));
            }

            let scale = stride as f32;
            for (i, center) in centers.iter().enumerate() {
                let score = scores[i];
                if score < self.conf_threshold {
                    continue;
                }
                let d = &distances[i * 4..i * 4 + 4];
                candidates.push(Candidate {
                    corners: distance_to_bbox(*center, [d[0] * scale, d[1] * scale, d[2] * scale, d[3] * scale]),
                    score,
                });
            }
        }

        Ok(candidates)
    }
}

/// Anchor centers of one stride level, `num_anchors` per grid cell
#[allow(clippy::cast_precision_loss)]
fn anchor_centers(height: i32, width: i32, stride: i32, num_anchors: usize) -> Vec<(f32, f32)> {
    let mut centers = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let center = ((x * stride) as f32, (y * stride) as f32);
            centers.extend(std::iter::repeat(center).take(num_anchors.max(1)));
        }
    }
    centers
}

/// Corners from an anchor center and its left/top/right/bottom distances
fn distance_to_bbox(center: (f32, f32), distances: [f32; 4]) -> [f32; 4] {
    let (cx, cy) = center;
    [cx - distances[0], cy - distances[1], cx + distances[2], cy + distances[3]]
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let area = |r: &[f32; 4]| (r[2] - r[0] + 1.0) * (r[3] - r[1] + 1.0);
    let w = (a[2].min(b[2]) - a[0].max(b[0]) + 1.0).max(0.0);
    let h = (a[3].min(b[3]) - a[1].max(b[1]) + 1.0).max(0.0);
    let inter = w * h;
    inter / (area(a) + area(b) - inter)
}

/// Greedy non-maximum suppression, highest score first
fn nms(mut candidates: Vec<Candidate>, threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if keep.iter().all(|k| iou(&k.corners, &candidate.corners) <= threshold) {
            keep.push(candidate);
        }
    }
    keep
}

fn to_face_box(candidate: &Candidate, det_scale: f32) -> Result<FaceBox> {
    let [x1, y1, x2, y2] = candidate.corners.map(|v| v / det_scale);
    Ok(FaceBox {
        bbox: Rect::new(f32_to_i32(x1)?, f32_to_i32(y1)?, f32_to_i32(x2 - x1)?, f32_to_i32(y2 - y1)?),
        score: candidate.score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(corners: [f32; 4], score: f32) -> Candidate {
        Candidate { corners, score }
    }

    #[test]
    fn test_distance_to_bbox() {
        let corners = distance_to_bbox((100.0, 100.0), [10.0, 10.0, 20.0, 20.0]);
        assert_eq!(corners, [90.0, 90.0, 120.0, 120.0]);
    }

    #[test]
    fn test_anchor_centers_layout() {
        let centers = anchor_centers(2, 3, 8, 2);
        assert_eq!(centers.len(), 12);
        assert_eq!(centers[0], (0.0, 0.0));
        assert_eq!(centers[1], (0.0, 0.0));
        assert_eq!(centers[2], (8.0, 0.0));
        assert_eq!(centers[6], (0.0, 8.0));
    }

    #[test]
    fn test_nms_suppresses_overlap() {
        let kept = nms(
            vec![
                candidate([0.0, 0.0, 100.0, 100.0], 0.8),
                candidate([5.0, 5.0, 105.0, 105.0], 0.9),
                candidate([300.0, 300.0, 350.0, 350.0], 0.7),
            ],
            0.4,
        );
        assert_eq!(kept.len(), 2);
        assert!((kept[0].score - 0.9).abs() < f32::EPSILON);
        assert!((kept[1].score - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_iou_disjoint_and_identical() {
        let a = [0.0, 0.0, 9.0, 9.0];
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
        assert!(iou(&a, &[50.0, 50.0, 60.0, 60.0]).abs() < 1e-6);
    }

    #[test]
    fn test_face_box_rescaled() {
        let face = to_face_box(&candidate([10.0, 20.0, 60.0, 80.0], 0.9), 0.5).unwrap();
        assert_eq!(face.bbox, Rect::new(20, 40, 100, 120));
    }
}
