//! Pupil localization by dark-blob segmentation.
//!
//! The crop is thresholded so that dark pixels become foreground, the
//! largest external contour is taken as the pupil and its centroid is read
//! from the image moments. When segmentation finds nothing usable the eye
//! center is returned unchanged; callers see that as "no movement".

use crate::utils::safe_cast::f64_to_i32;
use crate::{Error, Result};
use opencv::core::{Mat, Point, Rect, Vector};
use opencv::imgproc;
use opencv::prelude::*;

const AREA_EPSILON: f64 = 1e-9;

/// Locates the pupil inside an eye crop
#[derive(Debug, Clone, Copy)]
pub struct PupilLocalizer {
    threshold: f64,
}

impl PupilLocalizer {
    /// Create a localizer with the given grayscale cutoff (0-255)
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Grayscale cutoff in use
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Estimate the pupil position for a crop taken around `eye_center`.
    ///
    /// The contour centroid is a crop-local offset and is added to the eye
    /// center as is.
    ///
    /// # Errors
    ///
    /// Returns an error if the crop is empty, has an unsupported channel
    /// count, or an `OpenCV` call fails.
    pub fn locate(&self, crop: &Mat, eye_center: Point) -> Result<Point> {
        let binary = self.segment(crop)?;

        let mut contours = Vector::<Vector<Point>>::new();
        imgproc::find_contours(
            &binary,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )?;

        let Some(pupil) = Self::largest_contour(&contours)? else {
            log::trace!("No dark region in eye crop, using eye center");
            return Ok(eye_center);
        };

        let moments = imgproc::moments(&pupil, false)?;
        if moments.m00.abs() < AREA_EPSILON {
            log::trace!("Degenerate pupil contour, using eye center");
            return Ok(eye_center);
        }

        let cx = f64_to_i32(moments.m10 / moments.m00)?;
        let cy = f64_to_i32(moments.m01 / moments.m00)?;
        Ok(Point::new(eye_center.x + cx, eye_center.y + cy))
    }

    /// Grayscale and inverse-threshold the crop
    fn segment(&self, crop: &Mat) -> Result<Mat> {
        if crop.empty() {
            return Err(Error::InvalidInput("Empty eye crop".to_string()));
        }

        let gray = match crop.channels() {
            1 => crop.try_clone()?,
            3 => {
                let mut gray = Mat::default();
                imgproc::cvt_color(crop, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;
                gray
            }
            4 => {
                let mut gray = Mat::default();
                imgproc::cvt_color(crop, &mut gray, imgproc::COLOR_BGRA2GRAY, 0)?;
                gray
            }
            n => return Err(Error::InvalidInput(format!("Unsupported eye crop channel count: {n}"))),
        };

        let mut binary = Mat::default();
        imgproc::threshold(&gray, &mut binary, self.threshold, 255.0, imgproc::THRESH_BINARY_INV)?;
        Ok(binary)
    }

    /// Largest contour by area. Equal areas go to the top-most, then
    /// left-most bounding box, independent of the finder's output order.
    fn largest_contour(contours: &Vector<Vector<Point>>) -> Result<Option<Vector<Point>>> {
        let mut best: Option<(f64, Rect, Vector<Point>)> = None;

        for contour in contours.iter() {
            let area = imgproc::contour_area(&contour, false)?;
            let bounds = imgproc::bounding_rect(&contour)?;

            let wins = match &best {
                None => true,
                Some((best_area, best_bounds, _)) => {
                    if (area - best_area).abs() < AREA_EPSILON {
                        (bounds.y, bounds.x) < (best_bounds.y, best_bounds.x)
                    } else {
                        area > *best_area
                    }
                }
            };
            if wins {
                best = Some((area, bounds, contour));
            }
        }

        Ok(best.map(|(_, _, contour)| contour))
    }
}

impl Default for PupilLocalizer {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_PUPIL_THRESHOLD)
    }
}
