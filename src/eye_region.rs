//! Eye region extraction from landmark points.
//!
//! The eye center is the floor average of the landmark coordinates; the
//! region is a square window around it, clipped to the frame.

use crate::utils::clamp_rect;
use crate::Result;
use opencv::core::{Mat, Point, Rect};
use opencv::prelude::*;

/// Cropped pixels around one eye
#[derive(Debug)]
pub struct EyeRegion {
    /// Eye center in frame coordinates
    pub center: Point,
    /// Crop bounds in frame coordinates
    pub bounds: Rect,
    /// Owned copy of the cropped pixels
    pub crop: Mat,
}

/// Cuts a bounded square window around each eye
#[derive(Debug, Clone, Copy)]
pub struct EyeRegionExtractor {
    half_window: i32,
}

impl EyeRegionExtractor {
    /// Create an extractor with the given half side length in pixels
    #[must_use]
    pub fn new(half_window: i32) -> Self {
        Self { half_window }
    }

    /// Half side length of the crop window
    #[must_use]
    pub fn half_window(&self) -> i32 {
        self.half_window
    }

    /// Floor average of the points, per axis. `None` for an empty slice.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Mean of i32 values fits in i32
    pub fn eye_center(points: &[Point]) -> Option<Point> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as i64;
        let (sum_x, sum_y) = points
            .iter()
            .fold((0i64, 0i64), |(sx, sy), p| (sx + i64::from(p.x), sy + i64::from(p.y)));

        Some(Point::new(sum_x.div_euclid(n) as i32, sum_y.div_euclid(n) as i32))
    }

    /// Crop bounds for an eye centered at `center`, or `None` when the
    /// clipped window has no area.
    #[must_use]
    pub fn region_bounds(&self, center: Point, frame_width: i32, frame_height: i32) -> Option<Rect> {
        if self.half_window <= 0 {
            return None;
        }
        let side = self.half_window.saturating_mul(2);
        let window = Rect::new(
            center.x.saturating_sub(self.half_window),
            center.y.saturating_sub(self.half_window),
            side,
            side,
        );
        clamp_rect(window, frame_width, frame_height)
    }

    /// Extract the eye region for a landmark set.
    ///
    /// `Ok(None)` is a missed detection for this eye, not a failure.
    ///
    /// # Errors
    ///
    /// Returns an error if `OpenCV` fails to copy the region.
    pub fn extract(&self, frame: &Mat, points: &[Point]) -> Result<Option<EyeRegion>> {
        let Some(center) = Self::eye_center(points) else {
            return Ok(None);
        };
        let Some(bounds) = self.region_bounds(center, frame.cols(), frame.rows()) else {
            log::debug!("Eye window around ({}, {}) falls outside the frame", center.x, center.y);
            return Ok(None);
        };

        let crop = Mat::roi(frame, bounds)?.try_clone()?;
        Ok(Some(EyeRegion { center, bounds, crop }))
    }
}

impl Default for EyeRegionExtractor {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_EYE_HALF_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC3};

    fn frame(width: i32, height: i32) -> Mat {
        Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(128.0)).unwrap()
    }

    #[test]
    fn test_eye_center_integer_average() {
        let points = [
            Point::new(90, 40),
            Point::new(110, 40),
            Point::new(110, 60),
            Point::new(90, 60),
            Point::new(95, 50),
            Point::new(105, 50),
        ];
        assert_eq!(EyeRegionExtractor::eye_center(&points), Some(Point::new(100, 50)));
    }

    #[test]
    fn test_eye_center_floors() {
        let points = [Point::new(0, 0), Point::new(1, 1), Point::new(1, 2)];
        assert_eq!(EyeRegionExtractor::eye_center(&points), Some(Point::new(0, 1)));

        let negative = [Point::new(-1, -1), Point::new(0, 0)];
        assert_eq!(EyeRegionExtractor::eye_center(&negative), Some(Point::new(-1, -1)));
    }

    #[test]
    fn test_eye_center_empty() {
        assert_eq!(EyeRegionExtractor::eye_center(&[]), None);
    }

    #[test]
    fn test_region_bounds_inside() {
        let extractor = EyeRegionExtractor::new(10);
        assert_eq!(
            extractor.region_bounds(Point::new(100, 50), 640, 480),
            Some(Rect::new(90, 40, 20, 20))
        );
    }

    #[test]
    fn test_region_bounds_clamped() {
        let extractor = EyeRegionExtractor::new(10);
        assert_eq!(
            extractor.region_bounds(Point::new(4, 475), 640, 480),
            Some(Rect::new(0, 465, 14, 15))
        );
    }

    #[test]
    fn test_region_bounds_zero_area() {
        let extractor = EyeRegionExtractor::new(10);
        assert_eq!(extractor.region_bounds(Point::new(-10, 50), 640, 480), None);
        assert_eq!(extractor.region_bounds(Point::new(650, 50), 640, 480), None);
        assert_eq!(EyeRegionExtractor::new(0).region_bounds(Point::new(100, 50), 640, 480), None);
    }

    #[test]
    fn test_extract_copies_crop() {
        let extractor = EyeRegionExtractor::default();
        let points = [Point::new(30, 30); 6];
        let region = extractor.extract(&frame(64, 48), &points).unwrap().unwrap();

        assert_eq!(region.center, Point::new(30, 30));
        assert_eq!(region.bounds, Rect::new(20, 20, 20, 20));
        assert_eq!(region.crop.cols(), 20);
        assert_eq!(region.crop.rows(), 20);
    }

    #[test]
    fn test_extract_outside_is_miss() {
        let extractor = EyeRegionExtractor::default();
        let points = [Point::new(200, 200); 6];
        assert!(extractor.extract(&frame(64, 48), &points).unwrap().is_none());
    }
}
