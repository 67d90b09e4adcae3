//! Rectangle helpers shared by the detectors and the eye-region extractor.

pub mod safe_cast;

use opencv::core::Rect;
use safe_cast::f32_to_i32_clamp;

/// Intersect a rectangle with the frame `[0, width) x [0, height)`.
///
/// Returns `None` when nothing of the rectangle lies inside the frame.
#[must_use]
pub fn clamp_rect(rect: Rect, width: i32, height: i32) -> Option<Rect> {
    let x0 = rect.x.max(0);
    let y0 = rect.y.max(0);
    let x1 = rect.x.saturating_add(rect.width).min(width);
    let y1 = rect.y.saturating_add(rect.height).min(height);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
}

/// Grow a face box by `shift` of its size on every side, square it and keep
/// it inside the frame, so the landmark model sees the whole face.
#[must_use]
#[allow(clippy::cast_precision_loss)] // Box dimensions are far below f32 precision limits
pub fn expand_face_box(bbox: Rect, width: i32, height: i32, shift: f32) -> Rect {
    let dx = f32_to_i32_clamp(bbox.width as f32 * shift, 0, width);
    let dy = f32_to_i32_clamp(bbox.height as f32 * shift, 0, height);

    let x = (bbox.x - dx).max(0);
    let y = (bbox.y - dy).max(0);
    let grown_w = (bbox.width + 2 * dx).min(width - x);
    let grown_h = (bbox.height + 2 * dy).min(height - y);

    let side = grown_w.max(grown_h).min(width).min(height);
    Rect::new(x.min(width - side), y.min(height - side), side, side)
}
