//! Frame annotation for the camera window.

use crate::session::{EyeObservation, FrameReport, SessionView};
use crate::Result;
use opencv::{
    core::{Mat, Point, Rect, Scalar},
    imgproc::{self, FILLED, FONT_HERSHEY_SIMPLEX, LINE_8},
    prelude::*,
};

const EYE_CENTER_RADIUS: i32 = 5;
const PUPIL_RADIUS: i32 = 3;

fn green() -> Scalar {
    Scalar::new(0.0, 255.0, 0.0, 0.0)
}

fn red() -> Scalar {
    Scalar::new(0.0, 0.0, 255.0, 0.0)
}

fn yellow() -> Scalar {
    Scalar::new(0.0, 255.0, 255.0, 0.0)
}

/// What to draw besides the status text
#[derive(Debug, Clone, Copy)]
pub struct OverlayOptions {
    /// Eye center and pupil dots
    pub show_eyes: bool,
    /// Frames per second shown in the corner
    pub fps: f64,
}

/// Annotate `frame` in place with this frame's report and the session view
///
/// # Errors
///
/// Returns an error if an `OpenCV` drawing call fails.
pub fn draw(frame: &mut Mat, report: &FrameReport, view: &SessionView, options: OverlayOptions) -> Result<()> {
    for face in &report.faces {
        imgproc::rectangle(frame, face.bbox, green(), 2, LINE_8, 0)?;

        if options.show_eyes {
            for eye in [face.left, face.right].iter().flatten() {
                draw_eye(frame, eye)?;
            }
        }
    }

    let mut lines = vec![
        (format!("FPS: {:.1}", options.fps), green()),
        (format!("Status: {}", report.status), status_color(report)),
    ];
    if let Some(emotion) = view.last_emotion {
        lines.push((format!("Emotion: {emotion}"), yellow()));
    }
    lines.push((
        format!(
            "Reading {:.0}%  Positive {:.0}%",
            view.metrics.reading_percentage, view.metrics.emotion_percentage
        ),
        yellow(),
    ));

    let mut y = 30;
    for (text, color) in &lines {
        put_line(frame, text, Point::new(10, y), *color)?;
        y += 30;
    }

    if report.absence_alert {
        draw_absence_banner(frame, report.absence_secs)?;
    }

    Ok(())
}

fn status_color(report: &FrameReport) -> Scalar {
    if report.status.is_reading() {
        green()
    } else {
        red()
    }
}

fn draw_eye(frame: &mut Mat, eye: &EyeObservation) -> Result<()> {
    imgproc::circle(frame, eye.center, EYE_CENTER_RADIUS, green(), FILLED, LINE_8, 0)?;
    imgproc::circle(frame, eye.pupil, PUPIL_RADIUS, red(), FILLED, LINE_8, 0)?;
    Ok(())
}

fn draw_absence_banner(frame: &mut Mat, absence_secs: f64) -> Result<()> {
    let height = frame.rows().min(40);
    let banner = Rect::new(0, frame.rows() - height, frame.cols(), height);
    imgproc::rectangle(frame, banner, red(), FILLED, LINE_8, 0)?;
    put_line(
        frame,
        &format!("Viewer absent for {absence_secs:.0}s"),
        Point::new(10, frame.rows() - 12),
        Scalar::all(255.0),
    )
}

fn put_line(frame: &mut Mat, text: &str, origin: Point, color: Scalar) -> Result<()> {
    imgproc::put_text(frame, text, origin, FONT_HERSHEY_SIMPLEX, 0.7, color, 2, LINE_8, false)?;
    Ok(())
}
