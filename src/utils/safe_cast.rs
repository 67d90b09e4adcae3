//! Checked numeric conversions between model outputs and pixel coordinates

use crate::{Error, Result};

fn out_of_range(value: impl std::fmt::Display) -> Error {
    Error::InvalidInput(format!("Value {value} cannot be represented as a pixel coordinate"))
}

/// Convert a buffer index or dimension to `i32`
///
/// # Errors
///
/// Returns an error if the value exceeds `i32::MAX`
pub fn usize_to_i32(value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| out_of_range(value))
}

/// Convert an `OpenCV` dimension to `usize`, rejecting negatives
///
/// # Errors
///
/// Returns an error if the value is negative
pub fn i32_to_usize(value: i32) -> Result<usize> {
    usize::try_from(value).map_err(|_| out_of_range(value))
}

/// Truncate a finite `f32` toward zero
///
/// # Errors
///
/// Returns an error if the value is not finite or outside the `i32` range
#[allow(clippy::cast_precision_loss)] // Bounds check is approximate at the extremes
#[allow(clippy::cast_possible_truncation)] // Truncation after bounds check is intended
pub fn f32_to_i32(value: f32) -> Result<i32> {
    if value.is_finite() && value >= i32::MIN as f32 && value <= i32::MAX as f32 {
        Ok(value as i32)
    } else {
        Err(out_of_range(value))
    }
}

/// Truncate a finite `f64` toward zero
///
/// # Errors
///
/// Returns an error if the value is not finite or outside the `i32` range
#[allow(clippy::cast_possible_truncation)] // Truncation after bounds check is intended
pub fn f64_to_i32(value: f64) -> Result<i32> {
    if value.is_finite() && value >= f64::from(i32::MIN) && value <= f64::from(i32::MAX) {
        Ok(value as i32)
    } else {
        Err(out_of_range(value))
    }
}

/// Clamp an `f32` into `[min, max]` and truncate; non-finite values map to `min`
#[must_use]
#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_possible_truncation)]
pub fn f32_to_i32_clamp(value: f32, min: i32, max: i32) -> i32 {
    let (low, high) = (min.min(max), min.max(max));
    if !value.is_finite() {
        return low;
    }
    (value.clamp(low as f32, high as f32) as i32).clamp(low, high)
}
