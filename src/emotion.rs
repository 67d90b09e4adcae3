//! Emotion labels and the classifier seam.
//!
//! [`OnnxEmotionClassifier`] runs a FER2013-style network (one grayscale
//! face, seven logits) through ONNX Runtime and reports the dominant label.

use crate::constants::EMOTION_INPUT_SIZE;
use crate::utils::safe_cast::{i32_to_usize, usize_to_i32};
use crate::{Error, Result};
use ndarray::{Array4, CowArray};
use opencv::core::{Mat, Size, CV_32F};
use opencv::imgproc::{self, InterpolationFlags};
use opencv::prelude::*;
use ort::{Environment, Session, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Closed set of emotion labels, in FER2013 output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    /// All labels, indexed like the model output
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    /// Lowercase label name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Angry => "angry",
            Self::Disgust => "disgust",
            Self::Fear => "fear",
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Surprise => "surprise",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidInput(format!("Unknown emotion label: {s}")))
    }
}

/// Dominant-emotion classifier for a face image.
///
/// `Ok(None)` means no usable face; both that and an error are treated as
/// "no detection" for the frame.
pub trait EmotionClassifier {
    /// Classify a BGR face crop
    ///
    /// # Errors
    ///
    /// Returns an error if the model fails to run.
    fn classify(&mut self, face: &Mat) -> Result<Option<Emotion>>;
}

/// FER-style emotion network behind ONNX Runtime
pub struct OnnxEmotionClassifier {
    session: Session,
    input_size: i32,
    min_confidence: f32,
}

impl OnnxEmotionClassifier {
    /// Load the model. Predictions whose softmax probability is below
    /// `min_confidence` are discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded or has no inputs.
    pub fn new<P: AsRef<Path>>(model_path: P, min_confidence: f32) -> Result<Self> {
        log::info!("Loading emotion model: {}", model_path.as_ref().display());
        let environment = Arc::new(
            Environment::builder()
                .with_name("emotion_classifier")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| Error::ModelError("Emotion model has no inputs".to_string()))?;

        // [batch, 1, height, width]; dynamic axes fall back to 48
        let input_size = input
            .dimensions
            .get(2)
            .copied()
            .flatten()
            .and_then(|d| i32::try_from(d).ok())
            .unwrap_or(EMOTION_INPUT_SIZE);

        Ok(Self {
            session,
            input_size,
            min_confidence,
        })
    }

    fn preprocess(&self, face: &Mat) -> Result<Array4<f32>> {
        let mut gray = Mat::default();
        match face.channels() {
            1 => gray = face.try_clone()?,
            3 => imgproc::cvt_color(face, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?,
            n => return Err(Error::InvalidInput(format!("Unsupported face channel count: {n}"))),
        }

        let mut resized = Mat::default();
        imgproc::resize(
            &gray,
            &mut resized,
            Size::new(self.input_size, self.input_size),
            0.0,
            0.0,
            InterpolationFlags::INTER_AREA as i32,
        )?;

        let mut scaled = Mat::default();
        resized.convert_to(&mut scaled, CV_32F, 1.0 / 255.0, 0.0)?;

        let side = i32_to_usize(self.input_size)?;
        let mut input = Array4::<f32>::zeros((1, 1, side, side));
        for row in 0..side {
            for col in 0..side {
                input[[0, 0, row, col]] = *scaled.at_2d::<f32>(usize_to_i32(row)?, usize_to_i32(col)?)?;
            }
        }
        Ok(input)
    }

    fn forward(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        let cow_array = CowArray::from(input.into_dyn());
        let tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![tensor])?;

        let logits = outputs
            .first()
            .ok_or_else(|| Error::ModelOutputError("Emotion model produced no output".to_string()))?
            .try_extract::<f32>()?;
        let view = logits.view();
        Ok(view.iter().copied().collect())
    }
}

impl EmotionClassifier for OnnxEmotionClassifier {
    fn classify(&mut self, face: &Mat) -> Result<Option<Emotion>> {
        if face.empty() {
            return Ok(None);
        }
        let logits = self.forward(self.preprocess(face)?)?;
        dominant_emotion(&logits, self.min_confidence)
    }
}

/// Pick the most probable label from raw logits.
///
/// # Errors
///
/// Returns an error if the logit count does not match the label set.
pub fn dominant_emotion(logits: &[f32], min_confidence: f32) -> Result<Option<Emotion>> {
    if logits.len() != Emotion::ALL.len() {
        return Err(Error::ModelOutputError(format!(
            "Expected {} emotion scores, got {}",
            Emotion::ALL.len(),
            logits.len()
        )));
    }

    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return Ok(None);
    }
    let exp: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let total: f32 = exp.iter().sum();

    let (index, probability) = exp
        .iter()
        .map(|&e| e / total)
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, p)| if p > best.1 { (i, p) } else { best });

    if probability < min_confidence {
        log::debug!("Emotion confidence {probability:.2} below {min_confidence:.2}");
        return Ok(None);
    }
    Ok(Some(Emotion::ALL[index]))
}
