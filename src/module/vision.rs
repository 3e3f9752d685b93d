//! Channel logo recognition.
//!
use image::DynamicImage;
use std::fmt;

use crate::module::error::ClassifyError;

pub mod classifier;
#[cfg(test)]
pub mod mock;

/// One ranked guess.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

/// Ranked guesses for one frame, best first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Classification(pub Vec<Prediction>);

impl Classification {
    /// Build from unordered guesses.
    pub fn ranked(mut predictions: Vec<Prediction>) -> Self {
        predictions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Self(predictions)
    }

    pub fn top(&self) -> Option<&Prediction> {
        self.0.first()
    }

    /// Whether the best guess is `label`.
    pub fn is_top(&self, label: &str) -> bool {
        self.top().map_or(false, |p| p.label == label)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown: Vec<String> = self
            .0
            .iter()
            .take(3)
            .map(|p| format!("{}:{:.3}", p.label, p.confidence))
            .collect();
        write!(f, "[{}]", shown.join(", "))
    }
}

/// Contract the capture engine needs from a logo classifier.
pub trait Classifier {
    fn classify(&mut self, image: &DynamicImage) -> Result<Classification, ClassifyError>;
}
