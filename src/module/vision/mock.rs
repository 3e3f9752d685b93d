//! Scripted classifier for tests.

use image::DynamicImage;
use std::collections::VecDeque;

use super::{Classification, Classifier, Prediction};
use crate::module::error::ClassifyError;

/// Returns scripted top labels in order, then `fallback` forever.
pub struct ScriptedClassifier {
    pub labels: VecDeque<Result<String, ClassifyError>>,
    pub fallback: String,
    pub calls: usize,
}

impl ScriptedClassifier {
    pub fn new(labels: &[&str], fallback: &str) -> Self {
        Self {
            labels: labels.iter().map(|l| Ok(l.to_string())).collect(),
            fallback: fallback.to_string(),
            calls: 0,
        }
    }

    /// Always answers `label`.
    pub fn constant(label: &str) -> Self {
        Self::new(&[], label)
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(&mut self, _image: &DynamicImage) -> Result<Classification, ClassifyError> {
        self.calls += 1;
        let label = self
            .labels
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))?;
        Ok(Classification::ranked(vec![
            Prediction {
                label,
                confidence: 0.9,
            },
            Prediction {
                label: "other".to_string(),
                confidence: 0.1,
            },
        ]))
    }
}
