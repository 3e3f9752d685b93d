//! Provide Logo Classification
//!
pub mod onnx {
    use image::{imageops::FilterType, ImageBuffer, Pixel, Rgb};
    use ort::{
        environment::Environment, value::Value, ExecutionProvider, GraphOptimizationLevel,
        LoggingLevel, Session, SessionBuilder,
    };
    use std::fs;
    use std::path::Path;

    use crate::module::error::ClassifyError;
    use crate::module::vision::{Classification, Classifier, Prediction};

    /// Logo classifier session.
    ///
    pub struct LogoClassifier {
        session: Session,
        labels: Vec<String>, // In model output order
        width: u32,          // Model input width
        height: u32,         // Model input height
    }

    impl LogoClassifier {
        /// Load the model and its labels.
        ///
        /// # Arguments
        ///
        /// * `model_path` - ONNX file taking a `1x3xHxW` float tensor.
        /// * `labels_path` - One label per line.
        /// * `width`, `height` - Model input size, the logo crop size.
        /// * `intra_threads` - Inference threads.
        ///
        pub fn new(
            model_path: &Path,
            labels_path: &Path,
            width: u32,
            height: u32,
            intra_threads: i16,
        ) -> Result<Self, ClassifyError> {
            let labels = load_labels(labels_path)?;
            let session = Self::get_session("tvlogo", model_path, intra_threads)?;
            log::info!(
                "Classifier loaded from {} with {} labels",
                model_path.display(),
                labels.len()
            );
            Ok(Self {
                session,
                labels,
                width,
                height,
            })
        }

        /// get session
        ///
        fn get_session(
            name: &str,
            model_path: &Path,
            intra_threads: i16,
        ) -> Result<Session, ClassifyError> {
            let environment = Environment::builder()
                .with_name(name)
                .with_log_level(LoggingLevel::Warning)
                .with_execution_providers([ExecutionProvider::CPU(Default::default())])
                .build()?
                .into_arc();
            let session = SessionBuilder::new(&environment)?
                .with_optimization_level(GraphOptimizationLevel::Level1)?
                .with_intra_threads(intra_threads)?
                .with_model_from_file(model_path)?;
            Ok(session)
        }
    }

    impl Classifier for LogoClassifier {
        fn classify(
            &mut self,
            image: &image::DynamicImage,
        ) -> Result<Classification, ClassifyError> {
            let (w, h) = (self.width, self.height);
            let img: ImageBuffer<Rgb<u8>, Vec<u8>> = image
                .resize_exact(w, h, FilterType::Nearest)
                .to_rgb8();

            let array = ndarray::CowArray::from(
                ndarray::Array::from_shape_fn((1, 3, h as usize, w as usize), |(_, c, j, i)| {
                    let pixel = img.get_pixel(i as u32, j as u32);
                    // range [0, 255] -> range [0, 1]
                    (pixel.channels()[c] as f32) / 255.0
                })
                .into_dyn(),
            );

            let tensor = vec![Value::from_array(self.session.allocator(), &array)?];
            let outs = self.session.run(tensor)?;
            let out = outs
                .first()
                .ok_or(ClassifyError::EmptyOutput)?
                .try_extract::<f32>()?;
            let scores: Vec<f32> = out.view().iter().copied().collect();
            rank(&self.labels, &scores)
        }
    }

    /// Read a label file, skipping blank lines.
    pub fn load_labels(path: &Path) -> Result<Vec<String>, ClassifyError> {
        Ok(fs::read_to_string(path)?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    /// Pair scores with labels, best first.
    ///
    /// Scores that already form a distribution are kept, anything else goes through softmax.
    pub fn rank(labels: &[String], scores: &[f32]) -> Result<Classification, ClassifyError> {
        if scores.len() != labels.len() {
            return Err(ClassifyError::LabelMismatch {
                outputs: scores.len(),
                labels: labels.len(),
            });
        }
        let sum: f32 = scores.iter().sum();
        let is_distribution =
            scores.iter().all(|s| (0.0..=1.0).contains(s)) && (sum - 1.0).abs() < 1e-3;
        let probs = if is_distribution {
            scores.to_vec()
        } else {
            softmax(scores)
        };
        Ok(Classification::ranked(
            labels
                .iter()
                .zip(probs)
                .map(|(label, confidence)| Prediction {
                    label: label.clone(),
                    confidence,
                })
                .collect(),
        ))
    }

    pub fn softmax(logits: &[f32]) -> Vec<f32> {
        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = logits.iter().map(|x| (x - max).exp()).collect();
        let sum: f32 = exps.iter().sum();
        exps.iter().map(|e| e / sum).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::onnx::*;

    fn labels() -> Vec<String> {
        vec!["101".to_string(), "102".to_string(), "103".to_string()]
    }

    #[test]
    fn rank_logits_test() {
        let res = rank(&labels(), &[0.5, 3.0, -1.0]).unwrap();
        assert_eq!(res.top().unwrap().label, "102");
        let total: f32 = res.0.iter().map(|p| p.confidence).sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert_eq!(res.0[2].label, "103");
    }

    #[test]
    fn rank_probabilities_test() {
        let res = rank(&labels(), &[0.2, 0.1, 0.7]).unwrap();
        assert_eq!(res.top().unwrap().label, "103");
        assert_eq!(res.top().unwrap().confidence, 0.7);
    }

    #[test]
    fn rank_mismatch_test() {
        assert!(rank(&labels(), &[1.0]).is_err());
    }

    #[test]
    fn load_labels_test() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("labels.txt");
        std::fs::write(&file, "101\n\n 102 \n").unwrap();
        assert_eq!(load_labels(&file).unwrap(), vec!["101", "102"]);
    }
}
