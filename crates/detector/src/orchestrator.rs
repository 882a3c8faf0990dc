use std::path::Path;

use ndarray::Axis;
use tracing::{info, instrument};

use veriwave_audio::FeatureExtractor;
use veriwave_domain::{DetectError, FeatureConfig, ModelConfig, Verdict};
use veriwave_model::{LabelMapping, ModelRuntime};

const ALLOWED_EXTENSIONS: [&str; 3] = ["wav", "mp3", "flac"];

/// Orchestrates one inference request: validate, extract, score, classify.
/// `predict` is CPU-bound and synchronous; callers serving concurrent
/// requests dispatch it onto a worker pool.
pub struct Detector {
    extractor: FeatureExtractor,
    runtime: ModelRuntime,
}

impl Detector {
    pub fn new(features: FeatureConfig, model: ModelConfig) -> Self {
        let runtime = ModelRuntime::new(model, &features);
        Self {
            extractor: FeatureExtractor::new(features),
            runtime,
        }
    }

    pub fn with_runtime(features: FeatureConfig, runtime: ModelRuntime) -> Self {
        Self {
            extractor: FeatureExtractor::new(features),
            runtime,
        }
    }

    /// Classify the audio file at `path`. Deterministic for fixed file bytes
    /// and a fixed model artifact.
    #[instrument(skip(self))]
    pub fn predict<P: AsRef<Path> + std::fmt::Debug>(
        &self,
        path: P,
    ) -> Result<Verdict, DetectError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(DetectError::UnsupportedFormat(format!(
                "{} ({})",
                path.display(),
                if extension.is_empty() {
                    "no extension"
                } else {
                    extension.as_str()
                }
            )));
        }

        let features = self.extractor.extract(path)?;
        let batch = features.insert_axis(Axis(0));

        let model = self.runtime.ensure_loaded()?;
        let raw = model.score(&batch)?;
        let verdict = classify(raw, model.labels());
        info!(
            label = %verdict.label,
            confidence = verdict.confidence,
            "inference complete"
        );
        Ok(verdict)
    }
}

/// Map a raw positive-class probability to the final verdict. A raw score
/// strictly above 0.5 selects class index 1; a score of exactly 0.5 stays at
/// index 0. The raw score is the probability of index 1, so confidence is
/// `raw` for index 1 and the complement for index 0 — always the probability
/// of the predicted class, whichever label that index maps to.
pub fn classify(raw: f32, labels: &LabelMapping) -> Verdict {
    let (label, confidence) = if raw > 0.5 {
        (labels.positive(), raw as f64)
    } else {
        (labels.negative(), 1.0 - raw as f64)
    };
    Verdict { label, confidence }
}
