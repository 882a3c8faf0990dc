use std::path::Path;
use std::sync::{Arc, Mutex};

use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use veriwave_domain::{DetectError, FeatureConfig, ModelConfig};

use crate::fingerprint::fingerprint;
use crate::labels::LabelMapping;

/// A scoring backend returns the raw sigmoid probability of class index 1
/// for one batched feature tensor.
pub trait ScoringBackend: Send + Sync {
    fn score(&self, batch: &Array4<f32>) -> Result<f32, DetectError>;
}

/// ONNX Runtime backend. `Session::run` needs `&mut self`, so the session
/// lives behind a mutex and concurrent scoring calls serialize on it.
pub struct OnnxBackend {
    session: Mutex<Session>,
    input_name: String,
}

impl OnnxBackend {
    pub fn load<P: AsRef<Path>>(path: P, input_name: &str) -> Result<Self, DetectError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DetectError::ArtifactNotFound(path.to_path_buf()));
        }
        let session = Session::builder()
            .and_then(|builder| builder.with_intra_threads(1))
            .and_then(|builder| builder.commit_from_file(path))
            .map_err(|err| DetectError::corrupt(format!("{}: {err}", path.display())))?;
        Ok(Self {
            session: Mutex::new(session),
            input_name: input_name.to_string(),
        })
    }
}

impl ScoringBackend for OnnxBackend {
    fn score(&self, batch: &Array4<f32>) -> Result<f32, DetectError> {
        let tensor = Tensor::from_array(batch.clone())
            .map_err(|err| DetectError::scoring(format!("input tensor: {err}")))?;
        let mut session = self
            .session
            .lock()
            .map_err(|_| DetectError::scoring("classifier session lock poisoned"))?;
        let input_name = self.input_name.as_str();
        let outputs = session
            .run(ort::inputs![input_name => tensor])
            .map_err(|err| DetectError::scoring(err.to_string()))?;
        let (_, value) = outputs
            .iter()
            .next()
            .ok_or_else(|| DetectError::scoring("classifier produced no output"))?;
        let (_, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|err| DetectError::scoring(format!("output tensor: {err}")))?;
        data.first()
            .copied()
            .ok_or_else(|| DetectError::scoring("classifier produced an empty output"))
    }
}

/// Deterministic backend for tests and dry runs.
pub struct ConstantBackend(pub f32);

impl ScoringBackend for ConstantBackend {
    fn score(&self, _batch: &Array4<f32>) -> Result<f32, DetectError> {
        Ok(self.0)
    }
}

/// Classifier, label mapping, and provenance fingerprint, read-only once
/// loaded.
pub struct LoadedModel {
    backend: Box<dyn ScoringBackend>,
    labels: LabelMapping,
    fingerprint: String,
    input_shape: [usize; 4],
}

impl LoadedModel {
    pub fn new(
        backend: Box<dyn ScoringBackend>,
        labels: LabelMapping,
        fingerprint: String,
        input_shape: [usize; 4],
    ) -> Self {
        Self {
            backend,
            labels,
            fingerprint,
            input_shape,
        }
    }

    /// Score a batched tensor. The shape is validated against the expected
    /// `[1, image, image, channels]` before touching the backend.
    pub fn score(&self, batch: &Array4<f32>) -> Result<f32, DetectError> {
        if batch.shape() != &self.input_shape[..] {
            return Err(DetectError::ShapeMismatch {
                got: batch.shape().to_vec(),
                expected: self.input_shape.to_vec(),
            });
        }
        let raw = self.backend.score(batch)?;
        debug!(raw, "classifier raw probability");
        Ok(raw)
    }

    pub fn labels(&self) -> &LabelMapping {
        &self.labels
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Reads the classifier and label-map artifacts into a [`LoadedModel`].
pub trait ArtifactLoader: Send + Sync {
    fn load(&self, config: &ModelConfig, input_shape: [usize; 4])
        -> Result<LoadedModel, DetectError>;
}

/// Production loader: fingerprint the ONNX bytes, open the session, parse
/// the label mapping.
pub struct DiskLoader;

impl ArtifactLoader for DiskLoader {
    fn load(
        &self,
        config: &ModelConfig,
        input_shape: [usize; 4],
    ) -> Result<LoadedModel, DetectError> {
        let hash = fingerprint(&config.model_path)?;
        info!(
            sha256 = %hash,
            path = %config.model_path.display(),
            "classifier artifact fingerprint"
        );
        let backend = OnnxBackend::load(&config.model_path, &config.input_name)?;
        let labels = LabelMapping::load(&config.label_map_path)?;
        info!(classes = ?labels.classes(), "label mapping loaded");
        Ok(LoadedModel::new(
            Box::new(backend),
            labels,
            hash,
            input_shape,
        ))
    }
}

/// Lazily initialized, process-wide model state. The mutex serializes
/// concurrent first calls onto a single load attempt; a failed load stores
/// nothing, so the next call retries instead of caching the failure.
pub struct ModelRuntime {
    config: ModelConfig,
    input_shape: [usize; 4],
    loader: Box<dyn ArtifactLoader>,
    state: Mutex<Option<Arc<LoadedModel>>>,
}

impl ModelRuntime {
    pub fn new(config: ModelConfig, features: &FeatureConfig) -> Self {
        Self::with_loader(config, features, Box::new(DiskLoader))
    }

    /// Runtime with an explicit artifact loader.
    pub fn with_loader(
        config: ModelConfig,
        features: &FeatureConfig,
        loader: Box<dyn ArtifactLoader>,
    ) -> Self {
        Self {
            config,
            input_shape: features.batch_shape(),
            loader,
            state: Mutex::new(None),
        }
    }

    /// Runtime pre-populated with an explicit backend and labels; used by
    /// tests and callers that manage artifacts themselves.
    pub fn with_backend(
        backend: Box<dyn ScoringBackend>,
        labels: LabelMapping,
        features: &FeatureConfig,
    ) -> Self {
        let input_shape = features.batch_shape();
        let model = LoadedModel::new(backend, labels, String::new(), input_shape);
        Self {
            config: ModelConfig::default(),
            input_shape,
            loader: Box::new(DiskLoader),
            state: Mutex::new(Some(Arc::new(model))),
        }
    }

    /// Load the artifacts if this is the first call, otherwise hand out the
    /// cached model.
    pub fn ensure_loaded(&self) -> Result<Arc<LoadedModel>, DetectError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| DetectError::scoring("model state lock poisoned"))?;
        if let Some(model) = state.as_ref() {
            return Ok(Arc::clone(model));
        }
        let model = Arc::new(self.loader.load(&self.config, self.input_shape)?);
        *state = Some(Arc::clone(&model));
        Ok(model)
    }

    /// Force a fresh load. The previous model stays in place if the new load
    /// fails.
    pub fn reload(&self) -> Result<Arc<LoadedModel>, DetectError> {
        let model = Arc::new(self.loader.load(&self.config, self.input_shape)?);
        let mut state = self
            .state
            .lock()
            .map_err(|_| DetectError::scoring("model state lock poisoned"))?;
        *state = Some(Arc::clone(&model));
        Ok(model)
    }

    pub fn score(&self, batch: &Array4<f32>) -> Result<f32, DetectError> {
        self.ensure_loaded()?.score(batch)
    }
}
