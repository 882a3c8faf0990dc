use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const MODEL_PATH_VAR: &str = "VERIWAVE_MODEL_PATH";
pub const LABELS_PATH_VAR: &str = "VERIWAVE_LABELS_PATH";
pub const MODEL_INPUT_VAR: &str = "VERIWAVE_MODEL_INPUT";

/// Feature-extraction parameters. The defaults are the values the classifier
/// was trained against; changing any of them breaks confidence parity with
/// existing model artifacts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureConfig {
    pub sample_rate: u32,
    pub coefficient_count: usize,
    pub max_duration_seconds: f32,
    pub min_duration_seconds: f32,
    pub window_size: usize,
    pub hop_size: usize,
    pub mel_bands: usize,
    pub target_frames: usize,
    pub image_size: usize,
    pub channels: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            coefficient_count: 40,
            max_duration_seconds: 12.0,
            min_duration_seconds: 0.1,
            window_size: 2048,
            hop_size: 512,
            mel_bands: 128,
            target_frames: 224,
            image_size: 128,
            channels: 3,
        }
    }
}

impl FeatureConfig {
    pub fn max_samples(&self) -> usize {
        (self.sample_rate as f32 * self.max_duration_seconds) as usize
    }

    pub fn min_samples(&self) -> usize {
        (self.sample_rate as f32 * self.min_duration_seconds) as usize
    }

    pub fn tensor_shape(&self) -> [usize; 3] {
        [self.image_size, self.image_size, self.channels]
    }

    /// Expected scoring input: the tensor shape with a batch axis of 1.
    pub fn batch_shape(&self) -> [usize; 4] {
        [1, self.image_size, self.image_size, self.channels]
    }
}

/// Locations of the classifier and label-mapping artifacts plus the name of
/// the model's input tensor. Environment-driven, never hardcoded by callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    pub model_path: PathBuf,
    pub label_map_path: PathBuf,
    pub input_name: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/detector.onnx"),
            label_map_path: PathBuf::from("models/labels.json"),
            input_name: "input".to_string(),
        }
    }
}

impl ModelConfig {
    pub fn new(model_path: impl Into<PathBuf>, label_map_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            label_map_path: label_map_path.into(),
            ..Default::default()
        }
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_path: env::var_os(MODEL_PATH_VAR)
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            label_map_path: env::var_os(LABELS_PATH_VAR)
                .map(PathBuf::from)
                .unwrap_or(defaults.label_map_path),
            input_name: env::var(MODEL_INPUT_VAR).unwrap_or(defaults.input_name),
        }
    }
}
