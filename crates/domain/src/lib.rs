pub mod config;
pub mod error;
pub mod verdict;

pub use crate::config::{FeatureConfig, ModelConfig};
pub use crate::error::DetectError;
pub use crate::verdict::{Label, Verdict};
