pub mod fingerprint;
pub mod labels;
pub mod runtime;

pub use fingerprint::fingerprint;
pub use labels::LabelMapping;
pub use runtime::{
    ArtifactLoader, ConstantBackend, DiskLoader, LoadedModel, ModelRuntime, OnnxBackend,
    ScoringBackend,
};
