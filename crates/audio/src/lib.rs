pub mod features;
pub mod gate;
pub mod io;

pub use features::FeatureExtractor;
pub use gate::{noise_gate, GateStats};
pub use io::{AudioClip, AudioDecoder};
