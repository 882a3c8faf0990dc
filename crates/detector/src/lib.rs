pub mod orchestrator;

pub use orchestrator::{classify, Detector};
