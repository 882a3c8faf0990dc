use std::fs;
use std::path::Path;

use veriwave_domain::{DetectError, Label};

/// Ordered correspondence between the model's output class indices and label
/// names, read from a JSON array (index order = model output order).
///
/// The label set is validated once at load: anything other than exactly
/// {fake, real} is a corrupt artifact. The positional order itself is taken
/// from the artifact, so a retrained encoder that swaps the indices keeps
/// working.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMapping {
    classes: [Label; 2],
}

impl LabelMapping {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DetectError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                DetectError::ArtifactNotFound(path.to_path_buf())
            } else {
                DetectError::corrupt(format!("read {}: {err}", path.display()))
            }
        })?;
        let names: Vec<String> = serde_json::from_slice(&bytes)
            .map_err(|err| DetectError::corrupt(format!("label mapping: {err}")))?;
        Self::from_names(&names)
    }

    pub fn from_names(names: &[String]) -> Result<Self, DetectError> {
        if names.len() != 2 {
            return Err(DetectError::corrupt(format!(
                "label mapping must list exactly two classes, found {}",
                names.len()
            )));
        }
        let first = Label::parse(&names[0])
            .ok_or_else(|| DetectError::corrupt(format!("unknown class name: {}", names[0])))?;
        let second = Label::parse(&names[1])
            .ok_or_else(|| DetectError::corrupt(format!("unknown class name: {}", names[1])))?;
        if first == second {
            return Err(DetectError::corrupt(
                "label mapping must contain both fake and real",
            ));
        }
        Ok(Self {
            classes: [first, second],
        })
    }

    /// Label at model output index 0.
    pub fn negative(&self) -> Label {
        self.classes[0]
    }

    /// Label at model output index 1 (the class the raw score is for).
    pub fn positive(&self) -> Label {
        self.classes[1]
    }

    pub fn classes(&self) -> &[Label; 2] {
        &self.classes
    }
}
