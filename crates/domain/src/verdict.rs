use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed two-class label set the detector is defined over. Artifacts
/// carrying any other class names are rejected at load time.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Fake,
    Real,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Fake => "fake",
            Label::Real => "real",
        }
    }

    pub fn parse(name: &str) -> Option<Label> {
        match name {
            "fake" => Some(Label::Fake),
            "real" => Some(Label::Real),
            _ => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one inference request. `confidence` is the probability of the
/// predicted class, so it is always `max(s, 1 - s)` of the raw model score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Verdict {
    pub label: Label,
    pub confidence: f64,
}

impl Verdict {
    pub fn is_fake(&self) -> bool {
        self.label != Label::Real
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_names() {
        assert_eq!(Label::parse("fake"), Some(Label::Fake));
        assert_eq!(Label::parse("real"), Some(Label::Real));
        assert_eq!(Label::parse("synthetic"), None);
        assert_eq!(Label::Real.as_str(), "real");
    }

    #[test]
    fn verdict_serializes_lowercase_labels() {
        let verdict = Verdict {
            label: Label::Fake,
            confidence: 0.75,
        };
        let json = serde_json::to_string(&verdict).unwrap();
        assert!(json.contains("\"fake\""));
        assert!(verdict.is_fake());
    }
}
