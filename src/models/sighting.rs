use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Top prediction for one frame, as returned by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    /// Probability in `[0, 1]`.
    pub confidence: f32,
}

impl Classification {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// Whole-number percentage used by the overlay.
    pub fn percent(&self) -> u32 {
        (self.confidence.clamp(0.0, 1.0) * 100.0).round() as u32
    }
}

/// A debounced, confirmed detection of one species.
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    pub label: String,
    pub confidence: f32,
    pub timestamp: Instant,
}
