use std::time::{Duration, Instant};

use crate::models::{Classification, Sighting};
use crate::settings::{clamp_seconds, DetectionSettings, DwellWindow};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dwell {
    Frames(u32),
    Elapsed(Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DebounceConfig {
    pub confidence_threshold: f32,
    pub dwell: Dwell,
    pub cooldown: Duration,
    /// Lowercased substrings that disqualify a label.
    pub rejected_labels: Vec<String>,
}

impl From<&DetectionSettings> for DebounceConfig {
    fn from(settings: &DetectionSettings) -> Self {
        let dwell = match settings.dwell {
            DwellWindow::Frames(frames) => Dwell::Frames(frames.max(1)),
            DwellWindow::Seconds(secs) => Dwell::Elapsed(clamp_seconds(secs)),
        };
        Self {
            confidence_threshold: settings.confidence_threshold,
            dwell,
            cooldown: settings.cooldown(),
            rejected_labels: settings
                .rejected_labels
                .iter()
                .map(|label| label.to_lowercase())
                .filter(|label| !label.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    label: String,
    frames: u32,
    since: Instant,
}

#[derive(Debug, Clone)]
struct LastEmission {
    label: String,
    at: Instant,
    /// Set once any other confident label has been on top since `at`.
    interrupted: bool,
}

/// Turns noisy per-frame classifications into stable sightings.
///
/// A label must stay the confident top prediction for the dwell window before
/// it is emitted. The same label is emitted again only after the subject
/// changed away and came back, or after the cooldown has elapsed. State is the
/// current run plus the last emission, nothing more.
#[derive(Debug, Clone)]
pub struct Debouncer {
    config: DebounceConfig,
    candidate: Option<Candidate>,
    last: Option<LastEmission>,
}

impl Debouncer {
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            candidate: None,
            last: None,
        }
    }

    /// Whether this classification counts as a detection at all.
    pub fn accepts(&self, classification: &Classification) -> bool {
        let label = classification.label.trim();
        if label.is_empty() || !classification.confidence.is_finite() {
            return false;
        }
        if classification.confidence < self.config.confidence_threshold {
            return false;
        }
        let lowered = label.to_lowercase();
        !self
            .config
            .rejected_labels
            .iter()
            .any(|rejected| lowered.contains(rejected.as_str()))
    }

    /// Feed one frame's result. `None` (classifier failure or empty output)
    /// is "no detection", as is anything [`accepts`](Self::accepts) rejects.
    pub fn observe(
        &mut self,
        classification: Option<&Classification>,
        now: Instant,
    ) -> Option<Sighting> {
        let Some(classification) = classification.filter(|c| self.accepts(c)) else {
            self.candidate = None;
            return None;
        };
        let label = classification.label.trim();

        match self.candidate.as_mut() {
            Some(candidate) if candidate.label == label => {
                candidate.frames = candidate.frames.saturating_add(1);
            }
            _ => {
                if let Some(last) = self.last.as_mut() {
                    if last.label != label {
                        last.interrupted = true;
                    }
                }
                self.candidate = Some(Candidate {
                    label: label.to_string(),
                    frames: 1,
                    since: now,
                });
            }
        }

        let candidate = self.candidate.as_ref()?;
        if !self.dwell_satisfied(candidate, now) {
            return None;
        }

        if let Some(last) = &self.last {
            let within_cooldown = now.saturating_duration_since(last.at) < self.config.cooldown;
            if last.label == candidate.label && !last.interrupted && within_cooldown {
                return None;
            }
        }

        self.last = Some(LastEmission {
            label: candidate.label.clone(),
            at: now,
            interrupted: false,
        });

        Some(Sighting {
            label: candidate.label.clone(),
            confidence: classification.confidence,
            timestamp: now,
        })
    }

    fn dwell_satisfied(&self, candidate: &Candidate, now: Instant) -> bool {
        match self.config.dwell {
            Dwell::Frames(frames) => candidate.frames >= frames,
            Dwell::Elapsed(window) => now.saturating_duration_since(candidate.since) >= window,
        }
    }
}
