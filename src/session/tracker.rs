use std::collections::BTreeSet;

use crate::models::{SessionMode, Sighting};
use crate::settings::PersistPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Novelty {
    Novel,
    Repeat,
}

/// What one confirmed sighting did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackOutcome {
    pub novelty: Novelty,
    pub score_delta: u32,
    /// Explore only: save a snapshot for this sighting.
    pub persist: bool,
}

/// Distinct species seen in the current session. Only ever grows; a new
/// session gets a new tracker.
#[derive(Debug, Clone, Default)]
pub struct NoveltyTracker {
    observed: BTreeSet<String>,
    score: u32,
}

impl NoveltyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        sighting: &Sighting,
        mode: SessionMode,
        policy: PersistPolicy,
    ) -> TrackOutcome {
        let novelty = if self.observed.insert(sighting.label.clone()) {
            Novelty::Novel
        } else {
            Novelty::Repeat
        };

        match mode {
            SessionMode::Arcade => {
                let score_delta = u32::from(novelty == Novelty::Novel);
                self.score += score_delta;
                TrackOutcome {
                    novelty,
                    score_delta,
                    persist: false,
                }
            }
            SessionMode::Explore => TrackOutcome {
                novelty,
                score_delta: 0,
                persist: match policy {
                    PersistPolicy::NovelOnly => novelty == Novelty::Novel,
                    PersistPolicy::EverySighting => true,
                },
            },
        }
    }

    pub fn species_count(&self) -> usize {
        self.observed.len()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

}
