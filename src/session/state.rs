use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

use crate::detection::{debouncer::DebounceConfig, Debouncer};
use crate::models::{SessionMode, SessionStatus, SessionSummary};

use super::tracker::NoveltyTracker;

/// The one live session. Owned by [`SessionController`](super::SessionController)
/// and handed by reference to the debouncer and tracker on every frame.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub mode: SessionMode,
    pub status: SessionStatus,
    /// Wall-clock start, for history records.
    pub started_at: DateTime<Utc>,
    /// Monotonic start; all countdown math is relative to this.
    pub start_time: Instant,
    pub duration: Option<Duration>,
    pub finished_at: Option<Instant>,
    pub timed_out: bool,
    pub(super) tracker: NoveltyTracker,
    pub(super) debouncer: Debouncer,
}

impl Session {
    pub(super) fn begin(
        id: String,
        mode: SessionMode,
        duration: Option<Duration>,
        debounce: DebounceConfig,
        started_at: DateTime<Utc>,
        now: Instant,
    ) -> Self {
        Self {
            id,
            mode,
            status: SessionStatus::Running,
            started_at,
            start_time: now,
            duration: match mode {
                SessionMode::Arcade => duration,
                SessionMode::Explore => None,
            },
            finished_at: None,
            timed_out: false,
            tracker: NoveltyTracker::new(),
            debouncer: Debouncer::new(debounce),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    /// Time since start, frozen once finished and never past the Arcade duration.
    pub fn elapsed(&self, now: Instant) -> Duration {
        let end = self.finished_at.unwrap_or(now);
        let elapsed = end.saturating_duration_since(self.start_time);
        match self.duration {
            Some(duration) => elapsed.min(duration),
            None => elapsed,
        }
    }

    /// `max(0, duration - elapsed)`, recomputed from the clock on every call.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.duration
            .map(|duration| duration.saturating_sub(self.elapsed(now)))
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.duration
            .and_then(|duration| self.start_time.checked_add(duration))
    }

    pub fn tracker(&self) -> &NoveltyTracker {
        &self.tracker
    }

    pub fn score(&self) -> Option<u32> {
        match self.mode {
            SessionMode::Arcade => Some(self.tracker.score()),
            SessionMode::Explore => None,
        }
    }

    pub(super) fn finish(&mut self, at: Instant, timed_out: bool) {
        self.status = SessionStatus::Finished;
        self.finished_at = Some(at);
        self.timed_out = timed_out;
    }

    pub fn summary(&self, now: Instant) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            mode: self.mode,
            species_count: self.tracker.species_count(),
            score: self.tracker.score(),
            elapsed: self.elapsed(now),
            timed_out: self.timed_out,
        }
    }
}
