use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::detection::debouncer::DebounceConfig;
use crate::error::{SessionError, MAX_ARCADE_DURATION};
use crate::models::{
    Classification, SessionMode, SessionStatus, SessionSummary, Sighting, StartRequest,
};
use crate::settings::{DetectionSettings, PersistPolicy};

use super::state::Session;
use super::tracker::{Novelty, TrackOutcome};

/// Everything the presentation layer needs after one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameUpdate {
    pub session_id: Option<String>,
    pub status: SessionStatus,
    pub mode: Option<SessionMode>,
    /// Latest raw classification, shown even when it is below the dwell threshold.
    pub current: Option<Classification>,
    /// Whether `current` passed the confidence and label filters.
    pub detected: bool,
    pub remaining: Option<Duration>,
    pub score: Option<u32>,
    pub sighting: Option<Sighting>,
    pub outcome: Option<TrackOutcome>,
    /// Set on the frame that finished the session.
    pub summary: Option<SessionSummary>,
}

impl FrameUpdate {
    pub fn novel(&self) -> Option<bool> {
        self.outcome
            .map(|outcome| outcome.novelty == Novelty::Novel)
    }

    pub fn should_persist(&self) -> bool {
        self.outcome.map(|outcome| outcome.persist).unwrap_or(false)
    }
}

/// Point-in-time view for status queries.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: Option<String>,
    pub status: SessionStatus,
    pub mode: Option<SessionMode>,
    pub elapsed: Duration,
    pub remaining: Option<Duration>,
    pub species_count: usize,
    pub score: Option<u32>,
}

/// Idle -> Running -> Finished -> Idle.
///
/// Pure and synchronous: every operation takes the current `Instant`, so the
/// caller decides where time comes from.
#[derive(Debug)]
pub struct SessionController {
    detection: DetectionSettings,
    persist_policy: PersistPolicy,
    session: Option<Session>,
}

impl SessionController {
    pub fn new(detection: DetectionSettings, persist_policy: PersistPolicy) -> Self {
        Self {
            detection,
            persist_policy,
            session: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.session
            .as_ref()
            .map(|session| session.status)
            .unwrap_or(SessionStatus::Idle)
    }

    pub fn is_running(&self) -> bool {
        self.status() == SessionStatus::Running
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn running_session_id(&self) -> Option<&str> {
        self.session
            .as_ref()
            .filter(|session| session.is_running())
            .map(|session| session.id.as_str())
    }

    /// Idle -> Running. A finished session that was never reset is discarded.
    pub fn start(
        &mut self,
        request: StartRequest,
        started_at: DateTime<Utc>,
        now: Instant,
    ) -> Result<&Session, SessionError> {
        if let Some(session) = self.session.as_ref().filter(|s| s.is_running()) {
            return Err(SessionError::AlreadyRunning(session.mode));
        }

        self.detection.validate()?;

        let duration = match request.mode {
            SessionMode::Arcade => match request.duration {
                None => return Err(SessionError::MissingDuration),
                Some(duration) if duration.is_zero() => return Err(SessionError::ZeroDuration),
                Some(duration)
                    if duration > MAX_ARCADE_DURATION || now.checked_add(duration).is_none() =>
                {
                    return Err(SessionError::DurationTooLong(duration))
                }
                Some(duration) => Some(duration),
            },
            SessionMode::Explore => None,
        };

        let session = Session::begin(
            Uuid::new_v4().to_string(),
            request.mode,
            duration,
            DebounceConfig::from(&self.detection),
            started_at,
            now,
        );
        Ok(self.session.insert(session))
    }

    /// Running -> Finished. No-op (returns `None`) when nothing is running.
    pub fn stop(&mut self, now: Instant) -> Option<SessionSummary> {
        if let Some(summary) = self.expire(now) {
            return Some(summary);
        }

        let session = self.session.as_mut().filter(|s| s.is_running())?;
        session.finish(now, false);
        Some(session.summary(now))
    }

    /// Finished -> Idle. Idle stays Idle; a running session must be stopped first.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        match self.status() {
            SessionStatus::Running => Err(SessionError::InvalidTransition {
                action: "reset",
                status: SessionStatus::Running,
            }),
            SessionStatus::Finished | SessionStatus::Idle => {
                self.session = None;
                Ok(())
            }
        }
    }

    /// Finish an Arcade session whose countdown has run out.
    pub fn expire(&mut self, now: Instant) -> Option<SessionSummary> {
        let session = self.session.as_mut().filter(|s| s.is_running())?;
        let deadline = session.deadline()?;
        if now < deadline {
            return None;
        }
        session.finish(deadline, true);
        Some(session.summary(now))
    }

    /// Process one frame: deadline check, debounce, track, and report.
    pub fn tick(&mut self, classification: Option<&Classification>, now: Instant) -> FrameUpdate {
        let summary = self.expire(now);
        let persist_policy = self.persist_policy;

        let (detected, sighting, outcome) = match self.session.as_mut() {
            Some(session) if summary.is_none() && session.is_running() => {
                let detected = classification
                    .map(|c| session.debouncer.accepts(c))
                    .unwrap_or(false);
                let sighting = session.debouncer.observe(classification, now);
                let outcome = sighting
                    .as_ref()
                    .map(|sighting| session.tracker.record(sighting, session.mode, persist_policy));
                (detected, sighting, outcome)
            }
            _ => (false, None, None),
        };

        FrameUpdate {
            current: classification.cloned(),
            detected,
            sighting,
            outcome,
            ..self.frame_update(summary, now)
        }
    }

    /// A round that produced no camera frame. The countdown is re-evaluated
    /// and reported, but the debouncer is not fed.
    pub fn refresh(&mut self, now: Instant) -> FrameUpdate {
        let summary = self.expire(now);
        self.frame_update(summary, now)
    }

    fn frame_update(&self, summary: Option<SessionSummary>, now: Instant) -> FrameUpdate {
        let session = self.session.as_ref();
        FrameUpdate {
            session_id: session.map(|s| s.id.clone()),
            status: self.status(),
            mode: session.map(|s| s.mode),
            current: None,
            detected: false,
            remaining: session.and_then(|s| s.remaining(now)),
            score: session.and_then(Session::score),
            sighting: None,
            outcome: None,
            summary,
        }
    }

    pub fn snapshot(&self, now: Instant) -> SessionSnapshot {
        let session = self.session.as_ref();
        SessionSnapshot {
            session_id: session.map(|s| s.id.clone()),
            status: self.status(),
            mode: session.map(|s| s.mode),
            elapsed: session.map(|s| s.elapsed(now)).unwrap_or_default(),
            remaining: session.and_then(|s| s.remaining(now)),
            species_count: session
                .map(|s| s.tracker().species_count())
                .unwrap_or(0),
            score: session.and_then(Session::score),
        }
    }
}
