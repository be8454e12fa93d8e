use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionMode {
    Explore,
    Arcade,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Explore => "Explore",
            SessionMode::Arcade => "Arcade",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    Finished,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "Idle",
            SessionStatus::Running => "Running",
            SessionStatus::Finished => "Finished",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mode selection command. `duration` is required for Arcade and ignored
/// for Explore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartRequest {
    pub mode: SessionMode,
    pub duration: Option<Duration>,
}

impl StartRequest {
    pub fn explore() -> Self {
        Self {
            mode: SessionMode::Explore,
            duration: None,
        }
    }

    pub fn arcade(duration: Duration) -> Self {
        Self {
            mode: SessionMode::Arcade,
            duration: Some(duration),
        }
    }
}

/// What the presentation layer shows once a session has finished.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_id: String,
    pub mode: SessionMode,
    pub species_count: usize,
    pub score: u32,
    pub elapsed: Duration,
    /// `true` when an Arcade countdown ran out, `false` when stopped early.
    pub timed_out: bool,
}
