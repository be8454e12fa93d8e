use std::time::Duration;
use thiserror::Error;

use crate::models::{SessionMode, SessionStatus};

/// Longest Arcade round a session accepts.
pub const MAX_ARCADE_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Misuse of the session state machine. Never fatal: the controller is left
/// exactly as it was before the rejected call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("a {0} session is already running")]
    AlreadyRunning(SessionMode),
    #[error("cannot {action} while the session is {status}")]
    InvalidTransition {
        action: &'static str,
        status: SessionStatus,
    },
    #[error("arcade sessions require a duration")]
    MissingDuration,
    #[error("arcade duration must be greater than zero")]
    ZeroDuration,
    #[error("arcade duration of {}s exceeds the {}s limit", .0.as_secs(), MAX_ARCADE_DURATION.as_secs())]
    DurationTooLong(Duration),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Detection settings that cannot drive a session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("confidence threshold {0} is outside [0, 1]")]
    ThresholdOutOfRange(f32),
    #[error("dwell window must be at least one frame or a positive duration")]
    EmptyDwell,
    #[error("{field} must be a finite, non-negative number of seconds (got {value})")]
    InvalidSeconds { field: &'static str, value: f64 },
}
