//! Session history rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{SessionMode, SessionSummary};

/// Lifecycle of a stored session. `Interrupted` marks rows left `Running` by a
/// process that never finished them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RecordStatus {
    Running,
    Completed,
    Stopped,
    Interrupted,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Running => "Running",
            RecordStatus::Completed => "Completed",
            RecordStatus::Stopped => "Stopped",
            RecordStatus::Interrupted => "Interrupted",
        }
    }

    pub fn from_summary(summary: &SessionSummary) -> Self {
        if summary.timed_out {
            RecordStatus::Completed
        } else {
            RecordStatus::Stopped
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub mode: SessionMode,
    pub status: RecordStatus,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub elapsed_ms: u64,
    pub species_count: u64,
    pub score: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn started(
        id: String,
        mode: SessionMode,
        duration_ms: Option<u64>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            mode,
            status: RecordStatus::Running,
            started_at,
            stopped_at: None,
            duration_ms,
            elapsed_ms: 0,
            species_count: 0,
            score: 0,
            created_at: started_at,
            updated_at: started_at,
        }
    }
}
