use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One confirmed sighting as stored in history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SightingRecord {
    pub id: Option<i64>,
    pub session_id: String,
    pub label: String,
    pub confidence: f64,
    pub novel: bool,
    pub observed_at: DateTime<Utc>,
    pub snapshot_path: Option<String>,
}
