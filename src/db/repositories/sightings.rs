use anyhow::Result;
use rusqlite::{params, Row};

use crate::db::{connection::Database, helpers::parse_datetime, models::SightingRecord};

fn row_to_sighting(row: &Row) -> Result<SightingRecord> {
    let observed_at: String = row.get("observed_at")?;
    Ok(SightingRecord {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        label: row.get("label")?,
        confidence: row.get("confidence")?,
        novel: row.get("novel")?,
        observed_at: parse_datetime(&observed_at, "observed_at")?,
        snapshot_path: row.get("snapshot_path")?,
    })
}

impl Database {
    /// Insert a sighting and return its row id.
    pub async fn insert_sighting(&self, sighting: &SightingRecord) -> Result<i64> {
        let record = sighting.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sightings (session_id, label, confidence, novel, observed_at, snapshot_path)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.session_id,
                    record.label,
                    record.confidence,
                    record.novel,
                    record.observed_at.to_rfc3339(),
                    record.snapshot_path,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn set_sighting_snapshot(&self, sighting_id: i64, path: &str) -> Result<()> {
        let path = path.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE sightings SET snapshot_path = ?1 WHERE id = ?2",
                params![path, sighting_id],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_sightings_for_session(&self, session_id: &str) -> Result<Vec<SightingRecord>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, label, confidence, novel, observed_at, snapshot_path
                 FROM sightings
                 WHERE session_id = ?1
                 ORDER BY observed_at ASC, id ASC",
            )?;
            let mut rows = stmt.query(params![session_id])?;
            let mut sightings = Vec::new();
            while let Some(row) = rows.next()? {
                sightings.push(row_to_sighting(row)?);
            }
            Ok(sightings)
        })
        .await
    }
}
