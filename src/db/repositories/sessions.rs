use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_mode, parse_optional_datetime, parse_status, to_i64, to_u64},
    models::{RecordStatus, SessionRecord},
};
use crate::models::SessionSummary;

const SESSION_COLUMNS: &str = "id, mode, status, started_at, stopped_at, duration_ms, elapsed_ms, species_count, score, created_at, updated_at";

fn row_to_session(row: &Row) -> Result<SessionRecord> {
    let mode: String = row.get("mode")?;
    let status: String = row.get("status")?;
    let started_at: String = row.get("started_at")?;
    let stopped_at: Option<String> = row.get("stopped_at")?;
    let duration_ms: Option<i64> = row.get("duration_ms")?;
    let elapsed_ms: i64 = row.get("elapsed_ms")?;
    let species_count: i64 = row.get("species_count")?;
    let score: i64 = row.get("score")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(SessionRecord {
        id: row.get("id")?,
        mode: parse_mode(&mode)?,
        status: parse_status(&status)?,
        started_at: parse_datetime(&started_at, "started_at")?,
        stopped_at: parse_optional_datetime(stopped_at, "stopped_at")?,
        duration_ms: duration_ms
            .map(|ms| to_u64(ms, "duration_ms"))
            .transpose()?,
        elapsed_ms: to_u64(elapsed_ms, "elapsed_ms")?,
        species_count: to_u64(species_count, "species_count")?,
        score: to_u64(score, "score")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    pub async fn insert_session(&self, session: &SessionRecord) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, mode, status, started_at, stopped_at, duration_ms, elapsed_ms, species_count, score, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    record.id,
                    record.mode.as_str(),
                    record.status.as_str(),
                    record.started_at.to_rfc3339(),
                    record.stopped_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.duration_ms.map(to_i64).transpose()?,
                    to_i64(record.elapsed_ms)?,
                    to_i64(record.species_count)?,
                    to_i64(record.score)?,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Record the final summary of a session that left Running.
    pub async fn finish_session(
        &self,
        summary: &SessionSummary,
        stopped_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = summary.session_id.clone();
        let status = RecordStatus::from_summary(summary);
        let elapsed_ms = summary.elapsed.as_millis() as u64;
        let species_count = summary.species_count as u64;
        let score = u64::from(summary.score);

        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE sessions
                 SET status = ?1,
                     stopped_at = ?2,
                     elapsed_ms = ?3,
                     species_count = ?4,
                     score = ?5,
                     updated_at = ?6
                 WHERE id = ?7",
                params![
                    status.as_str(),
                    stopped_at.to_rfc3339(),
                    to_i64(elapsed_ms)?,
                    to_i64(species_count)?,
                    to_i64(score)?,
                    stopped_at.to_rfc3339(),
                    session_id,
                ],
            )?;

            if rows_affected == 0 {
                return Err(anyhow!("Session {session_id} not found"));
            }
            Ok(())
        })
        .await
    }

    pub async fn mark_session_interrupted(
        &self,
        session_id: &str,
        stopped_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE sessions
                 SET status = ?1,
                     stopped_at = ?2,
                     updated_at = ?3
                 WHERE id = ?4",
                params![
                    RecordStatus::Interrupted.as_str(),
                    stopped_at.to_rfc3339(),
                    stopped_at.to_rfc3339(),
                    session_id,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<SessionRecord> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![session_id])?;
            match rows.next()? {
                Some(row) => row_to_session(row),
                None => Err(anyhow!("Session {session_id} not found")),
            }
        })
        .await
    }

    /// Sessions a previous process left running.
    pub async fn get_incomplete_sessions(&self) -> Result<Vec<SessionRecord>> {
        self.execute(|conn| {
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE status = 'Running' ORDER BY started_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }
            Ok(sessions)
        })
        .await
    }

    pub async fn list_recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        let limit = to_i64(limit as u64)?;
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE status != 'Running'
                 ORDER BY started_at DESC
                 LIMIT ?1"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![limit])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }
            Ok(sessions)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionMode;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(dir.path().join("history.sqlite3")).expect("db");
        (dir, db)
    }

    #[tokio::test]
    async fn session_round_trip_through_finish() {
        let (_dir, db) = open();
        let started_at = Utc::now();
        let record = SessionRecord::started("s-1".into(), SessionMode::Arcade, Some(60_000), started_at);
        db.insert_session(&record).await.expect("insert");

        let summary = SessionSummary {
            session_id: "s-1".into(),
            mode: SessionMode::Arcade,
            species_count: 3,
            score: 3,
            elapsed: Duration::from_secs(60),
            timed_out: true,
        };
        db.finish_session(&summary, started_at + ChronoDuration::seconds(60))
            .await
            .expect("finish");

        let stored = db.get_session("s-1").await.expect("get");
        assert_eq!(stored.status, RecordStatus::Completed);
        assert_eq!(stored.mode, SessionMode::Arcade);
        assert_eq!(stored.duration_ms, Some(60_000));
        assert_eq!(stored.elapsed_ms, 60_000);
        assert_eq!(stored.score, 3);
        assert!(stored.stopped_at.is_some());
    }

    #[tokio::test]
    async fn finishing_unknown_session_fails() {
        let (_dir, db) = open();
        let summary = SessionSummary {
            session_id: "missing".into(),
            mode: SessionMode::Explore,
            species_count: 0,
            score: 0,
            elapsed: Duration::ZERO,
            timed_out: false,
        };
        assert!(db.finish_session(&summary, Utc::now()).await.is_err());
    }

    #[tokio::test]
    async fn recovers_running_sessions_as_interrupted() {
        let (_dir, db) = open();
        let now = Utc::now();
        db.insert_session(&SessionRecord::started("old".into(), SessionMode::Explore, None, now))
            .await
            .expect("insert");

        let incomplete = db.get_incomplete_sessions().await.expect("incomplete");
        assert_eq!(incomplete.len(), 1);
        assert!(db.list_recent_sessions(10).await.expect("list").is_empty());

        db.mark_session_interrupted("old", now).await.expect("mark");
        assert!(db.get_incomplete_sessions().await.expect("incomplete").is_empty());

        let recent = db.list_recent_sessions(10).await.expect("list");
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].status, RecordStatus::Interrupted);
    }

    #[tokio::test]
    async fn recent_sessions_are_newest_first() {
        let (_dir, db) = open();
        let base = Utc::now();
        for (idx, id) in ["a", "b", "c"].iter().enumerate() {
            let started_at = base + ChronoDuration::minutes(idx as i64);
            db.insert_session(&SessionRecord::started(id.to_string(), SessionMode::Explore, None, started_at))
                .await
                .expect("insert");
            db.mark_session_interrupted(id, started_at).await.expect("close");
        }

        let recent = db.list_recent_sessions(2).await.expect("list");
        let ids: Vec<_> = recent.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }
}
