/// Session history persistence
///
/// One row per finished session. All queries are parameterized.
use anyhow::{Context, Result};
use sdk::events::{SessionOutcome, TaskResponse};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// Finished session record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub task: String,
    pub outcome: SessionOutcome,
    pub iterations: i64,
    pub development_passes: i64,
    pub final_response: String,
    pub artifact_count: i64,
    pub started_at: i64,
    pub finished_at: i64,
}

impl SessionRecord {
    /// Build a record from a session's final response
    pub fn from_response(task: &str, response: &TaskResponse, started_at: i64) -> Self {
        Self {
            id: response.session_id.clone(),
            task: task.to_string(),
            outcome: response.outcome,
            iterations: i64::from(response.iterations),
            development_passes: i64::from(response.development_passes),
            final_response: response.final_response.clone(),
            artifact_count: response.artifacts.len() as i64,
            started_at,
            finished_at: chrono::Utc::now().timestamp(),
        }
    }

    fn from_row(r: &SqliteRow) -> Self {
        Self {
            id: r.get("id"),
            task: r.get("task"),
            outcome: r
                .get::<String, _>("outcome")
                .parse()
                .unwrap_or(SessionOutcome::Failed),
            iterations: r.get("iterations"),
            development_passes: r.get("development_passes"),
            final_response: r.get("final_response"),
            artifact_count: r.get("artifact_count"),
            started_at: r.get("started_at"),
            finished_at: r.get("finished_at"),
        }
    }
}

/// Session repository for database operations
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a finished session
    pub async fn record(&self, record: &SessionRecord) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO sessions \
             (id, task, outcome, iterations, development_passes, final_response, artifact_count, started_at, finished_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.task)
        .bind(record.outcome.as_str())
        .bind(record.iterations)
        .bind(record.development_passes)
        .bind(&record.final_response)
        .bind(record.artifact_count)
        .bind(record.started_at)
        .bind(record.finished_at)
        .execute(&self.pool)
        .await
        .context("Failed to record session")?;

        Ok(())
    }

    /// Get a session by ID
    pub async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let row = sqlx::query(
            "SELECT id, task, outcome, iterations, development_passes, final_response, artifact_count, started_at, finished_at \
             FROM sessions WHERE id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch session")?;

        Ok(row.as_ref().map(SessionRecord::from_row))
    }

    /// Most recently finished sessions, newest first
    pub async fn recent(&self, limit: i64) -> Result<Vec<SessionRecord>> {
        let rows = sqlx::query(
            "SELECT id, task, outcome, iterations, development_passes, final_response, artifact_count, started_at, finished_at \
             FROM sessions ORDER BY finished_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch recent sessions")?;

        Ok(rows.iter().map(SessionRecord::from_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tempfile::TempDir;

    fn make_record(id: &str, outcome: SessionOutcome, finished_at: i64) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            task: "build a snake game".to_string(),
            outcome,
            iterations: 3,
            development_passes: 1,
            final_response: "done".to_string(),
            artifact_count: 3,
            started_at: finished_at - 10,
            finished_at,
        }
    }

    #[tokio::test]
    async fn test_record_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();
        let repo = db.sessions();

        let record = make_record("s-1", SessionOutcome::Approved, 100);
        repo.record(&record).await.unwrap();

        let loaded = repo.get("s-1").await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recent_orders_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();
        let repo = db.sessions();

        repo.record(&make_record("old", SessionOutcome::Completed, 100))
            .await
            .unwrap();
        repo.record(&make_record("new", SessionOutcome::IterationLimitExceeded, 200))
            .await
            .unwrap();

        let recent = repo.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, "new");
        assert_eq!(recent[0].outcome, SessionOutcome::IterationLimitExceeded);

        assert_eq!(repo.recent(1).await.unwrap().len(), 1);
    }

    #[test]
    fn test_from_response() {
        let response = TaskResponse {
            session_id: "abc".into(),
            outcome: SessionOutcome::Approved,
            final_response: "ok".into(),
            iterations: 4,
            development_passes: 2,
            artifacts: vec!["a".into(), "b".into()],
            entry_link: None,
            error: None,
        };
        let record = SessionRecord::from_response("task", &response, 1);
        assert_eq!(record.id, "abc");
        assert_eq!(record.iterations, 4);
        assert_eq!(record.artifact_count, 2);
        assert!(record.finished_at >= record.started_at);
    }
}
