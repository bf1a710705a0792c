//! SQLite checkpoint repository implementation.
//!
//! Checkpoint state is stored as a JSON column. Ordering relies on the text
//! form of UUID v7 ids sorting in creation order.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use pmassist_core::repository::checkpoint::CheckpointRepository;
use pmassist_types::error::RepositoryError;
use pmassist_types::thread::{Checkpoint, ConversationState, ThreadSummary};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `CheckpointRepository`.
pub struct SqliteCheckpointRepository {
    pool: DatabasePool,
}

impl SqliteCheckpointRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

struct CheckpointRow {
    thread_id: String,
    namespace: String,
    checkpoint_id: String,
    user_id: String,
    parent_id: Option<String>,
    state: String,
    created_at: String,
}

impl CheckpointRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            thread_id: row.try_get("thread_id")?,
            namespace: row.try_get("namespace")?,
            checkpoint_id: row.try_get("checkpoint_id")?,
            user_id: row.try_get("user_id")?,
            parent_id: row.try_get("parent_id")?,
            state: row.try_get("state")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_checkpoint(self) -> Result<Checkpoint, RepositoryError> {
        let state: ConversationState = serde_json::from_str(&self.state)
            .map_err(|e| RepositoryError::Query(format!("invalid checkpoint state: {e}")))?;

        Ok(Checkpoint {
            thread_id: self.thread_id,
            user_id: self.user_id,
            namespace: self.namespace,
            checkpoint_id: parse_uuid(&self.checkpoint_id)?,
            parent_id: self.parent_id.as_deref().map(parse_uuid).transpose()?,
            state,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid checkpoint id: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn rows_to_checkpoints(
    rows: &[sqlx::sqlite::SqliteRow],
) -> Result<Vec<Checkpoint>, RepositoryError> {
    let mut checkpoints = Vec::with_capacity(rows.len());
    for row in rows {
        let cp_row =
            CheckpointRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
        checkpoints.push(cp_row.into_checkpoint()?);
    }
    Ok(checkpoints)
}

// ---------------------------------------------------------------------------
// CheckpointRepository implementation
// ---------------------------------------------------------------------------

impl CheckpointRepository for SqliteCheckpointRepository {
    async fn put(&self, checkpoint: &Checkpoint) -> Result<(), RepositoryError> {
        let state = serde_json::to_string(&checkpoint.state)
            .map_err(|e| RepositoryError::Query(format!("failed to encode state: {e}")))?;

        // Ownership check and insert share one write transaction.
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let owner: Option<String> = sqlx::query_scalar(
            "SELECT user_id FROM checkpoints WHERE thread_id = ? ORDER BY checkpoint_id ASC LIMIT 1",
        )
        .bind(&checkpoint.thread_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if owner.as_deref().is_some_and(|o| o != checkpoint.user_id) {
            return Err(RepositoryError::Forbidden(format!(
                "thread {} belongs to another user",
                checkpoint.thread_id
            )));
        }

        sqlx::query(
            r#"INSERT INTO checkpoints (thread_id, namespace, checkpoint_id, user_id, parent_id, state, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&checkpoint.thread_id)
        .bind(&checkpoint.namespace)
        .bind(checkpoint.checkpoint_id.to_string())
        .bind(&checkpoint.user_id)
        .bind(checkpoint.parent_id.map(|id| id.to_string()))
        .bind(state)
        .bind(format_datetime(&checkpoint.created_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.message().contains("UNIQUE") {
                    return RepositoryError::Conflict(format!(
                        "checkpoint {} already exists",
                        checkpoint.checkpoint_id
                    ));
                }
            }
            RepositoryError::Query(e.to_string())
        })?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn latest(
        &self,
        thread_id: &str,
        namespace: &str,
    ) -> Result<Option<Checkpoint>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM checkpoints WHERE thread_id = ? AND namespace = ? ORDER BY checkpoint_id DESC LIMIT 1",
        )
        .bind(thread_id)
        .bind(namespace)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let cp_row = CheckpointRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(cp_row.into_checkpoint()?))
            }
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        thread_id: &str,
        namespace: &str,
    ) -> Result<Vec<Checkpoint>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM checkpoints WHERE thread_id = ? AND namespace = ? ORDER BY checkpoint_id ASC",
        )
        .bind(thread_id)
        .bind(namespace)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_to_checkpoints(&rows)
    }

    async fn owner(&self, thread_id: &str) -> Result<Option<String>, RepositoryError> {
        sqlx::query_scalar(
            "SELECT user_id FROM checkpoints WHERE thread_id = ? ORDER BY checkpoint_id ASC LIMIT 1",
        )
        .bind(thread_id)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))
    }

    async fn list_threads(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ThreadSummary>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT thread_id,
                      MAX(checkpoint_id) AS last_checkpoint_id,
                      COUNT(*) AS checkpoint_count,
                      MAX(created_at) AS updated_at
               FROM checkpoints
               WHERE user_id = ?
               GROUP BY thread_id
               ORDER BY last_checkpoint_id DESC
               LIMIT ? OFFSET ?"#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut threads = Vec::with_capacity(rows.len());
        for row in &rows {
            let thread_id: String = row
                .try_get("thread_id")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let last: String = row
                .try_get("last_checkpoint_id")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let checkpoint_count: i64 = row
                .try_get("checkpoint_count")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let updated_at: String = row
                .try_get("updated_at")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

            threads.push(ThreadSummary {
                thread_id,
                last_checkpoint_id: parse_uuid(&last)?,
                checkpoint_count,
                updated_at: parse_datetime(&updated_at)?,
            });
        }

        Ok(threads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::test_support::test_pool;
    use pmassist_types::llm::Message;

    fn state(messages: &[&str]) -> ConversationState {
        ConversationState {
            messages: messages.iter().map(|m| Message::user(*m)).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_put_and_latest_roundtrip() {
        let repo = SqliteCheckpointRepository::new(test_pool().await);
        let first = Checkpoint::next("t1", "alice", None, state(&["hi"]));
        repo.put(&first).await.unwrap();
        let second = Checkpoint::next(
            "t1",
            "alice",
            Some(first.checkpoint_id),
            state(&["hi", "again"]),
        );
        repo.put(&second).await.unwrap();

        let latest = repo.latest("t1", "").await.unwrap().unwrap();
        assert_eq!(latest.checkpoint_id, second.checkpoint_id);
        assert_eq!(latest.parent_id, Some(first.checkpoint_id));
        assert_eq!(latest.state.messages.len(), 2);
        assert_eq!(latest.state.messages[1].content, "again");
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_checkpoint_id() {
        let repo = SqliteCheckpointRepository::new(test_pool().await);
        let mut ids = Vec::new();
        let mut parent = None;
        for i in 0..5 {
            let text = format!("m{i}");
            let cp = Checkpoint::next("t1", "alice", parent, state(&[text.as_str()]));
            parent = Some(cp.checkpoint_id);
            ids.push(cp.checkpoint_id);
            repo.put(&cp).await.unwrap();
        }

        let listed: Vec<_> = repo
            .list("t1", "")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.checkpoint_id)
            .collect();
        assert_eq!(listed, ids);
        assert_eq!(
            repo.latest("t1", "").await.unwrap().unwrap().checkpoint_id,
            *ids.iter().max().unwrap()
        );
    }

    #[tokio::test]
    async fn test_latest_missing_thread() {
        let repo = SqliteCheckpointRepository::new(test_pool().await);
        assert!(repo.latest("nope", "").await.unwrap().is_none());
        assert!(repo.owner("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_rejects_other_owner() {
        let repo = SqliteCheckpointRepository::new(test_pool().await);
        repo.put(&Checkpoint::next("t1", "alice", None, state(&["hi"])))
            .await
            .unwrap();

        let err = repo
            .put(&Checkpoint::next("t1", "bob", None, state(&["mine"])))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Forbidden(_)));
        assert_eq!(repo.owner("t1").await.unwrap().as_deref(), Some("alice"));
        assert_eq!(repo.list("t1", "").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_threads_most_recent_first_and_scoped() {
        let repo = SqliteCheckpointRepository::new(test_pool().await);
        repo.put(&Checkpoint::next("a", "alice", None, state(&["1"])))
            .await
            .unwrap();
        repo.put(&Checkpoint::next("b", "alice", None, state(&["1"])))
            .await
            .unwrap();
        repo.put(&Checkpoint::next("x", "bob", None, state(&["1"])))
            .await
            .unwrap();
        repo.put(&Checkpoint::next("a", "alice", None, state(&["1", "2"])))
            .await
            .unwrap();

        let threads = repo.list_threads("alice", 10, 0).await.unwrap();
        let ids: Vec<_> = threads.iter().map(|t| t.thread_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(threads[0].checkpoint_count, 2);

        let page = repo.list_threads("alice", 1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].thread_id, "b");
    }
}
