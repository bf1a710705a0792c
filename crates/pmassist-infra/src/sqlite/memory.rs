//! SQLite user memory repository implementation.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use pmassist_core::repository::memory::MemoryRepository;
use pmassist_types::error::RepositoryError;
use pmassist_types::memory::UserMemory;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `MemoryRepository`.
pub struct SqliteMemoryRepository {
    pool: DatabasePool,
}

impl SqliteMemoryRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn row_to_memory(row: &sqlx::sqlite::SqliteRow) -> Result<UserMemory, RepositoryError> {
    let get = |col: &str| -> Result<String, RepositoryError> {
        row.try_get(col)
            .map_err(|e| RepositoryError::Query(e.to_string()))
    };
    let id = Uuid::parse_str(&get("id")?)
        .map_err(|e| RepositoryError::Query(format!("invalid memory id: {e}")))?;

    Ok(UserMemory {
        id,
        user_id: get("user_id")?,
        content: get("content")?,
        created_at: parse_datetime(&get("created_at")?)?,
        updated_at: parse_datetime(&get("updated_at")?)?,
    })
}

impl MemoryRepository for SqliteMemoryRepository {
    async fn create(&self, memory: &UserMemory) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO memories (id, user_id, content, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(memory.id.to_string())
        .bind(&memory.user_id)
        .bind(&memory.content)
        .bind(format_datetime(&memory.created_at))
        .bind(format_datetime(&memory.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.message().contains("UNIQUE") => {
                RepositoryError::Conflict(format!("memory {} already exists", memory.id))
            }
            other => RepositoryError::Query(other.to_string()),
        })?;

        Ok(())
    }

    async fn update(
        &self,
        user_id: &str,
        id: &Uuid,
        content: &str,
    ) -> Result<UserMemory, RepositoryError> {
        let row = sqlx::query(
            "UPDATE memories SET content = ?, updated_at = ? WHERE id = ? AND user_id = ? RETURNING *",
        )
        .bind(content)
        .bind(format_datetime(&Utc::now()))
        .bind(id.to_string())
        .bind(user_id)
        .fetch_optional(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => row_to_memory(&row),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn delete(&self, user_id: &str, id: &Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM memories WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: i64,
    ) -> Result<Vec<UserMemory>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM memories
               WHERE user_id = ? AND instr(lower(content), lower(?)) > 0
               ORDER BY updated_at DESC, id DESC
               LIMIT ?"#,
        )
        .bind(user_id)
        .bind(query.trim())
        .bind(limit)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(row_to_memory).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::test_support::test_pool;

    #[tokio::test]
    async fn test_create_and_search() {
        let repo = SqliteMemoryRepository::new(test_pool().await);
        repo.create(&UserMemory::new("alice", "Prefers Kanban boards"))
            .await
            .unwrap();
        repo.create(&UserMemory::new("alice", "Works on the checkout team"))
            .await
            .unwrap();
        repo.create(&UserMemory::new("bob", "Likes kanban too"))
            .await
            .unwrap();

        let found = repo.search("alice", "KANBAN", 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content, "Prefers Kanban boards");

        let all = repo.search("alice", "", 10).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(repo.search("alice", "", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_scoped_by_user() {
        let repo = SqliteMemoryRepository::new(test_pool().await);
        let memory = UserMemory::new("alice", "Team of 5");
        repo.create(&memory).await.unwrap();

        let err = repo.update("bob", &memory.id, "hacked").await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));

        let updated = repo.update("alice", &memory.id, "Team of 7").await.unwrap();
        assert_eq!(updated.content, "Team of 7");
        assert_eq!(updated.id, memory.id);
        assert!(updated.updated_at >= memory.updated_at);
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = SqliteMemoryRepository::new(test_pool().await);
        let memory = UserMemory::new("alice", "temporary");
        repo.create(&memory).await.unwrap();

        assert!(matches!(
            repo.delete("bob", &memory.id).await,
            Err(RepositoryError::NotFound)
        ));
        repo.delete("alice", &memory.id).await.unwrap();
        assert!(matches!(
            repo.delete("alice", &memory.id).await,
            Err(RepositoryError::NotFound)
        ));
        assert!(repo.search("alice", "", 10).await.unwrap().is_empty());
    }
}
