//! SQLite requirements-document repository implementation.
//!
//! Each row holds the latest version of one thread's PRD. The version bump
//! (read current version, write `version + 1`) runs inside a single write
//! transaction on the single-connection writer pool.

use chrono::{DateTime, Utc};
use sqlx::Row;

use pmassist_core::repository::prd::PrdRepository;
use pmassist_types::error::RepositoryError;
use pmassist_types::prd::{PrdDocument, PrdRecord};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `PrdRepository`.
pub struct SqlitePrdRepository {
    pool: DatabasePool,
}

impl SqlitePrdRepository {
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

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<PrdRecord, RepositoryError> {
    let get = |col: &str| -> Result<String, RepositoryError> {
        row.try_get(col)
            .map_err(|e| RepositoryError::Query(e.to_string()))
    };
    let version: i64 = row
        .try_get("version")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let document: PrdDocument = serde_json::from_str(&get("document")?)
        .map_err(|e| RepositoryError::Query(format!("invalid PRD document: {e}")))?;

    Ok(PrdRecord {
        id: get("id")?,
        user_id: get("user_id")?,
        document,
        version,
        created_at: parse_datetime(&get("created_at")?)?,
        updated_at: parse_datetime(&get("updated_at")?)?,
    })
}

impl PrdRepository for SqlitePrdRepository {
    async fn save(
        &self,
        id: &str,
        user_id: &str,
        document: &PrdDocument,
    ) -> Result<PrdRecord, RepositoryError> {
        document.validate().map_err(RepositoryError::Invalid)?;
        let encoded = serde_json::to_string(document)
            .map_err(|e| RepositoryError::Query(format!("failed to encode PRD: {e}")))?;
        let now = Utc::now();

        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let existing = sqlx::query("SELECT user_id, version, created_at FROM prds WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let (version, created_at) = match existing {
            Some(row) => {
                let owner: String = row
                    .try_get("user_id")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                if owner != user_id {
                    return Err(RepositoryError::Forbidden(format!(
                        "PRD {id} belongs to another user"
                    )));
                }
                let version: i64 = row
                    .try_get("version")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                let created_at: String = row
                    .try_get("created_at")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;

                sqlx::query(
                    "UPDATE prds SET feature = ?, document = ?, version = ?, updated_at = ? WHERE id = ?",
                )
                .bind(&document.feature)
                .bind(&encoded)
                .bind(version + 1)
                .bind(format_datetime(&now))
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

                (version + 1, parse_datetime(&created_at)?)
            }
            None => {
                sqlx::query(
                    r#"INSERT INTO prds (id, user_id, feature, document, version, created_at, updated_at)
                       VALUES (?, ?, ?, ?, 1, ?, ?)"#,
                )
                .bind(id)
                .bind(user_id)
                .bind(&document.feature)
                .bind(&encoded)
                .bind(format_datetime(&now))
                .bind(format_datetime(&now))
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

                (1, now)
            }
        };

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tracing::info!(prd_id = %id, version, "PRD saved");
        Ok(PrdRecord {
            id: id.to_string(),
            user_id: user_id.to_string(),
            document: document.clone(),
            version,
            created_at,
            updated_at: now,
        })
    }

    async fn get(&self, id: &str) -> Result<Option<PrdRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM prds WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(row_to_record).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::test_support::test_pool;
    use pmassist_types::prd::{PrdSection, Story};

    fn document(feature: &str) -> PrdDocument {
        PrdDocument {
            feature: feature.to_string(),
            introduction: "Let shoppers pay in one click.".to_string(),
            user_stories: vec![Story {
                order: 1,
                title: "One-click pay".to_string(),
                subject_role: "returning shopper".to_string(),
                action_goal: "pay with a saved card".to_string(),
                business_value: "higher conversion".to_string(),
                personas: vec![],
                pre_conditions: vec![],
                done_when: vec![],
                uses_flow_diagram: false,
                exception_handling: vec![],
                acceptance_criteria: vec!["Order placed in one click".to_string()],
                definition_of_done: vec![],
            }],
            functional_requirements: vec!["P0: saved card checkout".to_string()],
            non_functional_requirements: vec![],
            assumptions: vec![],
            dependencies: vec!["Payments API".to_string()],
            risks_and_mitigations: vec![],
            timeline: "Q3".to_string(),
            stakeholders: vec![],
            metrics: vec![],
        }
    }

    #[tokio::test]
    async fn test_first_save_is_version_one() {
        let repo = SqlitePrdRepository::new(test_pool().await);
        let record = repo.save("t1", "alice", &document("Checkout")).await.unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.created_at, record.updated_at);

        let loaded = repo.get("t1").await.unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.document, document("Checkout"));
    }

    #[tokio::test]
    async fn test_versions_strictly_increase() {
        let repo = SqlitePrdRepository::new(test_pool().await);
        let mut last = 0;
        for i in 0..4 {
            let record = repo
                .save("t1", "alice", &document(&format!("Checkout v{i}")))
                .await
                .unwrap();
            assert!(record.version > last);
            last = record.version;
        }
        assert_eq!(last, 4);

        let loaded = repo.get("t1").await.unwrap().unwrap();
        assert_eq!(loaded.version, 4);
        assert_eq!(loaded.document.feature, "Checkout v3");
    }

    #[tokio::test]
    async fn test_save_keeps_other_sections_on_single_section_update() {
        let repo = SqlitePrdRepository::new(test_pool().await);
        let original = document("Checkout");
        repo.save("t1", "alice", &original).await.unwrap();

        let mut updated = original.clone();
        updated
            .replace_section(PrdSection::Timeline, serde_json::json!("Q4"))
            .unwrap();
        repo.save("t1", "alice", &updated).await.unwrap();

        let loaded = repo.get("t1").await.unwrap().unwrap();
        assert_eq!(loaded.document.timeline, "Q4");
        assert_eq!(loaded.document.dependencies, original.dependencies);
        assert_eq!(loaded.document.user_stories, original.user_stories);
    }

    #[tokio::test]
    async fn test_save_rejects_other_owner() {
        let repo = SqlitePrdRepository::new(test_pool().await);
        repo.save("t1", "alice", &document("Checkout")).await.unwrap();

        let err = repo
            .save("t1", "bob", &document("Stolen"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Forbidden(_)));
        assert_eq!(repo.get("t1").await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_save_rejects_empty_feature() {
        let repo = SqlitePrdRepository::new(test_pool().await);
        let err = repo.save("t1", "alice", &document("  ")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Invalid(_)));
        assert!(repo.get("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let repo = SqlitePrdRepository::new(test_pool().await);
        assert!(repo.get("none").await.unwrap().is_none());
    }
}
