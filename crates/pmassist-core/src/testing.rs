//! In-memory repositories for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use uuid::Uuid;

use pmassist_types::error::RepositoryError;
use pmassist_types::memory::UserMemory;
use pmassist_types::prd::{PrdDocument, PrdRecord};
use pmassist_types::thread::{Checkpoint, ThreadSummary};

use crate::repository::checkpoint::CheckpointRepository;
use crate::repository::memory::MemoryRepository;
use crate::repository::prd::PrdRepository;

pub fn sample_prd(feature: &str) -> PrdDocument {
    PrdDocument {
        feature: feature.to_string(),
        introduction: "Purpose and scope".to_string(),
        user_stories: Vec::new(),
        functional_requirements: vec!["P0: core flow".to_string()],
        non_functional_requirements: vec!["p95 < 300ms".to_string()],
        assumptions: vec![],
        dependencies: vec![],
        risks_and_mitigations: vec![],
        timeline: "6 weeks".to_string(),
        stakeholders: vec![],
        metrics: vec!["Adoption 30%".to_string()],
    }
}

#[derive(Default)]
pub struct InMemoryCheckpoints {
    rows: Mutex<Vec<Checkpoint>>,
}

impl CheckpointRepository for InMemoryCheckpoints {
    async fn put(&self, checkpoint: &Checkpoint) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let foreign_owner = rows
            .iter()
            .filter(|c| c.thread_id == checkpoint.thread_id)
            .min_by_key(|c| c.checkpoint_id)
            .is_some_and(|first| first.user_id != checkpoint.user_id);
        if foreign_owner {
            return Err(RepositoryError::Forbidden(format!(
                "thread {} belongs to another user",
                checkpoint.thread_id
            )));
        }
        rows.push(checkpoint.clone());
        Ok(())
    }

    async fn latest(
        &self,
        thread_id: &str,
        namespace: &str,
    ) -> Result<Option<Checkpoint>, RepositoryError> {
        Ok(self.list(thread_id, namespace).await?.pop())
    }

    async fn list(
        &self,
        thread_id: &str,
        namespace: &str,
    ) -> Result<Vec<Checkpoint>, RepositoryError> {
        let mut found: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.thread_id == thread_id && c.namespace == namespace)
            .cloned()
            .collect();
        found.sort_by_key(|c| c.checkpoint_id);
        Ok(found)
    }

    async fn owner(&self, thread_id: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.thread_id == thread_id)
            .min_by_key(|c| c.checkpoint_id)
            .map(|c| c.user_id.clone()))
    }

    async fn list_threads(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ThreadSummary>, RepositoryError> {
        let rows = self.rows.lock().unwrap();
        let mut threads: HashMap<&str, ThreadSummary> = HashMap::new();
        for c in rows.iter().filter(|c| c.user_id == user_id) {
            let entry = threads
                .entry(c.thread_id.as_str())
                .or_insert_with(|| ThreadSummary {
                    thread_id: c.thread_id.clone(),
                    last_checkpoint_id: c.checkpoint_id,
                    checkpoint_count: 0,
                    updated_at: c.created_at,
                });
            entry.checkpoint_count += 1;
            if c.checkpoint_id >= entry.last_checkpoint_id {
                entry.last_checkpoint_id = c.checkpoint_id;
                entry.updated_at = c.created_at;
            }
        }
        let mut list: Vec<_> = threads.into_values().collect();
        list.sort_by(|a, b| b.last_checkpoint_id.cmp(&a.last_checkpoint_id));
        Ok(list
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryPrds {
    rows: Mutex<HashMap<String, PrdRecord>>,
}

impl InMemoryPrds {
    /// Store `record` as is, bypassing the owner check of `save`.
    pub fn insert(&self, record: PrdRecord) {
        self.rows.lock().unwrap().insert(record.id.clone(), record);
    }
}

impl PrdRepository for InMemoryPrds {
    async fn save(
        &self,
        id: &str,
        user_id: &str,
        document: &PrdDocument,
    ) -> Result<PrdRecord, RepositoryError> {
        document.validate().map_err(RepositoryError::Invalid)?;
        let mut rows = self.rows.lock().unwrap();
        let now = Utc::now();
        let record = match rows.get(id) {
            Some(existing) if existing.user_id != user_id => {
                return Err(RepositoryError::Forbidden(format!(
                    "PRD {id} belongs to another user"
                )));
            }
            Some(existing) => PrdRecord {
                id: id.to_string(),
                user_id: user_id.to_string(),
                document: document.clone(),
                version: existing.version + 1,
                created_at: existing.created_at,
                updated_at: now,
            },
            None => PrdRecord {
                id: id.to_string(),
                user_id: user_id.to_string(),
                document: document.clone(),
                version: 1,
                created_at: now,
                updated_at: now,
            },
        };
        rows.insert(id.to_string(), record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<PrdRecord>, RepositoryError> {
        Ok(self.rows.lock().unwrap().get(id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryMemories {
    rows: Mutex<Vec<UserMemory>>,
}

impl MemoryRepository for InMemoryMemories {
    async fn create(&self, memory: &UserMemory) -> Result<(), RepositoryError> {
        self.rows.lock().unwrap().push(memory.clone());
        Ok(())
    }

    async fn update(
        &self,
        user_id: &str,
        id: &Uuid,
        content: &str,
    ) -> Result<UserMemory, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let memory = rows
            .iter_mut()
            .find(|m| m.user_id == user_id && m.id == *id)
            .ok_or(RepositoryError::NotFound)?;
        memory.content = content.to_string();
        memory.updated_at = Utc::now();
        Ok(memory.clone())
    }

    async fn delete(&self, user_id: &str, id: &Uuid) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|m| !(m.user_id == user_id && m.id == *id));
        if rows.len() == before {
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
        let needle = query.to_lowercase();
        let mut found: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.user_id == user_id && m.content.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }
}
