//! CheckpointRepository trait definition.

use pmassist_types::error::RepositoryError;
use pmassist_types::thread::{Checkpoint, ThreadSummary};

/// Persistence for conversation checkpoints.
///
/// Checkpoints of a thread are ordered by `checkpoint_id` (UUID v7) only.
/// Implementations live in pmassist-infra (`SqliteCheckpointRepository`).
pub trait CheckpointRepository: Send + Sync {
    /// Append a checkpoint. Fails with `Forbidden` if the thread is owned by
    /// a different user.
    fn put(
        &self,
        checkpoint: &Checkpoint,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Latest checkpoint of a thread in `namespace`, if any.
    fn latest(
        &self,
        thread_id: &str,
        namespace: &str,
    ) -> impl std::future::Future<Output = Result<Option<Checkpoint>, RepositoryError>> + Send;

    /// All checkpoints of a thread in `namespace`, ordered by id ascending.
    fn list(
        &self,
        thread_id: &str,
        namespace: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Checkpoint>, RepositoryError>> + Send;

    /// User id of the thread's first checkpoint.
    fn owner(
        &self,
        thread_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, RepositoryError>> + Send;

    /// Threads owned by `user_id`, most recently updated first.
    fn list_threads(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> impl std::future::Future<Output = Result<Vec<ThreadSummary>, RepositoryError>> + Send;
}
