//! MemoryRepository trait definition.

use pmassist_types::error::RepositoryError;
use pmassist_types::memory::UserMemory;
use uuid::Uuid;

/// User-namespaced memory storage. Every operation is scoped by `user_id`;
/// ids belonging to another user behave as missing.
pub trait MemoryRepository: Send + Sync {
    fn create(
        &self,
        memory: &UserMemory,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Replace the content of an existing memory. `NotFound` if absent.
    fn update(
        &self,
        user_id: &str,
        id: &Uuid,
        content: &str,
    ) -> impl std::future::Future<Output = Result<UserMemory, RepositoryError>> + Send;

    /// `NotFound` if absent.
    fn delete(
        &self,
        user_id: &str,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Case-insensitive substring search over content, most recent first.
    /// An empty query returns the latest memories.
    fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<UserMemory>, RepositoryError>> + Send;
}
