//! PrdRepository trait definition.

use pmassist_types::error::RepositoryError;
use pmassist_types::prd::{PrdDocument, PrdRecord};

/// Persistence for versioned requirements documents.
pub trait PrdRepository: Send + Sync {
    /// Save `document` under `id` for `user_id`.
    ///
    /// The first save stores version 1; every later save stores the previous
    /// version plus one, computed inside a single write transaction.
    /// Errors: `Forbidden` when `id` belongs to another user, `Invalid` when
    /// the document fails validation.
    fn save(
        &self,
        id: &str,
        user_id: &str,
        document: &PrdDocument,
    ) -> impl std::future::Future<Output = Result<PrdRecord, RepositoryError>> + Send;

    fn get(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<PrdRecord>, RepositoryError>> + Send;
}
