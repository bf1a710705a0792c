//! Chat service orchestrating thread ownership, turns and history.
//!
//! ChatService coordinates the checkpoint and PRD repositories with the
//! agent runner. A turn loads the thread's latest checkpoint, runs the agent
//! and appends a new checkpoint only if the agent finished cleanly.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pmassist_types::error::{RepositoryError, ValidationError};
use pmassist_types::event::ChatEvent;
use pmassist_types::llm::MessageRole;
use pmassist_types::thread::{
    Checkpoint, HistoryMessage, ThreadHistory, ThreadSummary, validate_id,
};

use crate::agent::runner::{AgentError, AgentRunner};
use crate::repository::checkpoint::CheckpointRepository;
use crate::repository::prd::PrdRepository;
use crate::tool::ToolContext;

use super::locks::ThreadLocks;

/// Default checkpoint namespace.
const NAMESPACE: &str = "";

const MAX_THREAD_PAGE: i64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Generic over the repositories so pmassist-core never depends on
/// pmassist-infra.
pub struct ChatService<C: CheckpointRepository, P: PrdRepository> {
    checkpoints: Arc<C>,
    prds: Arc<P>,
    runner: Arc<AgentRunner>,
    locks: ThreadLocks,
}

impl<C: CheckpointRepository, P: PrdRepository> ChatService<C, P> {
    pub fn new(checkpoints: Arc<C>, prds: Arc<P>, runner: Arc<AgentRunner>) -> Self {
        Self {
            checkpoints,
            prds,
            runner,
            locks: ThreadLocks::new(),
        }
    }

    pub fn checkpoints(&self) -> &C {
        &self.checkpoints
    }

    pub fn prds(&self) -> &P {
        &self.prds
    }

    /// Rejects `user_id` when the thread exists and belongs to someone else.
    ///
    /// A thread without checkpoints is still claimed by the author of its PRD,
    /// since a failed first turn can leave a saved PRD behind.
    pub async fn authorize(&self, thread_id: &str, user_id: &str) -> Result<(), ChatError> {
        validate_id("thread_id", thread_id)?;
        validate_id("user_id", user_id)?;

        let owner = match self.checkpoints.owner(thread_id).await? {
            Some(owner) => Some(owner),
            None => self.prds.get(thread_id).await?.map(|prd| prd.user_id),
        };
        match owner {
            Some(owner) if owner != user_id => {
                warn!(thread_id, user_id, "Thread owned by another user");
                Err(ChatError::Forbidden(format!(
                    "Thread {thread_id} belongs to another user"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Run one turn and stream its events.
    ///
    /// Always ends the stream with exactly one `Done` or `Error` event
    /// unless the receiver is gone. Nothing is persisted for a failed turn.
    pub async fn run_turn(
        &self,
        thread_id: &str,
        user_id: &str,
        query: &str,
        events: mpsc::Sender<ChatEvent>,
        cancel: CancellationToken,
    ) -> Result<(), ChatError> {
        let result = self
            .run_turn_inner(thread_id, user_id, query, &events, &cancel)
            .await;

        let terminal = match &result {
            Ok(()) => ChatEvent::Done,
            Err(ChatError::Agent(AgentError::Cancelled)) => {
                info!(thread_id, "Turn cancelled, nothing persisted");
                return result;
            }
            Err(e) => {
                warn!(thread_id, error = %e, "Turn failed, nothing persisted");
                ChatEvent::Error {
                    message: e.to_string(),
                }
            }
        };
        // The client may already be gone; the outcome is logged either way.
        let _ = events.send(terminal).await;
        result
    }

    async fn run_turn_inner(
        &self,
        thread_id: &str,
        user_id: &str,
        query: &str,
        events: &mpsc::Sender<ChatEvent>,
        cancel: &CancellationToken,
    ) -> Result<(), ChatError> {
        if query.trim().is_empty() {
            return Err(ValidationError::Empty { field: "query" }.into());
        }

        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled.into()),
            guard = self.locks.acquire(thread_id) => guard,
        };
        // Ownership is re-checked under the lock; the first turn of a new
        // thread claims it.
        self.authorize(thread_id, user_id).await?;

        let latest = self.checkpoints.latest(thread_id, NAMESPACE).await?;
        let parent_id = latest.as_ref().map(|c| c.checkpoint_id);
        let mut state = latest.map(|c| c.state).unwrap_or_default();

        let ctx = ToolContext::new(thread_id, user_id, state.todos.clone());
        self.runner
            .run(&mut state, query, &ctx, events, cancel)
            .await?;

        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled.into());
        }

        let checkpoint = Checkpoint::next(thread_id, user_id, parent_id, state);
        self.checkpoints.put(&checkpoint).await?;
        info!(
            thread_id,
            checkpoint_id = %checkpoint.checkpoint_id,
            messages = checkpoint.state.messages.len(),
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Persisted messages of a thread plus its PRD, if any.
    pub async fn history(
        &self,
        thread_id: &str,
        requester: Option<&str>,
    ) -> Result<ThreadHistory, ChatError> {
        validate_id("thread_id", thread_id)?;

        let Some(owner) = self.checkpoints.owner(thread_id).await? else {
            return Err(ChatError::NotFound(format!(
                "No conversation found for thread {thread_id}"
            )));
        };
        if let Some(requester) = requester {
            validate_id("user_id", requester)?;
            if requester != owner {
                return Err(ChatError::Forbidden(format!(
                    "Thread {thread_id} belongs to another user"
                )));
            }
        }

        let messages = self
            .checkpoints
            .latest(thread_id, NAMESPACE)
            .await?
            .map(|c| {
                c.state
                    .messages
                    .iter()
                    .filter(|m| m.role != MessageRole::System)
                    .map(HistoryMessage::from)
                    .collect()
            })
            .unwrap_or_default();

        let prd = self
            .prds
            .get(thread_id)
            .await?
            .filter(|prd| prd.user_id == owner);
        Ok(ThreadHistory {
            thread_id: thread_id.to_string(),
            messages,
            has_prd: prd.is_some(),
            prd,
        })
    }

    /// Threads owned by `user_id`, most recently updated first.
    pub async fn list_threads(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ThreadSummary>, ChatError> {
        validate_id("user_id", user_id)?;
        let threads = self
            .checkpoints
            .list_threads(user_id, limit.clamp(1, MAX_THREAD_PAGE), offset.max(0))
            .await?;
        Ok(threads)
    }
}
