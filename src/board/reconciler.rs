use std::sync::Arc;

use tracing::{info, instrument};

use super::{Board, DragSession, MutationIntent};
use crate::cache::{CacheError, TaskCacheStore};
use crate::gateway::TaskGateway;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DragOutcome {
    /// The gesture asked for nothing; no request was made.
    Ignored,
    Moved(MutationIntent),
}

/// Board view over a shared store. Finished drags become one status update.
pub struct BoardReconciler<G: TaskGateway> {
    store: Arc<TaskCacheStore<G>>,
}

impl<G: TaskGateway> BoardReconciler<G> {
    pub fn new(store: Arc<TaskCacheStore<G>>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<TaskCacheStore<G>> {
        &self.store
    }

    pub fn board(&self) -> Board {
        Board::partition(&self.store.read())
    }

    /// Resolves `session` against the current snapshot and, when it moves a
    /// task to another column, applies the status change optimistically and
    /// submits it.
    #[instrument(skip(self), fields(task_id = %session.active()))]
    pub async fn complete_drag(&self, session: DragSession) -> Result<DragOutcome, CacheError> {
        let Some(intent) = session.finish(&self.store.read()) else {
            return Ok(DragOutcome::Ignored);
        };
        let pending = self.store.mutate(intent.clone().into())?;
        pending.submit().await?;
        info!(status = %intent.status, "task moved");
        Ok(DragOutcome::Moved(intent))
    }
}
