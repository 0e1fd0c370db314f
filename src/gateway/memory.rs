use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::{bearer, GatewayError, TaskGateway};
use crate::model::{FilterCriteria, OwnerId, Session, Task, TaskDraft, TaskId, TaskPatch};
use crate::projection::project;

struct MemoryState {
    tasks: Vec<Task>,
    next_id: i64,
    fail_next: Option<GatewayError>,
}

/// In-process backend with the REST semantics: ids are assigned here, every
/// task belongs to the caller's owner id, and foreign or missing ids answer
/// 404 like the real service.
pub struct MemoryTaskGateway {
    state: Mutex<MemoryState>,
    calls: AtomicUsize,
}

impl MemoryTaskGateway {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                tasks: vec![],
                next_id: 1,
                fail_next: None,
            }),
            calls: AtomicUsize::new(0),
        }
    }

    /// Seeds stored rows as is; later ids continue after the highest one.
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let gateway = Self::new();
        {
            let mut state = gateway.state.lock();
            state.next_id = tasks.iter().map(|t| t.id.get()).max().unwrap_or(0) + 1;
            state.tasks = tasks;
        }
        gateway
    }

    /// The next authenticated call fails with `error` instead of running.
    pub fn fail_next(&self, error: GatewayError) {
        self.state.lock().fail_next = Some(error);
    }

    /// Number of calls that passed the credential check.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Vec<Task> {
        self.state.lock().tasks.clone()
    }

    fn enter(&self, session: &Session) -> Result<OwnerId, GatewayError> {
        bearer(session)?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.state.lock().fail_next.take() {
            Some(err) => Err(err),
            None => Ok(session.owner_id().unwrap_or_default()),
        }
    }
}

fn not_found() -> GatewayError {
    GatewayError::RemoteRejected {
        status: 404,
        message: "Task not found".to_string(),
    }
}

#[async_trait]
impl TaskGateway for MemoryTaskGateway {
    async fn list(
        &self,
        session: &Session,
        criteria: &FilterCriteria,
    ) -> Result<Vec<Task>, GatewayError> {
        let owner = self.enter(session)?;
        let state = self.state.lock();
        let owned: Vec<Task> = state
            .tasks
            .iter()
            .filter(|t| t.owner_id == owner)
            .cloned()
            .collect();
        Ok(project(&owned, criteria))
    }

    async fn create(&self, session: &Session, draft: &TaskDraft) -> Result<Task, GatewayError> {
        let owner = self.enter(session)?;
        if draft.title.trim().is_empty() {
            return Err(GatewayError::RemoteRejected {
                status: 422,
                message: "Title is required".to_string(),
            });
        }
        let mut state = self.state.lock();
        let id = TaskId::new(state.next_id);
        state.next_id += 1;
        let task = Task::provisional(id, draft, owner);
        state.tasks.push(task.clone());
        Ok(task)
    }

    async fn update(
        &self,
        session: &Session,
        id: TaskId,
        patch: &TaskPatch,
    ) -> Result<Task, GatewayError> {
        let owner = self.enter(session)?;
        let mut state = self.state.lock();
        let task = state
            .tasks
            .iter_mut()
            .find(|t| t.id == id && t.owner_id == owner)
            .ok_or_else(not_found)?;
        task.apply(patch);
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn delete(&self, session: &Session, id: TaskId) -> Result<(), GatewayError> {
        let owner = self.enter(session)?;
        let mut state = self.state.lock();
        let before = state.tasks.len();
        state.tasks.retain(|t| !(t.id == id && t.owner_id == owner));
        if state.tasks.len() == before {
            return Err(not_found());
        }
        Ok(())
    }
}
