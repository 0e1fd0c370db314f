use tracing::debug;

use super::COLUMNS;
use crate::cache::Mutation;
use crate::model::{Task, TaskId, TaskPatch, TaskStatus};

/// What a dragged task was released over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropTarget {
    /// Empty space of a column.
    Column(TaskStatus),
    /// Another task card; the drop lands in that task's column.
    Task(TaskId),
}

impl DropTarget {
    /// Maps a column drop-zone id to a target.
    pub fn parse_column(id: &str) -> Option<Self> {
        COLUMNS
            .iter()
            .find(|c| c.id() == id)
            .map(|c| DropTarget::Column(c.status))
    }
}

/// The single status change a finished drag asks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationIntent {
    pub id: TaskId,
    pub status: TaskStatus,
}

impl MutationIntent {
    pub fn patch(&self) -> TaskPatch {
        TaskPatch::status(self.status)
    }
}

impl From<MutationIntent> for Mutation {
    fn from(intent: MutationIntent) -> Self {
        let patch = intent.patch();
        Mutation::Update(intent.id, patch)
    }
}

/// Turns a finished gesture into at most one status change. Unresolvable
/// gestures are no-ops.
pub fn resolve_drag_end(
    tasks: &[Task],
    active: TaskId,
    target: Option<DropTarget>,
) -> Option<MutationIntent> {
    let Some(target) = target else {
        debug!(task_id = %active, "drag ended outside any drop target");
        return None;
    };
    let Some(active) = tasks.iter().find(|t| t.id == active) else {
        debug!(task_id = %active, "dragged task is no longer cached");
        return None;
    };
    if active.is_provisional() {
        debug!(task_id = %active.id, "dragged task is not confirmed yet");
        return None;
    }
    let status = match target {
        DropTarget::Column(status) => status,
        DropTarget::Task(id) => match tasks.iter().find(|t| t.id == id) {
            Some(task) => task.status,
            None => {
                debug!(task_id = %active.id, target = %id, "drop target task is gone");
                return None;
            }
        },
    };
    if active.status == status {
        return None;
    }
    Some(MutationIntent {
        id: active.id,
        status,
    })
}

/// One drag gesture, from pick-up to release.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DragSession {
    active: TaskId,
    over: Option<DropTarget>,
}

impl DragSession {
    pub fn start(active: TaskId) -> Self {
        Self { active, over: None }
    }

    pub fn active(&self) -> TaskId {
        self.active
    }

    pub fn over(&self) -> Option<DropTarget> {
        self.over
    }

    pub fn hover(&mut self, target: DropTarget) {
        self.over = Some(target);
    }

    pub fn leave(&mut self) {
        self.over = None;
    }

    pub fn finish(self, tasks: &[Task]) -> Option<MutationIntent> {
        resolve_drag_end(tasks, self.active, self.over)
    }
}
