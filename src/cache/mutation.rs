use crate::model::{ModelError, OwnerId, Task, TaskDraft, TaskId, TaskPatch};

/// A write against the task collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create(TaskDraft),
    Update(TaskId, TaskPatch),
    Delete(TaskId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        })
    }
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::Create(_) => MutationKind::Create,
            Mutation::Update(..) => MutationKind::Update,
            Mutation::Delete(_) => MutationKind::Delete,
        }
    }

    /// The existing task this mutation addresses; `None` for creates.
    pub fn target(&self) -> Option<TaskId> {
        match self {
            Mutation::Create(_) => None,
            Mutation::Update(id, _) | Mutation::Delete(id) => Some(*id),
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        match self {
            Mutation::Create(draft) => draft.validate(),
            Mutation::Update(_, patch) => patch.validate(),
            Mutation::Delete(_) => Ok(()),
        }
    }

    /// Applies the expected effect to `tasks`. `subject` is the placeholder
    /// id for creates and the target id otherwise.
    pub(crate) fn apply_optimistic(&self, tasks: &mut Vec<Task>, subject: TaskId, owner: OwnerId) {
        match self {
            Mutation::Create(draft) => tasks.push(Task::provisional(subject, draft, owner)),
            Mutation::Update(id, patch) => {
                if let Some(task) = tasks.iter_mut().find(|t| t.id == *id) {
                    task.apply(patch);
                }
            }
            Mutation::Delete(id) => tasks.retain(|t| t.id != *id),
        }
    }
}
