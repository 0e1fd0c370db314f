//! Status columns and drag gesture handling on top of the task cache.

pub mod drag;
pub mod reconciler;

pub use drag::{resolve_drag_end, DragSession, DropTarget, MutationIntent};
pub use reconciler::{BoardReconciler, DragOutcome};

use crate::model::{Task, TaskId, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub status: TaskStatus,
    pub title: &'static str,
}

impl Column {
    /// Identifier a drop zone for this column carries.
    pub fn id(&self) -> &'static str {
        self.status.as_str()
    }
}

pub const COLUMNS: [Column; 3] = [
    Column {
        status: TaskStatus::Todo,
        title: "To Do",
    },
    Column {
        status: TaskStatus::InProgress,
        title: "In Progress",
    },
    Column {
        status: TaskStatus::Done,
        title: "Done",
    },
];

/// Tasks split into the fixed columns. Order inside a column is the order of
/// the source slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    columns: Vec<(Column, Vec<Task>)>,
}

impl Board {
    pub fn partition(tasks: &[Task]) -> Self {
        let columns = COLUMNS
            .iter()
            .map(|column| {
                let members = tasks
                    .iter()
                    .filter(|t| t.status == column.status)
                    .cloned()
                    .collect();
                (*column, members)
            })
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> impl Iterator<Item = (&Column, &[Task])> {
        self.columns.iter().map(|(c, tasks)| (c, tasks.as_slice()))
    }

    pub fn column(&self, status: TaskStatus) -> &[Task] {
        self.columns
            .iter()
            .find(|(c, _)| c.status == status)
            .map(|(_, tasks)| tasks.as_slice())
            .unwrap_or_default()
    }

    /// Column and position of `id`.
    pub fn locate(&self, id: TaskId) -> Option<(TaskStatus, usize)> {
        self.columns.iter().find_map(|(c, tasks)| {
            tasks
                .iter()
                .position(|t| t.id == id)
                .map(|position| (c.status, position))
        })
    }
}
