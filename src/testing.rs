//! Fixtures shared by unit tests.

use crate::model::{Task, TaskDraft, TaskId, TaskStatus};

/// A stored task owned by user 1.
pub fn task(id: i64, title: &str, status: TaskStatus) -> Task {
    let mut task = Task::provisional(TaskId::new(id), &TaskDraft::new(title), 1);
    task.status = status;
    task
}

pub fn ids(tasks: &[Task]) -> Vec<i64> {
    tasks.iter().map(|t| t.id.get()).collect()
}

pub fn statuses(tasks: &[Task]) -> Vec<(i64, TaskStatus)> {
    tasks.iter().map(|t| (t.id.get(), t.status)).collect()
}
