//! Filter/sort projection of a task snapshot.
//!
//! Pure and deterministic: the same snapshot and criteria always give the
//! same ordered output, so it is safe to call before every render.

use std::cmp::Ordering;

use crate::model::{FilterCriteria, SortKey, SortOrder, Task};

pub fn project(tasks: &[Task], criteria: &FilterCriteria) -> Vec<Task> {
    let needle = criteria.search_needle();
    let mut selected: Vec<Task> = tasks
        .iter()
        .filter(|task| criteria.status.map_or(true, |status| task.status == status))
        .filter(|task| {
            criteria
                .priority
                .map_or(true, |priority| task.priority == Some(priority))
        })
        .filter(|task| needle.as_deref().map_or(true, |n| task.matches_text(n)))
        .cloned()
        .collect();

    if let Some(key) = criteria.sort_by {
        // sort_by is stable, ties keep snapshot order
        selected.sort_by(|a, b| compare(a, b, key, criteria.sort_order));
    }
    selected
}

fn compare(a: &Task, b: &Task, key: SortKey, order: SortOrder) -> Ordering {
    match key {
        SortKey::DueDate => missing_last(a.due_date.as_ref(), b.due_date.as_ref(), order),
        SortKey::Priority => missing_last(a.priority.as_ref(), b.priority.as_ref(), order),
        SortKey::Title => directed(
            a.title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then_with(|| a.title.cmp(&b.title)),
            order,
        ),
    }
}

// Missing values go after present ones whatever the direction.
fn missing_last<T: Ord>(a: Option<&T>, b: Option<&T>, order: SortOrder) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => directed(a.cmp(b), order),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}
