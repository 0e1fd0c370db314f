use std::collections::HashMap;

use parking_lot::Mutex;

use crate::model::TaskId;

/// Logical class an outstanding request is counted under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationClass {
    List,
    Mutate(TaskId),
}

#[derive(Debug, Default)]
pub struct InFlight {
    counts: HashMap<OperationClass, usize>,
}

impl InFlight {
    pub fn count(&self, class: OperationClass) -> usize {
        self.counts.get(&class).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    fn enter(&mut self, class: OperationClass) {
        *self.counts.entry(class).or_insert(0) += 1;
    }

    fn leave(&mut self, class: OperationClass) {
        if let Some(count) = self.counts.get_mut(&class) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&class);
            }
        }
    }
}

/// Keeps one request counted until dropped.
pub struct InFlightGuard<'a> {
    table: &'a Mutex<InFlight>,
    class: OperationClass,
}

impl<'a> InFlightGuard<'a> {
    pub fn enter(table: &'a Mutex<InFlight>, class: OperationClass) -> Self {
        table.lock().enter(class);
        Self { table, class }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.table.lock().leave(self.class);
    }
}
