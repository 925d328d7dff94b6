//! Storage seam. The core reads and writes whole task collections; how they
//! are persisted is up to the implementation.

use std::cell::RefCell;

use crate::error::StoreError;
use crate::task::Task;

pub trait TaskStore {
    fn load_all(&self) -> Result<Vec<Task>, StoreError>;

    fn save_all(&self, tasks: &[Task]) -> Result<(), StoreError>;

    /// Replace the task with the same id, or append it.
    fn upsert(&self, task: Task) -> Result<(), StoreError> {
        task.validate()?;
        let mut tasks = self.load_all()?;
        match tasks.iter_mut().find(|t| t.id == task.id) {
            Some(slot) => *slot = task,
            None => tasks.push(task),
        }
        self.save_all(&tasks)
    }

    /// Remove by exact id. Returns the removed task.
    fn delete(&self, id: &str) -> Result<Task, StoreError> {
        let mut tasks = self.load_all()?;
        let idx = tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let removed = tasks.remove(idx);
        self.save_all(&tasks)?;
        Ok(removed)
    }

    /// Look up by full id or a unique id prefix.
    fn find(&self, id_or_prefix: &str) -> Result<Task, StoreError> {
        resolve(&self.load_all()?, id_or_prefix).cloned()
    }
}

/// Exact id wins; otherwise the prefix must match exactly one task.
pub fn resolve<'a>(tasks: &'a [Task], id_or_prefix: &str) -> Result<&'a Task, StoreError> {
    if let Some(t) = tasks.iter().find(|t| t.id == id_or_prefix) {
        return Ok(t);
    }
    let matches: Vec<&Task> = tasks
        .iter()
        .filter(|t| !id_or_prefix.is_empty() && t.id.starts_with(id_or_prefix))
        .collect();
    match matches.as_slice() {
        [one] => Ok(*one),
        [] => Err(StoreError::NotFound(id_or_prefix.to_string())),
        many => Err(StoreError::Ambiguous {
            prefix: id_or_prefix.to_string(),
            matches: many.iter().map(|t| t.id.clone()).collect(),
        }),
    }
}

/// In-memory store, handy for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tasks: RefCell<Vec<Task>>,
}

impl MemoryStore {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks: RefCell::new(tasks),
        }
    }
}

impl TaskStore for MemoryStore {
    fn load_all(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.tasks.borrow().clone())
    }

    fn save_all(&self, tasks: &[Task]) -> Result<(), StoreError> {
        *self.tasks.borrow_mut() = tasks.to_vec();
        Ok(())
    }
}
