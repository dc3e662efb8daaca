pub mod local;

use crate::types::{ArchivedDay, BoardSnapshot, Role, Scope, Task, TaskUpdate};

/// Abstract storage trait for task backends.
/// Implementations: LocalStorage (Markdown files on disk).
pub trait TaskStorage: Send + Sync {
    /// Resolve the scope to a document and return its board.
    fn get_board(&self, scope: &Scope) -> Result<BoardSnapshot, StorageError>;

    /// Append a new task to `role` and return it with its assigned id.
    /// New tasks are unchecked, except in `Role::Done` where the task is
    /// written checked (`done == true`) so the checkbox matches its section.
    /// A leading flag glyph in `text` sets `flagged` instead.
    fn add_task(&self, text: &str, role: Role, scope: &Scope) -> Result<Task, StorageError>;

    /// Move, reorder, retitle and/or flag a task.
    fn update_task(
        &self,
        task_id: &str,
        update: &TaskUpdate,
        scope: &Scope,
    ) -> Result<(), StorageError>;

    fn delete_task(&self, task_id: &str, scope: &Scope) -> Result<(), StorageError>;

    /// Archived day folders, most recent first.
    fn list_archived_dates(&self) -> Result<Vec<String>, StorageError>;

    fn get_archived_day(&self, date: &str) -> Result<ArchivedDay, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid date: {0} (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error classes for transport adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidOperation,
    IoFailure,
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::TaskNotFound(_) | StorageError::DocumentNotFound(_) => {
                ErrorKind::NotFound
            }
            StorageError::InvalidOperation(_) | StorageError::InvalidDate(_) => {
                ErrorKind::InvalidOperation
            }
            StorageError::Io(_) => ErrorKind::IoFailure,
        }
    }
}
