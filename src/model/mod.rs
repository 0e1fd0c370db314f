pub mod error;
pub mod filter;
pub mod session;
pub mod task;
pub mod timestamp;

pub use error::{FieldError, ModelError};
pub use filter::{FilterCriteria, SortKey, SortOrder};
pub use session::Session;
pub use task::{OwnerId, Task, TaskDraft, TaskId, TaskPatch, TaskStatus};
