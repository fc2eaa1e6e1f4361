pub mod dates;
pub mod errors;
pub mod models;
pub mod operations;
pub mod protocol;
pub mod sorting;

pub use errors::SyncError;
pub use models::{Regularity, Schedule, Section, Task, TaskDraft, TaskId, TaskPatch, Urgency, Weekday};
pub use operations::{OperationType, PendingOperation};

pub type SyncResult<T> = Result<T, SyncError>;
