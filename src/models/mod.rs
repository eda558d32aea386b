pub mod task;
pub mod user;

pub use task::{
    BulkDeleteRequest, BulkUpdateEntry, BulkUpdateRequest, SearchQuery, StatusUpdate, Task,
    TaskEnvelope, TaskInput, TaskPatch, TaskStatus, TasksEnvelope,
};
pub use user::{LoginRequest, RegisterRequest, User};
