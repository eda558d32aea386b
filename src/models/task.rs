use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Lifecycle state of a task.
/// Corresponds to the `task_status` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn is_completed(self) -> bool {
        self == TaskStatus::Completed
    }

    /// Pending and in-progress tasks share the "pending" filter bucket.
    pub fn is_open(self) -> bool {
        !self.is_completed()
    }

    /// Completed tasks reopen as pending; anything else completes.
    pub fn toggled(self) -> TaskStatus {
        if self.is_completed() {
            TaskStatus::Pending
        } else {
            TaskStatus::Completed
        }
    }
}

/// A task entity as stored in the database and returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    /// Owner. Every mutation checks this against the authenticated caller.
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Builds a fresh task for `user_id`, defaulting status to pending.
    pub fn new(input: TaskInput, user_id: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            status: input.status.unwrap_or(TaskStatus::Pending),
            user_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Payload for creating a task.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TaskInput {
    #[validate(length(min = 1, max = 100, message = "Title must be 1 to 100 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 500, message = "Description must be 1 to 500 characters"))]
    pub description: String,

    /// Defaults to `pending` when omitted.
    pub status: Option<TaskStatus>,
}

/// Partial update payload for `PUT /tasks/{id}`.
/// Omitted fields keep their stored values.
#[derive(Debug, Default, Clone, Serialize, Deserialize, Validate)]
pub struct TaskPatch {
    #[validate(length(min = 1, max = 100, message = "Title must be 1 to 100 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 500, message = "Description must be 1 to 500 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

/// Body of `PATCH /tasks/{id}/status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: TaskStatus,
}

/// Query string of `GET /tasks/search`.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

/// One entry of a bulk update.
#[derive(Debug, Serialize, Deserialize)]
pub struct BulkUpdateEntry {
    pub id: Uuid,
    pub data: TaskPatch,
}

/// Body of `PATCH /tasks/bulk`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BulkUpdateRequest {
    pub updates: Vec<BulkUpdateEntry>,
}

/// Body of `DELETE /tasks/bulk`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteRequest {
    pub task_ids: Vec<Uuid>,
}

/// `{"task": ..}` wire envelope shared by server responses and the client.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub task: Task,
}

/// `{"tasks": [..]}` wire envelope shared by server responses and the client.
#[derive(Debug, Serialize, Deserialize)]
pub struct TasksEnvelope {
    pub tasks: Vec<Task>,
}
