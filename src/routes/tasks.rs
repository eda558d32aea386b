//!
//! # Task routes
//!
//! Ownership-scoped CRUD over the `tasks` table. Every query filters on the
//! authenticated caller's id, so a task owned by someone else is
//! indistinguishable from a missing one (404).

use crate::{
    auth::AuthenticatedUser,
    error::AppError,
    models::{
        BulkDeleteRequest, BulkUpdateRequest, SearchQuery, StatusUpdate, Task, TaskEnvelope,
        TaskInput, TaskPatch, TasksEnvelope,
    },
};
use actix_web::{delete, get, patch, post, put, web, HttpResponse, Responder};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

const TASK_COLUMNS: &str = "id, title, description, status, user_id, created_at, updated_at";

async fn fetch_owned_task(
    pool: &PgPool,
    task_id: Uuid,
    user_id: i32,
) -> Result<Task, AppError> {
    let task = sqlx::query_as::<_, Task>(&format!(
        "SELECT {} FROM tasks WHERE id = $1 AND user_id = $2",
        TASK_COLUMNS
    ))
    .bind(task_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    task.ok_or_else(|| AppError::NotFound("Task not found".into()))
}

/// Applies a partial update and returns the new row, or `None` when the task
/// does not exist or belongs to someone else. Takes any executor so bulk
/// callers can run it inside a transaction.
async fn apply_patch<'e, E>(
    executor: E,
    task_id: Uuid,
    user_id: i32,
    patch: &TaskPatch,
) -> Result<Option<Task>, AppError>
where
    E: sqlx::PgExecutor<'e>,
{
    let task = sqlx::query_as::<_, Task>(&format!(
        "UPDATE tasks \
         SET title = COALESCE($1, title), \
             description = COALESCE($2, description), \
             status = COALESCE($3, status), \
             updated_at = NOW() \
         WHERE id = $4 AND user_id = $5 \
         RETURNING {}",
        TASK_COLUMNS
    ))
    .bind(&patch.title)
    .bind(&patch.description)
    .bind(patch.status)
    .bind(task_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    Ok(task)
}

/// Lists the caller's tasks, newest first.
#[get("")]
pub async fn list_tasks(
    pool: web::Data<PgPool>,
    caller: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let tasks = sqlx::query_as::<_, Task>(&format!(
        "SELECT {} FROM tasks WHERE user_id = $1 ORDER BY created_at DESC",
        TASK_COLUMNS
    ))
    .bind(caller.user_id())
    .fetch_all(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(TasksEnvelope { tasks }))
}

/// Case-insensitive search over the caller's task titles and descriptions.
#[get("/search")]
pub async fn search_tasks(
    pool: web::Data<PgPool>,
    caller: AuthenticatedUser,
    query: web::Query<SearchQuery>,
) -> Result<impl Responder, AppError> {
    let pattern = format!("%{}%", query.q);
    let tasks = sqlx::query_as::<_, Task>(&format!(
        "SELECT {} FROM tasks \
         WHERE user_id = $1 AND (title ILIKE $2 OR description ILIKE $2) \
         ORDER BY created_at DESC",
        TASK_COLUMNS
    ))
    .bind(caller.user_id())
    .bind(&pattern)
    .fetch_all(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(TasksEnvelope { tasks }))
}

/// Creates a task owned by the caller; status defaults to pending.
#[post("")]
pub async fn create_task(
    pool: web::Data<PgPool>,
    caller: AuthenticatedUser,
    task_data: web::Json<TaskInput>,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;

    let task = Task::new(task_data.into_inner(), caller.user_id());

    let task = sqlx::query_as::<_, Task>(&format!(
        "INSERT INTO tasks (id, title, description, status, user_id, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {}",
        TASK_COLUMNS
    ))
    .bind(task.id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status)
    .bind(task.user_id)
    .bind(task.created_at)
    .bind(task.updated_at)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Created().json(TaskEnvelope { task }))
}

/// Fetches a single task by id.
#[get("/{id}")]
pub async fn get_task(
    pool: web::Data<PgPool>,
    caller: AuthenticatedUser,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let task = fetch_owned_task(&pool, task_id.into_inner(), caller.user_id()).await?;
    Ok(HttpResponse::Ok().json(TaskEnvelope { task }))
}

/// Partially updates a task; omitted fields keep their stored values.
#[put("/{id}")]
pub async fn update_task(
    pool: web::Data<PgPool>,
    caller: AuthenticatedUser,
    task_id: web::Path<Uuid>,
    task_data: web::Json<TaskPatch>,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;

    let task = apply_patch(&**pool, task_id.into_inner(), caller.user_id(), &task_data)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".into()))?;

    Ok(HttpResponse::Ok().json(TaskEnvelope { task }))
}

/// Sets only the status of a task.
#[patch("/{id}/status")]
pub async fn update_task_status(
    pool: web::Data<PgPool>,
    caller: AuthenticatedUser,
    task_id: web::Path<Uuid>,
    body: web::Json<StatusUpdate>,
) -> Result<impl Responder, AppError> {
    let patch = TaskPatch {
        status: Some(body.status),
        ..TaskPatch::default()
    };
    let task = apply_patch(&**pool, task_id.into_inner(), caller.user_id(), &patch)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".into()))?;

    Ok(HttpResponse::Ok().json(TaskEnvelope { task }))
}

/// Flips completion: completed tasks reopen as pending, open tasks complete.
#[patch("/{id}/toggle")]
pub async fn toggle_task(
    pool: web::Data<PgPool>,
    caller: AuthenticatedUser,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let task_id = task_id.into_inner();
    let current = fetch_owned_task(&pool, task_id, caller.user_id()).await?;

    let patch = TaskPatch {
        status: Some(current.status.toggled()),
        ..TaskPatch::default()
    };
    let task = apply_patch(&**pool, task_id, caller.user_id(), &patch)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".into()))?;

    Ok(HttpResponse::Ok().json(TaskEnvelope { task }))
}

/// Deletes a task by id.
#[delete("/{id}")]
pub async fn delete_task(
    pool: web::Data<PgPool>,
    caller: AuthenticatedUser,
    task_id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
        .bind(task_id.into_inner())
        .bind(caller.user_id())
        .execute(&**pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Task not found".into()));
    }

    Ok(HttpResponse::NoContent().finish())
}

/// Applies several partial updates in one request, all-or-nothing.
///
/// Every entry is validated before anything is written, and the updates run
/// in a single transaction, so a bad entry leaves no task modified. Returns
/// the updated rows in request order; ids that do not resolve to a task
/// owned by the caller are skipped rather than failing the batch.
#[patch("/bulk")]
pub async fn bulk_update_tasks(
    pool: web::Data<PgPool>,
    caller: AuthenticatedUser,
    body: web::Json<BulkUpdateRequest>,
) -> Result<impl Responder, AppError> {
    for entry in &body.updates {
        entry.data.validate()?;
    }

    let mut tx = pool.begin().await?;
    let mut tasks = Vec::with_capacity(body.updates.len());
    for entry in &body.updates {
        if let Some(task) = apply_patch(&mut *tx, entry.id, caller.user_id(), &entry.data).await? {
            tasks.push(task);
        }
    }
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(TasksEnvelope { tasks }))
}

/// Deletes several tasks in one request; foreign ids are ignored.
#[delete("/bulk")]
pub async fn bulk_delete_tasks(
    pool: web::Data<PgPool>,
    caller: AuthenticatedUser,
    body: web::Json<BulkDeleteRequest>,
) -> Result<impl Responder, AppError> {
    sqlx::query("DELETE FROM tasks WHERE user_id = $1 AND id = ANY($2)")
        .bind(caller.user_id())
        .bind(&body.task_ids)
        .execute(&**pool)
        .await?;

    Ok(HttpResponse::NoContent().finish())
}
