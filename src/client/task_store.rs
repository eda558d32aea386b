//!
//! # Task collection store
//!
//! Single source of truth for the task list and active filter. Mutations are
//! confirm-then-apply: the server call happens first and the list only
//! changes with the server's returned representation, which is always
//! trusted as the new truth over any partial client data. Overlapping edits
//! to the same task are not reconciled; the last response to land wins.
//!
//! Every mutating action follows the same envelope: set loading and clear
//! the error, await the call, then either apply + success toast or record
//! the error + error toast and propagate `Err` to the caller.

use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::client::api::{ApiClient, ApiError};
use crate::client::events::EventBus;
use crate::client::notify::ToastKind;
use crate::models::{
    BulkDeleteRequest, BulkUpdateEntry, BulkUpdateRequest, StatusUpdate, Task, TaskEnvelope,
    TaskInput, TaskPatch, TaskStatus, TasksEnvelope,
};

/// Filter buckets over task status. The pending bucket covers both
/// `pending` and `in_progress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskFilter {
    #[default]
    All,
    Pending,
    Completed,
}

impl TaskFilter {
    fn matches(self, status: TaskStatus) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Pending => status.is_open(),
            TaskFilter::Completed => status.is_completed(),
        }
    }
}

/// Per-bucket totals, derived on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskCounts {
    pub all: usize,
    pub pending: usize,
    pub completed: usize,
}

/// Client-side projection of the task list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskState {
    /// Server order (newest first as the API returns it); display sorting is
    /// a derived view, see [`display_order`].
    pub tasks: Vec<Task>,
    pub filter: TaskFilter,
    pub loading: bool,
    pub error: Option<String>,
}

/// Documented display sort: open tasks before completed ones; open tasks
/// newest-created first; completed tasks most recently updated first.
pub fn display_order(tasks: &[Task]) -> Vec<Task> {
    let mut sorted = tasks.to_vec();
    sorted.sort_by(|a, b| {
        match (a.status.is_completed(), b.status.is_completed()) {
            (false, true) => std::cmp::Ordering::Less,
            (true, false) => std::cmp::Ordering::Greater,
            (false, false) => b.created_at.cmp(&a.created_at),
            (true, true) => b.updated_at.cmp(&a.updated_at),
        }
    });
    sorted
}

pub struct TaskStore {
    state: Mutex<TaskState>,
    api: Arc<ApiClient>,
    events: EventBus,
}

impl TaskStore {
    pub fn new(api: Arc<ApiClient>, events: EventBus) -> Self {
        Self {
            state: Mutex::new(TaskState::default()),
            api,
            events,
        }
    }

    pub fn snapshot(&self) -> TaskState {
        self.state.lock().unwrap().clone()
    }

    fn set(&self, apply: impl FnOnce(&mut TaskState)) {
        apply(&mut self.state.lock().unwrap());
    }

    fn begin(&self) {
        self.set(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    /// Records a failure and emits the error toast; the list is untouched.
    fn fail(&self, error: &ApiError, toast_title: &str) {
        let message = error.user_message();
        self.set(|s| {
            s.loading = false;
            s.error = Some(message.clone());
        });
        self.events
            .notify(ToastKind::Error, toast_title, Some(message));
    }

    fn replace_list(&self, tasks: Vec<Task>) {
        self.set(|s| {
            s.tasks = tasks;
            s.loading = false;
            s.error = None;
        });
    }

    /// Swaps the matching entry for the server's returned row.
    fn replace_task(&self, task: Task) {
        self.set(|s| {
            if let Some(slot) = s.tasks.iter_mut().find(|t| t.id == task.id) {
                *slot = task;
            }
            s.loading = false;
            s.error = None;
        });
    }

    /// Replaces the entire list with the server's result. On failure the
    /// previous list is left untouched.
    pub async fn fetch_tasks(&self) -> Result<(), ApiError> {
        self.begin();
        match self.api.get::<TasksEnvelope>("/tasks").await {
            Ok(body) => {
                self.replace_list(body.tasks);
                Ok(())
            }
            Err(error) => {
                self.fail(&error, "Erro ao carregar tarefas");
                Err(error)
            }
        }
    }

    /// Replaces the list with tasks matching `query` (title or description).
    pub async fn search_tasks(&self, query: &str) -> Result<(), ApiError> {
        self.begin();
        match self
            .api
            .get_query::<TasksEnvelope>("/tasks/search", &[("q", query)])
            .await
        {
            Ok(body) => {
                self.replace_list(body.tasks);
                Ok(())
            }
            Err(error) => {
                self.fail(&error, "Erro ao buscar tarefas");
                Err(error)
            }
        }
    }

    /// Server call first; the new task (with server-assigned id and
    /// timestamps) is appended only after confirmation.
    pub async fn create_task(&self, input: TaskInput) -> Result<(), ApiError> {
        self.begin();
        match self.api.post::<_, TaskEnvelope>("/tasks", &input).await {
            Ok(body) => {
                let title = body.task.title.clone();
                self.set(|s| {
                    s.tasks.push(body.task);
                    s.loading = false;
                    s.error = None;
                });
                self.events.notify(
                    ToastKind::Success,
                    "Tarefa criada!",
                    Some(format!("A tarefa \"{}\" foi criada com sucesso.", title)),
                );
                Ok(())
            }
            Err(error) => {
                self.fail(&error, "Erro ao criar tarefa");
                Err(error)
            }
        }
    }

    pub async fn update_task(&self, id: Uuid, patch: TaskPatch) -> Result<(), ApiError> {
        self.begin();
        match self
            .api
            .put::<_, TaskEnvelope>(&format!("/tasks/{}", id), &patch)
            .await
        {
            Ok(body) => {
                let title = body.task.title.clone();
                self.replace_task(body.task);
                self.events.notify(
                    ToastKind::Success,
                    "Tarefa atualizada!",
                    Some(format!(
                        "A tarefa \"{}\" foi atualizada com sucesso.",
                        title
                    )),
                );
                Ok(())
            }
            Err(error) => {
                self.fail(&error, "Erro ao atualizar tarefa");
                Err(error)
            }
        }
    }

    /// Flips completion. The toast wording depends on the resulting status:
    /// "concluída" when it completed, "reaberta" when it reopened.
    pub async fn toggle_task_complete(&self, id: Uuid) -> Result<(), ApiError> {
        self.begin();
        match self
            .api
            .patch_empty::<TaskEnvelope>(&format!("/tasks/{}/toggle", id))
            .await
        {
            Ok(body) => {
                let title = body.task.title.clone();
                let wording = if body.task.status.is_completed() {
                    "concluída"
                } else {
                    "reaberta"
                };
                self.replace_task(body.task);
                self.events.notify(
                    ToastKind::Success,
                    format!("Tarefa {}!", wording),
                    Some(format!("A tarefa \"{}\" foi {}.", title, wording)),
                );
                Ok(())
            }
            Err(error) => {
                self.fail(&error, "Erro ao alterar status da tarefa");
                Err(error)
            }
        }
    }

    /// Sets the status directly; no toast, this backs silent UI controls.
    pub async fn update_task_status(&self, id: Uuid, status: TaskStatus) -> Result<(), ApiError> {
        self.begin();
        match self
            .api
            .patch::<_, TaskEnvelope>(&format!("/tasks/{}/status", id), &StatusUpdate { status })
            .await
        {
            Ok(body) => {
                self.replace_task(body.task);
                Ok(())
            }
            Err(error) => {
                let message = error.user_message();
                self.set(|s| {
                    s.loading = false;
                    s.error = Some(message);
                });
                Err(error)
            }
        }
    }

    /// The title is captured before the call; afterwards the task is no
    /// longer resolvable for the success toast.
    pub async fn delete_task(&self, id: Uuid) -> Result<(), ApiError> {
        let title = self.task_by_id(id).map(|t| t.title);
        self.begin();
        match self.api.delete(&format!("/tasks/{}", id)).await {
            Ok(()) => {
                self.set(|s| {
                    s.tasks.retain(|t| t.id != id);
                    s.loading = false;
                    s.error = None;
                });
                let message = match title {
                    Some(title) => format!("A tarefa \"{}\" foi excluída.", title),
                    None => "Tarefa excluída com sucesso.".to_string(),
                };
                self.events
                    .notify(ToastKind::Success, "Tarefa excluída!", Some(message));
                Ok(())
            }
            Err(error) => {
                self.fail(&error, "Erro ao excluir tarefa");
                Err(error)
            }
        }
    }

    /// Applies several updates in one request and merges the returned rows.
    pub async fn bulk_update_tasks(
        &self,
        updates: Vec<BulkUpdateEntry>,
    ) -> Result<(), ApiError> {
        self.begin();
        let request = BulkUpdateRequest { updates };
        match self
            .api
            .patch::<_, TasksEnvelope>("/tasks/bulk", &request)
            .await
        {
            Ok(body) => {
                let count = body.tasks.len();
                self.set(|s| {
                    for task in body.tasks {
                        if let Some(slot) = s.tasks.iter_mut().find(|t| t.id == task.id) {
                            *slot = task;
                        }
                    }
                    s.loading = false;
                    s.error = None;
                });
                self.events.notify(
                    ToastKind::Success,
                    "Tarefas atualizadas!",
                    Some(format!("{} tarefa(s) atualizada(s).", count)),
                );
                Ok(())
            }
            Err(error) => {
                self.fail(&error, "Erro ao atualizar tarefas");
                Err(error)
            }
        }
    }

    pub async fn bulk_delete_tasks(&self, ids: Vec<Uuid>) -> Result<(), ApiError> {
        self.begin();
        let request = BulkDeleteRequest {
            task_ids: ids.clone(),
        };
        match self.api.delete_with_body("/tasks/bulk", &request).await {
            Ok(()) => {
                self.set(|s| {
                    s.tasks.retain(|t| !ids.contains(&t.id));
                    s.loading = false;
                    s.error = None;
                });
                self.events.notify(
                    ToastKind::Success,
                    "Tarefas excluídas!",
                    Some(format!("{} tarefa(s) excluída(s).", ids.len())),
                );
                Ok(())
            }
            Err(error) => {
                self.fail(&error, "Erro ao excluir tarefas");
                Err(error)
            }
        }
    }

    /// Pure local change: no network call, no loading transition.
    pub fn set_filter(&self, filter: TaskFilter) {
        self.set(|s| s.filter = filter);
    }

    pub fn clear_error(&self) {
        self.set(|s| s.error = None);
    }

    /// Recomputed on every call from the current list and filter only; the
    /// filter history is irrelevant.
    pub fn filtered_tasks(&self) -> Vec<Task> {
        let state = self.state.lock().unwrap();
        state
            .tasks
            .iter()
            .filter(|t| state.filter.matches(t.status))
            .cloned()
            .collect()
    }

    /// The filtered list in display order.
    pub fn display_tasks(&self) -> Vec<Task> {
        display_order(&self.filtered_tasks())
    }

    pub fn task_by_id(&self, id: Uuid) -> Option<Task> {
        self.state
            .lock()
            .unwrap()
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    pub fn task_counts(&self) -> TaskCounts {
        let state = self.state.lock().unwrap();
        TaskCounts {
            all: state.tasks.len(),
            pending: state.tasks.iter().filter(|t| t.status.is_open()).count(),
            completed: state
                .tasks
                .iter()
                .filter(|t| t.status.is_completed())
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::storage::{MemoryStorage, SessionStorage};
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;

    fn local_store() -> TaskStore {
        let storage: Arc<dyn SessionStorage> = Arc::new(MemoryStorage::new());
        let events = EventBus::new();
        let api = Arc::new(ApiClient::new(
            "http://127.0.0.1:9/api",
            storage,
            events.clone(),
        ));
        TaskStore::new(api, events)
    }

    fn task(title: &str, status: TaskStatus, age_minutes: i64) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: "d".to_string(),
            status,
            user_id: 1,
            created_at: now - Duration::minutes(age_minutes),
            updated_at: now - Duration::minutes(age_minutes),
        }
    }

    fn seed(store: &TaskStore, tasks: Vec<Task>) {
        store.set(|s| s.tasks = tasks);
    }

    #[test]
    fn test_filtered_tasks_depends_only_on_current_filter() {
        let store = local_store();
        seed(
            &store,
            vec![
                task("a", TaskStatus::Pending, 3),
                task("b", TaskStatus::InProgress, 2),
                task("c", TaskStatus::Completed, 1),
            ],
        );

        // Thrash the filter; only the last value may matter.
        store.set_filter(TaskFilter::Completed);
        store.set_filter(TaskFilter::All);
        store.set_filter(TaskFilter::Pending);

        let titles: Vec<_> = store
            .filtered_tasks()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["a", "b"]);

        store.set_filter(TaskFilter::Completed);
        let titles: Vec<_> = store
            .filtered_tasks()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["c"]);
    }

    #[test]
    fn test_counts_bucket_in_progress_as_pending() {
        let store = local_store();
        seed(
            &store,
            vec![
                task("a", TaskStatus::Pending, 3),
                task("b", TaskStatus::InProgress, 2),
                task("c", TaskStatus::Completed, 1),
            ],
        );

        let counts = store.task_counts();
        assert_eq!(counts.all, 3);
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.completed, 1);
    }

    #[test]
    fn test_display_order_puts_open_before_completed() {
        // Completed task updated *after* the open task was created; the open
        // task must still come first.
        let now = Utc::now();
        let mut done = task("done", TaskStatus::Completed, 10);
        done.updated_at = now;
        let open = task("open", TaskStatus::Pending, 5);

        let ordered = display_order(&[done.clone(), open.clone()]);
        let titles: Vec<_> = ordered.into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["open", "done"]);
    }

    #[test]
    fn test_display_order_within_buckets() {
        let older_open = task("older-open", TaskStatus::Pending, 30);
        let newer_open = task("newer-open", TaskStatus::InProgress, 5);
        let mut stale_done = task("stale-done", TaskStatus::Completed, 60);
        stale_done.updated_at = Utc::now() - Duration::minutes(50);
        let mut fresh_done = task("fresh-done", TaskStatus::Completed, 40);
        fresh_done.updated_at = Utc::now() - Duration::minutes(1);

        let ordered = display_order(&[
            stale_done.clone(),
            older_open.clone(),
            fresh_done.clone(),
            newer_open.clone(),
        ]);
        let titles: Vec<_> = ordered.into_iter().map(|t| t.title).collect();
        assert_eq!(
            titles,
            vec!["newer-open", "older-open", "fresh-done", "stale-done"]
        );
    }

    #[test]
    fn test_set_filter_is_purely_local() {
        let store = local_store();
        store.set_filter(TaskFilter::Completed);
        let state = store.snapshot();
        assert_eq!(state.filter, TaskFilter::Completed);
        assert!(!state.loading);
        assert!(state.error.is_none());
    }
}
