//! Client-slice integration tests.
//!
//! The stores and the API adapter are exercised over real HTTP against an
//! in-process actix server backed by in-memory state, so these tests need no
//! database. The mock speaks the same wire format as the real routes.

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer, Responder};
use chrono::Utc;
use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use taskdeck::auth::{AuthResponse, TokenResponse, VerifyResponse};
use taskdeck::client::{
    route_notifications, ApiClient, ApiErrorKind, AuthStore, Credentials, EventBus, MemoryStorage,
    SessionStorage, StoreEvent, TaskFilter, TaskStore, Toast, ToastKind, ToastQueue,
};
use taskdeck::client::storage::{REFRESH_TOKEN_KEY, TOKEN_KEY, USER_KEY};
use taskdeck::models::{Task, TaskEnvelope, TaskInput, TaskPatch, TaskStatus, TasksEnvelope, User};

const PASSWORD: &str = "password123";
const FIRST_TOKEN: &str = "token-1";
const REFRESHED_TOKEN: &str = "token-2";
const GOOD_REFRESH: &str = "refresh-ok";

#[derive(Default)]
struct MockState {
    tasks: Mutex<Vec<Task>>,
    valid_tokens: Mutex<HashSet<String>>,
    list_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    fail_task_list: AtomicBool,
}

impl MockState {
    fn accept(&self, token: &str) {
        self.valid_tokens.lock().unwrap().insert(token.to_string());
    }

    fn authorized(&self, req: &HttpRequest) -> bool {
        req.headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|token| self.valid_tokens.lock().unwrap().contains(token))
            .unwrap_or(false)
    }
}

fn server_user() -> User {
    User {
        id: 1,
        name: "Maria do Servidor".to_string(),
        email: "maria@example.com".to_string(),
        created_at: Utc::now(),
    }
}

fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized().json(json!({ "message": "Credenciais inválidas" }))
}

#[derive(Deserialize)]
struct LoginBody {
    #[allow(dead_code)]
    email: String,
    password: String,
}

async fn login(state: web::Data<MockState>, body: web::Json<LoginBody>) -> impl Responder {
    if body.password == PASSWORD {
        state.accept(FIRST_TOKEN);
        HttpResponse::Ok().json(AuthResponse {
            user: server_user(),
            token: FIRST_TOKEN.to_string(),
        })
    } else {
        unauthorized()
    }
}

async fn verify(state: web::Data<MockState>, req: HttpRequest) -> impl Responder {
    if state.authorized(&req) {
        HttpResponse::Ok().json(VerifyResponse {
            user: server_user(),
        })
    } else {
        unauthorized()
    }
}

async fn logout() -> impl Responder {
    HttpResponse::Ok().json(json!({ "message": "Logged out" }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody {
    refresh_token: String,
}

async fn refresh(state: web::Data<MockState>, body: web::Json<RefreshBody>) -> impl Responder {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    if body.refresh_token == GOOD_REFRESH {
        state.accept(REFRESHED_TOKEN);
        HttpResponse::Ok().json(TokenResponse {
            token: REFRESHED_TOKEN.to_string(),
        })
    } else {
        unauthorized()
    }
}

async fn list_tasks(state: web::Data<MockState>, req: HttpRequest) -> impl Responder {
    state.list_calls.fetch_add(1, Ordering::SeqCst);
    if !state.authorized(&req) {
        return unauthorized();
    }
    if state.fail_task_list.load(Ordering::SeqCst) {
        return HttpResponse::InternalServerError().json(json!({ "message": "boom" }));
    }
    HttpResponse::Ok().json(TasksEnvelope {
        tasks: state.tasks.lock().unwrap().clone(),
    })
}

async fn create_task(
    state: web::Data<MockState>,
    req: HttpRequest,
    body: web::Json<TaskInput>,
) -> impl Responder {
    if !state.authorized(&req) {
        return unauthorized();
    }
    let task = Task::new(body.into_inner(), 1);
    state.tasks.lock().unwrap().push(task.clone());
    HttpResponse::Created().json(TaskEnvelope { task })
}

async fn update_task(
    state: web::Data<MockState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<TaskPatch>,
) -> impl Responder {
    if !state.authorized(&req) {
        return unauthorized();
    }
    let id = path.into_inner();
    let mut tasks = state.tasks.lock().unwrap();
    match tasks.iter_mut().find(|t| t.id == id) {
        Some(task) => {
            if let Some(title) = &body.title {
                task.title = title.clone();
            }
            if let Some(description) = &body.description {
                task.description = description.clone();
            }
            if let Some(status) = body.status {
                task.status = status;
            }
            task.updated_at = Utc::now();
            HttpResponse::Ok().json(TaskEnvelope { task: task.clone() })
        }
        None => HttpResponse::NotFound().json(json!({ "message": "Task not found" })),
    }
}

async fn toggle_task(
    state: web::Data<MockState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> impl Responder {
    if !state.authorized(&req) {
        return unauthorized();
    }
    let id = path.into_inner();
    let mut tasks = state.tasks.lock().unwrap();
    match tasks.iter_mut().find(|t| t.id == id) {
        Some(task) => {
            task.status = task.status.toggled();
            task.updated_at = Utc::now();
            HttpResponse::Ok().json(TaskEnvelope { task: task.clone() })
        }
        None => HttpResponse::NotFound().json(json!({ "message": "Task not found" })),
    }
}

async fn delete_task(
    state: web::Data<MockState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> impl Responder {
    if !state.authorized(&req) {
        return unauthorized();
    }
    let id = path.into_inner();
    state.tasks.lock().unwrap().retain(|t| t.id != id);
    HttpResponse::NoContent().finish()
}

/// Binds an ephemeral port and serves the mock API on it.
fn spawn_mock_server(state: web::Data<MockState>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind ephemeral port");
    let port = listener.local_addr().unwrap().port();

    let server = HttpServer::new(move || {
        App::new().app_data(state.clone()).service(
            web::scope("/api")
                .route("/auth/login", web::post().to(login))
                .route("/auth/verify", web::get().to(verify))
                .route("/auth/logout", web::post().to(logout))
                .route("/auth/refresh", web::post().to(refresh))
                .route("/tasks", web::get().to(list_tasks))
                .route("/tasks", web::post().to(create_task))
                .route("/tasks/{id}", web::put().to(update_task))
                .route("/tasks/{id}/toggle", web::patch().to(toggle_task))
                .route("/tasks/{id}", web::delete().to(delete_task)),
        )
    })
    .workers(1)
    .listen(listener)
    .expect("failed to listen")
    .run();

    actix_web::rt::spawn(server);
    format!("http://127.0.0.1:{}/api", port)
}

/// Wired-up client slice pointed at a mock server, the way an application
/// root would assemble it.
struct Harness {
    storage: Arc<MemoryStorage>,
    events: EventBus,
    toasts: Arc<ToastQueue>,
    session_expiries: Arc<AtomicUsize>,
    api: Arc<ApiClient>,
}

impl Harness {
    fn new(base_url: &str) -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let events = EventBus::new();
        let toasts = Arc::new(ToastQueue::new());
        route_notifications(&events, Arc::clone(&toasts));

        let session_expiries = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&session_expiries);
        events.subscribe(move |event| {
            if *event == StoreEvent::SessionExpired {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let storage_dyn: Arc<dyn SessionStorage> = storage.clone();
        let api = Arc::new(ApiClient::new(base_url, storage_dyn, events.clone()));
        Self {
            storage,
            events,
            toasts,
            session_expiries,
            api,
        }
    }

    fn auth_store(&self) -> AuthStore {
        let storage_dyn: Arc<dyn SessionStorage> = self.storage.clone();
        AuthStore::new(Arc::clone(&self.api), storage_dyn, self.events.clone())
    }

    fn task_store(&self) -> TaskStore {
        TaskStore::new(Arc::clone(&self.api), self.events.clone())
    }

    fn last_toast(&self) -> Toast {
        self.toasts.toasts().last().cloned().expect("expected a toast")
    }
}

fn credentials(password: &str) -> Credentials {
    Credentials {
        email: "maria@example.com".to_string(),
        password: password.to_string(),
    }
}

#[actix_rt::test]
async fn test_login_success_authenticates_and_persists() {
    let state = web::Data::new(MockState::default());
    let base_url = spawn_mock_server(state);
    let harness = Harness::new(&base_url);
    let auth = harness.auth_store();

    auth.login(credentials(PASSWORD)).await.unwrap();

    let snapshot = auth.snapshot();
    assert!(snapshot.is_authenticated);
    assert_eq!(snapshot.token.as_deref(), Some(FIRST_TOKEN));
    assert_eq!(snapshot.user.as_ref().unwrap().name, "Maria do Servidor");
    assert!(!snapshot.loading);
    assert!(snapshot.error.is_none());

    // Session artifacts are persisted under the well-known keys.
    assert_eq!(harness.storage.get(TOKEN_KEY).as_deref(), Some(FIRST_TOKEN));
    let cached: User =
        serde_json::from_str(&harness.storage.get(USER_KEY).unwrap()).unwrap();
    assert_eq!(cached.name, "Maria do Servidor");

    let toast = harness.last_toast();
    assert_eq!(toast.kind, ToastKind::Success);
    assert_eq!(toast.title, "Login realizado com sucesso!");
    assert_eq!(
        toast.message.as_deref(),
        Some("Bem-vindo(a), Maria do Servidor!")
    );
}

#[actix_rt::test]
async fn test_login_failure_records_error_and_propagates() {
    let state = web::Data::new(MockState::default());
    let base_url = spawn_mock_server(state);
    let harness = Harness::new(&base_url);
    let auth = harness.auth_store();

    let error = auth.login(credentials("wrong-password")).await.unwrap_err();
    assert_eq!(error.kind, ApiErrorKind::Auth);
    // The 401 message never discloses whether the account exists.
    assert_eq!(error.message, "Credenciais inválidas");

    let snapshot = auth.snapshot();
    assert!(!snapshot.is_authenticated);
    assert!(snapshot.user.is_none());
    assert!(snapshot.token.is_none());
    assert!(snapshot.error.is_some());

    let toast = harness.last_toast();
    assert_eq!(toast.kind, ToastKind::Error);
    assert_eq!(toast.title, "Erro no login");
}

#[actix_rt::test]
async fn test_check_auth_adopts_the_server_user() {
    let state = web::Data::new(MockState::default());
    state.accept(FIRST_TOKEN);
    let base_url = spawn_mock_server(state);
    let harness = Harness::new(&base_url);

    // A stale cached user from a previous run.
    harness.storage.set(TOKEN_KEY, FIRST_TOKEN);
    let stale = User {
        name: "Nome Antigo".to_string(),
        ..server_user()
    };
    harness
        .storage
        .set(USER_KEY, &serde_json::to_string(&stale).unwrap());

    let auth = harness.auth_store();
    auth.check_auth().await;

    let snapshot = auth.snapshot();
    assert!(snapshot.is_authenticated);
    assert!(snapshot.user.is_some() && snapshot.token.is_some());
    assert_eq!(snapshot.user.unwrap().name, "Maria do Servidor");

    let cached: User =
        serde_json::from_str(&harness.storage.get(USER_KEY).unwrap()).unwrap();
    assert_eq!(cached.name, "Maria do Servidor");
}

#[actix_rt::test]
async fn test_check_auth_failure_clears_silently() {
    let state = web::Data::new(MockState::default());
    let base_url = spawn_mock_server(state);
    let harness = Harness::new(&base_url);

    harness.storage.set(TOKEN_KEY, "stale-token");
    harness
        .storage
        .set(USER_KEY, &serde_json::to_string(&server_user()).unwrap());

    let auth = harness.auth_store();
    auth.check_auth().await;

    let snapshot = auth.snapshot();
    assert!(!snapshot.is_authenticated);
    assert!(snapshot.user.is_none() && snapshot.token.is_none());
    assert!(snapshot.error.is_none());

    assert_eq!(harness.storage.get(TOKEN_KEY), None);
    assert_eq!(harness.storage.get(USER_KEY), None);
    // Reload-time expiry stays silent; no toast fires.
    assert!(harness.toasts.toasts().is_empty());
}

#[actix_rt::test]
async fn test_logout_clears_locally_and_immediately() {
    let state = web::Data::new(MockState::default());
    let base_url = spawn_mock_server(state);
    let harness = Harness::new(&base_url);
    let auth = harness.auth_store();

    auth.login(credentials(PASSWORD)).await.unwrap();
    auth.logout();

    let snapshot = auth.snapshot();
    assert!(!snapshot.is_authenticated);
    assert!(snapshot.user.is_none() && snapshot.token.is_none());
    assert_eq!(harness.storage.get(TOKEN_KEY), None);
    assert_eq!(harness.storage.get(USER_KEY), None);

    let toast = harness.last_toast();
    assert_eq!(toast.kind, ToastKind::Info);
    assert_eq!(toast.title, "Logout realizado");
}

#[actix_rt::test]
async fn test_create_then_fetch_round_trip() {
    let state = web::Data::new(MockState::default());
    state.accept(FIRST_TOKEN);
    let base_url = spawn_mock_server(state);
    let harness = Harness::new(&base_url);
    harness.storage.set(TOKEN_KEY, FIRST_TOKEN);

    let tasks = harness.task_store();
    tasks
        .create_task(TaskInput {
            title: "T".to_string(),
            description: "D".to_string(),
            status: None,
        })
        .await
        .unwrap();

    let toast = harness.last_toast();
    assert_eq!(toast.title, "Tarefa criada!");
    assert_eq!(
        toast.message.as_deref(),
        Some("A tarefa \"T\" foi criada com sucesso.")
    );

    tasks.fetch_tasks().await.unwrap();
    let list = tasks.snapshot().tasks;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].title, "T");
    assert_eq!(list[0].description, "D");
    assert_eq!(list[0].status, TaskStatus::Pending);
}

#[actix_rt::test]
async fn test_toggle_wording_tracks_resulting_status() {
    let state = web::Data::new(MockState::default());
    state.accept(FIRST_TOKEN);
    let base_url = spawn_mock_server(state);
    let harness = Harness::new(&base_url);
    harness.storage.set(TOKEN_KEY, FIRST_TOKEN);

    let tasks = harness.task_store();
    tasks
        .create_task(TaskInput {
            title: "Estudar".to_string(),
            description: "Capítulo 3".to_string(),
            status: None,
        })
        .await
        .unwrap();
    let id = tasks.snapshot().tasks[0].id;

    tasks.toggle_task_complete(id).await.unwrap();
    assert_eq!(tasks.task_by_id(id).unwrap().status, TaskStatus::Completed);
    let toast = harness.last_toast();
    assert_eq!(toast.title, "Tarefa concluída!");
    assert_eq!(
        toast.message.as_deref(),
        Some("A tarefa \"Estudar\" foi concluída.")
    );

    tasks.toggle_task_complete(id).await.unwrap();
    assert_eq!(tasks.task_by_id(id).unwrap().status, TaskStatus::Pending);
    let toast = harness.last_toast();
    assert_eq!(toast.title, "Tarefa reaberta!");
    assert_eq!(
        toast.message.as_deref(),
        Some("A tarefa \"Estudar\" foi reaberta.")
    );
}

#[actix_rt::test]
async fn test_update_replaces_entry_with_server_echo() {
    let state = web::Data::new(MockState::default());
    state.accept(FIRST_TOKEN);
    let base_url = spawn_mock_server(state);
    let harness = Harness::new(&base_url);
    harness.storage.set(TOKEN_KEY, FIRST_TOKEN);

    let tasks = harness.task_store();
    tasks
        .create_task(TaskInput {
            title: "Antes".to_string(),
            description: "desc".to_string(),
            status: None,
        })
        .await
        .unwrap();
    let id = tasks.snapshot().tasks[0].id;

    tasks
        .update_task(
            id,
            TaskPatch {
                title: Some("Depois".to_string()),
                ..TaskPatch::default()
            },
        )
        .await
        .unwrap();

    let task = tasks.task_by_id(id).unwrap();
    assert_eq!(task.title, "Depois");
    // Fields the patch omitted keep the server's stored values.
    assert_eq!(task.description, "desc");
    assert_eq!(harness.last_toast().title, "Tarefa atualizada!");
}

#[actix_rt::test]
async fn test_delete_uses_title_captured_before_the_call() {
    let state = web::Data::new(MockState::default());
    state.accept(FIRST_TOKEN);
    let base_url = spawn_mock_server(state);
    let harness = Harness::new(&base_url);
    harness.storage.set(TOKEN_KEY, FIRST_TOKEN);

    let tasks = harness.task_store();
    tasks
        .create_task(TaskInput {
            title: "Apagar-me".to_string(),
            description: "x".to_string(),
            status: None,
        })
        .await
        .unwrap();
    let id = tasks.snapshot().tasks[0].id;

    tasks.delete_task(id).await.unwrap();

    assert!(tasks.snapshot().tasks.is_empty());
    let toast = harness.last_toast();
    assert_eq!(toast.title, "Tarefa excluída!");
    assert_eq!(
        toast.message.as_deref(),
        Some("A tarefa \"Apagar-me\" foi excluída.")
    );
}

#[actix_rt::test]
async fn test_fetch_failure_leaves_previous_list_untouched() {
    let state = web::Data::new(MockState::default());
    state.accept(FIRST_TOKEN);
    let base_url = spawn_mock_server(state.clone());
    let harness = Harness::new(&base_url);
    harness.storage.set(TOKEN_KEY, FIRST_TOKEN);

    let tasks = harness.task_store();
    tasks
        .create_task(TaskInput {
            title: "Sobrevivente".to_string(),
            description: "x".to_string(),
            status: None,
        })
        .await
        .unwrap();

    state.fail_task_list.store(true, Ordering::SeqCst);
    let error = tasks.fetch_tasks().await.unwrap_err();
    assert_eq!(error.kind, ApiErrorKind::Server);

    let snapshot = tasks.snapshot();
    assert_eq!(snapshot.tasks.len(), 1);
    assert_eq!(snapshot.tasks[0].title, "Sobrevivente");
    assert!(!snapshot.loading);
    assert_eq!(
        snapshot.error.as_deref(),
        Some("Erro interno do servidor. Tente novamente mais tarde.")
    );
    assert_eq!(harness.last_toast().title, "Erro ao carregar tarefas");
}

#[actix_rt::test]
async fn test_401_triggers_exactly_one_refresh_and_replay() {
    let state = web::Data::new(MockState::default());
    let base_url = spawn_mock_server(state.clone());
    let harness = Harness::new(&base_url);

    harness.storage.set(TOKEN_KEY, "stale-token");
    harness.storage.set(REFRESH_TOKEN_KEY, GOOD_REFRESH);

    let tasks = harness.task_store();
    tasks.fetch_tasks().await.unwrap();

    // One 401 attempt, one refresh, one replay.
    assert_eq!(state.list_calls.load(Ordering::SeqCst), 2);
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        harness.storage.get(TOKEN_KEY).as_deref(),
        Some(REFRESHED_TOKEN)
    );
    assert_eq!(harness.session_expiries.load(Ordering::SeqCst), 0);
}

#[actix_rt::test]
async fn test_failed_refresh_forces_logout_without_retry_loop() {
    let state = web::Data::new(MockState::default());
    let base_url = spawn_mock_server(state.clone());
    let harness = Harness::new(&base_url);

    harness.storage.set(TOKEN_KEY, "stale-token");
    harness.storage.set(REFRESH_TOKEN_KEY, "bad-refresh");
    harness
        .storage
        .set(USER_KEY, &serde_json::to_string(&server_user()).unwrap());

    let tasks = harness.task_store();
    let error = tasks.fetch_tasks().await.unwrap_err();
    assert_eq!(error.kind, ApiErrorKind::Auth);

    // No second list attempt, no second refresh attempt.
    assert_eq!(state.list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);

    // All auth artifacts are gone and the dead session was announced.
    assert_eq!(harness.storage.get(TOKEN_KEY), None);
    assert_eq!(harness.storage.get(REFRESH_TOKEN_KEY), None);
    assert_eq!(harness.storage.get(USER_KEY), None);
    assert_eq!(harness.session_expiries.load(Ordering::SeqCst), 1);
}

#[actix_rt::test]
async fn test_filter_and_counts_after_server_mutations() {
    let state = web::Data::new(MockState::default());
    state.accept(FIRST_TOKEN);
    let base_url = spawn_mock_server(state);
    let harness = Harness::new(&base_url);
    harness.storage.set(TOKEN_KEY, FIRST_TOKEN);

    let tasks = harness.task_store();
    for title in ["um", "dois", "três"] {
        tasks
            .create_task(TaskInput {
                title: title.to_string(),
                description: "d".to_string(),
                status: None,
            })
            .await
            .unwrap();
    }
    let id = tasks.snapshot().tasks[0].id;
    tasks.toggle_task_complete(id).await.unwrap();

    let counts = tasks.task_counts();
    assert_eq!(counts.all, 3);
    assert_eq!(counts.pending, 2);
    assert_eq!(counts.completed, 1);

    tasks.set_filter(TaskFilter::Completed);
    let filtered = tasks.filtered_tasks();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].title, "um");

    // Derived views reflect the latest mutation with no caching.
    tasks.toggle_task_complete(id).await.unwrap();
    assert!(tasks.filtered_tasks().is_empty());
}
