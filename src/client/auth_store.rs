//!
//! # Auth session store
//!
//! Single source of truth for the current user, token, and auth flag.
//! State machine: anonymous → verifying (loading) → authenticated | error.
//! `user` and `token` persist via [`SessionStorage`] so a session survives
//! process restart; `loading` and `error` never do.

use serde::Serialize;
use std::sync::{Arc, Mutex};

use crate::auth::{AuthResponse, VerifyResponse};
use crate::client::api::{ApiClient, ApiError};
use crate::client::events::EventBus;
use crate::client::notify::ToastKind;
use crate::client::storage::{SessionStorage, REFRESH_TOKEN_KEY, TOKEN_KEY, USER_KEY};
use crate::models::User;

/// Login payload.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Registration payload. Password confirmation is a form concern and never
/// reaches the store.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Client-side projection of the session.
///
/// Invariant: `is_authenticated` implies both `user` and `token` are set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    pub token: Option<String>,
    pub is_authenticated: bool,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct AuthStore {
    state: Mutex<AuthState>,
    api: Arc<ApiClient>,
    storage: Arc<dyn SessionStorage>,
    events: EventBus,
}

impl AuthStore {
    pub fn new(api: Arc<ApiClient>, storage: Arc<dyn SessionStorage>, events: EventBus) -> Self {
        Self {
            state: Mutex::new(AuthState::default()),
            api,
            storage,
            events,
        }
    }

    /// Current state, cloned. Derived consumers re-read after every action.
    pub fn snapshot(&self) -> AuthState {
        self.state.lock().unwrap().clone()
    }

    fn set(&self, apply: impl FnOnce(&mut AuthState)) {
        apply(&mut self.state.lock().unwrap());
    }

    fn persist_session(&self, user: &User, token: &str) {
        self.storage.set(TOKEN_KEY, token);
        match serde_json::to_string(user) {
            Ok(serialized) => self.storage.set(USER_KEY, &serialized),
            Err(e) => log::warn!("failed to serialize user for storage: {}", e),
        }
    }

    fn clear_session_storage(&self) {
        self.storage.remove(TOKEN_KEY);
        self.storage.remove(REFRESH_TOKEN_KEY);
        self.storage.remove(USER_KEY);
    }

    fn enter_authenticated(&self, user: User, token: String) {
        self.set(|s| {
            s.user = Some(user);
            s.token = Some(token);
            s.is_authenticated = true;
            s.loading = false;
            s.error = None;
        });
    }

    fn enter_anonymous(&self, error: Option<String>) {
        self.set(|s| {
            s.user = None;
            s.token = None;
            s.is_authenticated = false;
            s.loading = false;
            s.error = error;
        });
    }

    async fn authenticate(
        &self,
        path: &str,
        body: &impl Serialize,
        success_title: &str,
        failure_title: &str,
    ) -> Result<(), ApiError> {
        self.set(|s| {
            s.loading = true;
            s.error = None;
        });

        match self.api.post::<_, AuthResponse>(path, body).await {
            Ok(response) => {
                self.persist_session(&response.user, &response.token);
                let name = response.user.name.clone();
                self.enter_authenticated(response.user, response.token);
                self.events.notify(
                    ToastKind::Success,
                    success_title,
                    Some(format!("Bem-vindo(a), {}!", name)),
                );
                Ok(())
            }
            Err(error) => {
                let message = error.user_message();
                self.enter_anonymous(Some(message.clone()));
                self.events
                    .notify(ToastKind::Error, failure_title, Some(message));
                Err(error)
            }
        }
    }

    pub async fn login(&self, credentials: Credentials) -> Result<(), ApiError> {
        self.authenticate(
            "/auth/login",
            &credentials,
            "Login realizado com sucesso!",
            "Erro no login",
        )
        .await
    }

    pub async fn register(&self, registration: Registration) -> Result<(), ApiError> {
        self.authenticate(
            "/auth/register",
            &registration,
            "Conta criada com sucesso!",
            "Erro no registro",
        )
        .await
    }

    /// Clears the session locally, immediately and synchronously.
    ///
    /// The server notify is fire-and-forget: its failure is logged and never
    /// blocks or reverts the local clear.
    pub fn logout(&self) {
        let api = Arc::clone(&self.api);
        tokio::spawn(async move {
            if let Err(error) = api.post_empty::<serde_json::Value>("/auth/logout").await {
                log::warn!("logout request failed: {}", error);
            }
        });

        self.clear_session_storage();
        self.enter_anonymous(None);
        self.events.notify(
            ToastKind::Info,
            "Logout realizado",
            Some("Você foi desconectado com sucesso".to_string()),
        );
    }

    /// Startup session restoration.
    ///
    /// Without a persisted token+user pair the store goes anonymous without
    /// touching the network. Otherwise the token is verified server-side and
    /// the server's user object replaces the cached one. Verification
    /// failure clears everything silently; on reload, an expired session and
    /// a fresh visit look the same.
    pub async fn check_auth(&self) {
        let token = self.storage.get(TOKEN_KEY);
        let cached_user = self
            .storage
            .get(USER_KEY)
            .and_then(|raw| serde_json::from_str::<User>(&raw).ok());

        let token = match (token, cached_user) {
            (Some(token), Some(_)) => token,
            _ => {
                self.enter_anonymous(None);
                return;
            }
        };

        self.set(|s| s.loading = true);

        match self.api.get::<VerifyResponse>("/auth/verify").await {
            Ok(response) => {
                match serde_json::to_string(&response.user) {
                    Ok(serialized) => self.storage.set(USER_KEY, &serialized),
                    Err(e) => log::warn!("failed to serialize user for storage: {}", e),
                }
                self.enter_authenticated(response.user, token);
            }
            Err(error) => {
                log::debug!("stored session failed verification: {}", error);
                self.clear_session_storage();
                self.enter_anonymous(None);
            }
        }
    }

    pub fn clear_error(&self) {
        self.set(|s| s.error = None);
    }
}
