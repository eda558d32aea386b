//!
//! # API client adapter
//!
//! Uniform request dispatch for the client stores: bearer-token attachment
//! from session storage, a single 401-triggered refresh-and-replay, and
//! normalization of every failure into [`ApiError`] before it reaches a
//! store. Stores never inspect raw transport errors.

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::TokenResponse;
use crate::client::events::{EventBus, StoreEvent};
use crate::client::storage::{SessionStorage, REFRESH_TOKEN_KEY, TOKEN_KEY, USER_KEY};

/// Fixed request timeout; no per-operation override.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Closed taxonomy of request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// No response was received at all.
    Network,
    /// 401.
    Auth,
    /// 400, may carry a field name.
    Validation,
    /// 403.
    Permission,
    /// 404.
    NotFound,
    /// 5xx.
    Server,
    /// Anything else.
    Unknown,
}

/// Normalized failure shape surfaced to the stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    /// HTTP status, or 0 when no response was received.
    pub status: u16,
    pub message: String,
    pub field: Option<String>,
}

/// Error body the server sends: `{message, field?}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    field: Option<String>,
}

impl ApiError {
    fn network(error: &reqwest::Error) -> Self {
        ApiError {
            kind: ApiErrorKind::Network,
            status: 0,
            message: error.to_string(),
            field: None,
        }
    }

    fn from_status(status: StatusCode, message: String, field: Option<String>) -> Self {
        let kind = match status.as_u16() {
            400 => ApiErrorKind::Validation,
            401 => ApiErrorKind::Auth,
            403 => ApiErrorKind::Permission,
            404 => ApiErrorKind::NotFound,
            500..=599 => ApiErrorKind::Server,
            _ => ApiErrorKind::Unknown,
        };
        ApiError {
            kind,
            status: status.as_u16(),
            message,
            field,
        }
    }

    /// Localized user-facing message for this failure class.
    /// Validation messages come from the server and are shown verbatim.
    pub fn user_message(&self) -> String {
        match self.kind {
            ApiErrorKind::Network => {
                "Erro de conexão. Verifique sua internet e tente novamente.".to_string()
            }
            ApiErrorKind::Auth => "Sessão expirada. Faça login novamente.".to_string(),
            ApiErrorKind::Permission => {
                "Você não tem permissão para realizar esta ação.".to_string()
            }
            ApiErrorKind::NotFound => "Recurso não encontrado.".to_string(),
            ApiErrorKind::Server => {
                "Erro interno do servidor. Tente novamente mais tarde.".to_string()
            }
            ApiErrorKind::Validation | ApiErrorKind::Unknown => {
                if self.message.is_empty() {
                    "Erro desconhecido".to_string()
                } else {
                    self.message.clone()
                }
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?} ({}): {}", self.kind, self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

/// HTTP transport shared by the client stores.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    storage: Arc<dyn SessionStorage>,
    events: EventBus,
}

impl ApiClient {
    /// `base_url` includes the API prefix, e.g. `http://localhost:8080/api`.
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend fails to initialize, the only fallible step
    /// of the client build; the timeout set here cannot fail it.
    pub fn new(
        base_url: impl Into<String>,
        storage: Arc<dyn SessionStorage>,
        events: EventBus,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            base_url: base_url.into(),
            storage,
            events,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request_json(Method::GET, path, None, None).await
    }

    pub async fn get_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        self.request_json(Method::GET, path, Some(query), None).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError {
            kind: ApiErrorKind::Unknown,
            status: 0,
            message: e.to_string(),
            field: None,
        })?;
        self.request_json(Method::POST, path, None, Some(body)).await
    }

    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request_json(Method::POST, path, None, None).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError {
            kind: ApiErrorKind::Unknown,
            status: 0,
            message: e.to_string(),
            field: None,
        })?;
        self.request_json(Method::PUT, path, None, Some(body)).await
    }

    pub async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError {
            kind: ApiErrorKind::Unknown,
            status: 0,
            message: e.to_string(),
            field: None,
        })?;
        self.request_json(Method::PATCH, path, None, Some(body)).await
    }

    pub async fn patch_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request_json(Method::PATCH, path, None, None).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(Method::DELETE, path, None, None).await?;
        Ok(())
    }

    pub async fn delete_with_body<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError {
            kind: ApiErrorKind::Unknown,
            status: 0,
            message: e.to_string(),
            field: None,
        })?;
        self.execute(Method::DELETE, path, None, Some(body)).await?;
        Ok(())
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, &str)]>,
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        let response = self.execute(method, path, query, body).await?;
        response.json::<T>().await.map_err(|e| ApiError {
            kind: ApiErrorKind::Unknown,
            status: 0,
            message: format!("Malformed response body: {}", e),
            field: None,
        })
    }

    /// Sends one request, replaying it at most once after a successful token
    /// refresh. The retry flag is local to this call, never global.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, &str)]>,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut retried = false;
        loop {
            let mut request = self
                .http
                .request(method.clone(), format!("{}{}", self.base_url, path));
            if let Some(query) = query {
                request = request.query(query);
            }
            if let Some(token) = self.storage.get(TOKEN_KEY) {
                request = request.bearer_auth(token);
            }
            if let Some(body) = &body {
                request = request.json(body);
            }

            let response = request.send().await.map_err(|e| ApiError::network(&e))?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED && !retried {
                retried = true;
                if self.try_refresh().await {
                    continue;
                }
            }

            if status.is_success() {
                return Ok(response);
            }
            return Err(Self::normalize(response).await);
        }
    }

    /// One refresh attempt with the stored refresh token.
    ///
    /// Returns true when a new session token was stored and the original
    /// request should be replayed. A missing refresh token is not a session
    /// expiry; the 401 simply propagates. A failed refresh clears every auth
    /// artifact and announces the dead session.
    async fn try_refresh(&self) -> bool {
        let refresh_token = match self.storage.get(REFRESH_TOKEN_KEY) {
            Some(token) => token,
            None => return false,
        };

        let result = self
            .http
            .post(format!("{}/auth/refresh", self.base_url))
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<TokenResponse>().await {
                    Ok(body) => {
                        self.storage.set(TOKEN_KEY, &body.token);
                        true
                    }
                    Err(e) => {
                        log::warn!("malformed refresh response: {}", e);
                        self.expire_session();
                        false
                    }
                }
            }
            Ok(_) | Err(_) => {
                self.expire_session();
                false
            }
        }
    }

    /// Clears all persisted auth artifacts and tells subscribers to send the
    /// user back to the login entry point.
    fn expire_session(&self) {
        self.storage.remove(TOKEN_KEY);
        self.storage.remove(REFRESH_TOKEN_KEY);
        self.storage.remove(USER_KEY);
        self.events.emit(StoreEvent::SessionExpired);
    }

    async fn normalize(response: reqwest::Response) -> ApiError {
        let status = response.status();
        let body = response.json::<ErrorBody>().await.ok();
        let message = body
            .as_ref()
            .and_then(|b| b.message.clone())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Erro desconhecido")
                    .to_string()
            });
        let field = body.and_then(|b| b.field);
        ApiError::from_status(status, message, field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let cases = [
            (400, ApiErrorKind::Validation),
            (401, ApiErrorKind::Auth),
            (403, ApiErrorKind::Permission),
            (404, ApiErrorKind::NotFound),
            (500, ApiErrorKind::Server),
            (503, ApiErrorKind::Server),
            (418, ApiErrorKind::Unknown),
        ];
        for (status, kind) in cases {
            let error = ApiError::from_status(
                StatusCode::from_u16(status).unwrap(),
                "msg".into(),
                None,
            );
            assert_eq!(error.kind, kind, "status {}", status);
            assert_eq!(error.status, status);
        }
    }

    #[test]
    fn test_user_messages_by_kind() {
        let auth = ApiError::from_status(StatusCode::UNAUTHORIZED, "raw".into(), None);
        assert_eq!(auth.user_message(), "Sessão expirada. Faça login novamente.");

        let validation = ApiError::from_status(
            StatusCode::BAD_REQUEST,
            "Título é obrigatório".into(),
            Some("title".into()),
        );
        // Validation messages reach the user verbatim, with the field kept.
        assert_eq!(validation.user_message(), "Título é obrigatório");
        assert_eq!(validation.field.as_deref(), Some("title"));

        let network = ApiError {
            kind: ApiErrorKind::Network,
            status: 0,
            message: "connection refused".into(),
            field: None,
        };
        assert_eq!(
            network.user_message(),
            "Erro de conexão. Verifique sua internet e tente novamente."
        );
    }
}
