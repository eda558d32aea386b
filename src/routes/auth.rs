use crate::{
    auth::{
        generate_token, hash_password, verify_password, verify_token, AuthResponse,
        AuthenticatedUser, RefreshRequest, TokenResponse, VerifyResponse,
    },
    error::AppError,
    models::{LoginRequest, RegisterRequest, User},
};
use actix_web::{get, post, web, HttpResponse, Responder};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

/// Row shape for credential checks; the hash never leaves this module.
#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: i32,
    name: String,
    email: String,
    created_at: chrono::DateTime<chrono::Utc>,
    password_hash: String,
}

impl CredentialRow {
    fn into_user(self) -> User {
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            created_at: self.created_at,
        }
    }
}

/// Creates a user account and signs them in.
///
/// Fails with 409 when the email already has an account. The password is
/// stored as a bcrypt hash and never logged or echoed back.
#[post("/register")]
pub async fn register(
    pool: web::Data<PgPool>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    register_data.validate()?;

    let existing: Option<i32> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
        .bind(&register_data.email)
        .fetch_optional(&**pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password(&register_data.password)?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) \
         RETURNING id, name, email, created_at",
    )
    .bind(&register_data.name)
    .bind(&register_data.email)
    .bind(&password_hash)
    .fetch_one(&**pool)
    .await?;

    log::info!("registered user {} ({})", user.id, user.email);

    let token = generate_token(user.id, &user.email)?;

    Ok(HttpResponse::Created().json(AuthResponse { user, token }))
}

/// Authenticates by email and password.
///
/// Unknown email and wrong password produce the same generic 401 so the
/// response does not reveal whether an account exists.
#[post("/login")]
pub async fn login(
    pool: web::Data<PgPool>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    login_data.validate()?;

    let row = sqlx::query_as::<_, CredentialRow>(
        "SELECT id, name, email, created_at, password_hash FROM users WHERE email = $1",
    )
    .bind(&login_data.email)
    .fetch_optional(&**pool)
    .await?;

    let row = match row {
        Some(row) => row,
        None => return Err(AppError::Unauthorized("Credenciais inválidas".into())),
    };

    if !verify_password(&login_data.password, &row.password_hash)? {
        return Err(AppError::Unauthorized("Credenciais inválidas".into()));
    }

    let user = row.into_user();
    let token = generate_token(user.id, &user.email)?;

    Ok(HttpResponse::Ok().json(AuthResponse { user, token }))
}

/// Acknowledges a client-side logout.
///
/// There is no revocation list; token expiry is the only server-enforced
/// bound. The endpoint exists so clients can fire a best-effort notify.
#[post("/logout")]
pub async fn logout() -> impl Responder {
    HttpResponse::Ok().json(json!({ "message": "Logged out" }))
}

/// Exchanges a valid refresh token for a fresh session token.
#[post("/refresh")]
pub async fn refresh(refresh_data: web::Json<RefreshRequest>) -> Result<impl Responder, AppError> {
    let claims = verify_token(&refresh_data.refresh_token)?;
    let token = generate_token(claims.sub, &claims.email)?;
    Ok(HttpResponse::Ok().json(TokenResponse { token }))
}

/// Confirms the bearer token and returns the canonical user row.
///
/// Clients use this on startup to replace a locally cached user with the
/// server's current view.
#[get("/verify")]
pub async fn verify(
    pool: web::Data<PgPool>,
    caller: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, name, email, created_at FROM users WHERE id = $1",
    )
    .bind(caller.user_id())
    .fetch_optional(&**pool)
    .await?;

    match user {
        Some(user) => Ok(HttpResponse::Ok().json(VerifyResponse { user })),
        // Token is valid but the account is gone; treat as a dead session.
        None => Err(AppError::Unauthorized("Account no longer exists".into())),
    }
}
