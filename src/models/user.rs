use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A registered account, as stored and as returned over the wire.
/// The password hash lives only in the `users` table and is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Registration payload.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Display name, at least 2 characters.
    #[validate(length(min = 2, max = 100, message = "Name must be at least 2 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    /// Never logged or echoed back.
    #[validate(length(min = 6, max = 100, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Login payload.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}
