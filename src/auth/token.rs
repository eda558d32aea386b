use crate::error::AppError;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Session tokens expire after 24 hours; there is no revocation list, so
/// expiry is the only server-enforced bound.
const TOKEN_TTL_HOURS: i64 = 24;

/// Claims encoded in a session token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id.
    pub sub: i32,
    /// Email at issuance time; informational, the user row stays canonical.
    pub email: String,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: usize,
    /// Expiration timestamp (seconds since epoch).
    pub exp: usize,
}

fn secret() -> Result<String, AppError> {
    std::env::var("JWT_SECRET").map_err(|_| AppError::Internal("JWT_SECRET not set".into()))
}

/// Signs a 24h session token for the given user.
pub fn generate_token(user_id: i32, email: &str) -> Result<String, AppError> {
    let now = chrono::Utc::now();
    let expiration = now
        .checked_add_signed(chrono::Duration::hours(TOKEN_TTL_HOURS))
        .expect("valid timestamp")
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        iat: now.timestamp() as usize,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret()?.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
}

/// Verifies a token's signature and expiry and returns its claims.
pub fn verify_token(token: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret()?.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
}
