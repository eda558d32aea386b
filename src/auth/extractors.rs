use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::auth::token::Claims;
use crate::error::AppError;

/// Extracts the authenticated caller's claims from request extensions.
///
/// Only valid on routes behind `AuthMiddleware`, which verifies the bearer
/// token and stores the decoded `Claims`. If the claims are missing the
/// middleware did not run; respond 401 rather than guessing.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Claims);

impl AuthenticatedUser {
    pub fn user_id(&self) -> i32 {
        self.0.sub
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<Claims>().cloned() {
            Some(claims) => ready(Ok(AuthenticatedUser(claims))),
            None => {
                let err = AppError::Unauthorized("Missing authentication context".to_string());
                ready(Err(err.into()))
            }
        }
    }
}
