//! Bearer-token authentication.
//!
//! A request either carries no `Authorization` header (anonymous) or a signed
//! access token that must resolve to an existing, active account. A credential
//! that is present but unusable is an error, never a silent downgrade to
//! anonymous.

pub mod password;
pub mod token;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderValue},
};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use self::token::{JwtKeys, TokenKind};
use crate::{
    api::errors::AppError,
    db::models::{User, UserRole},
    users::service::UserService,
};

/// An authenticated account as seen by the access policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub role: UserRole,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}

/// The resolved caller of a request: `None` when no credential was presented.
#[derive(Debug, Clone, Default)]
pub struct Caller(pub Option<Identity>);

impl Caller {
    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref()
    }

    /// The identity, or `Unauthorized` for anonymous callers.
    pub fn require(self) -> Result<Identity, AppError> {
        self.0.ok_or_else(AppError::not_authenticated)
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
    PgPool: FromRef<S>,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Caller(None));
        };

        let token = bearer_token(header).map_err(AppError::Unauthorized)?;
        let claims = JwtKeys::from_ref(state)
            .verify(token, TokenKind::Access)
            .map_err(|e| AppError::Unauthorized(e.to_string()))?;

        let user = UserService::new(PgPool::from_ref(state))
            .find_active(claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("user not found or inactive".to_owned()))?;

        debug!(user_id = %user.id, username = %user.username, "Resolved caller");
        Ok(Caller(Some(Identity::from(&user))))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
fn bearer_token(header: &HeaderValue) -> Result<&str, String> {
    let value = header
        .to_str()
        .map_err(|_| "invalid Authorization header encoding".to_owned())?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| "Authorization header must use the Bearer scheme".to_owned())?
        .trim();

    if token.is_empty() {
        return Err("empty bearer token".to_owned());
    }
    Ok(token)
}
