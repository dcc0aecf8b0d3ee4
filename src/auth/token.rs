use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::Identity;
use crate::{config::Config, db::models::UserRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: user id.
    pub sub: Uuid,
    pub username: String,
    pub role: UserRole,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is not an {0:?} token")]
    WrongKind(TokenKind),
    #[error("invalid token: {0}")]
    Invalid(String),
}

/// Signing material and lifetimes for the access/refresh token pair.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

impl JwtKeys {
    pub fn new(secret: &str, access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            config.jwt_access_ttl_secs,
            config.jwt_refresh_ttl_secs,
        )
    }

    pub fn issue_pair(&self, identity: &Identity) -> Result<TokenPair> {
        Ok(TokenPair {
            access: self.issue(identity, TokenKind::Access)?,
            refresh: self.issue(identity, TokenKind::Refresh)?,
        })
    }

    pub fn issue(&self, identity: &Identity, kind: TokenKind) -> Result<String> {
        let now = Utc::now();
        let ttl_secs = match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        };
        let expires = i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .with_context(|| format!("{kind:?} token lifetime of {ttl_secs}s is out of range"))?;
        let claims = Claims {
            sub: identity.id,
            username: identity.username.clone(),
            role: identity.role,
            kind,
            iat: now.timestamp(),
            exp: expires.timestamp(),
            jti: Uuid::new_v4(),
        };
        self.encode(&claims)
    }

    fn encode(&self, claims: &Claims) -> Result<String> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .context("failed to sign token")
    }

    /// Check signature, expiry and kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })?;

        if data.claims.kind != expected {
            return Err(TokenError::WrongKind(expected));
        }
        Ok(data.claims)
    }
}
