use std::collections::BTreeMap;

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::policy::PolicyError;

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";
/// Postgres SQLSTATE for `foreign_key_violation`.
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid credential on a path that requires one.
    #[error("{0}")]
    Unauthorized(String),

    /// Malformed payload: bad JSON, wrong field types, out-of-range values.
    #[error("{message}")]
    Validation {
        message: String,
        field_errors: BTreeMap<String, String>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// The IoT relay did not answer successfully. Never retried.
    #[error("{0}")]
    UpstreamUnavailable(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_authenticated() -> Self {
        Self::Unauthorized(PolicyError::Unauthorized.to_string())
    }

    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Validation { .. } => "VALIDATION_FAILED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Internal(e) => {
                error!(error = ?e, "Request failed");
                json!({ "error": "internal server error", "code": self.code() })
            }
            AppError::Validation { message, field_errors } => {
                let mut body = json!({ "error": message, "code": self.code() });
                if !field_errors.is_empty() {
                    body["field_errors"] = json!(field_errors);
                }
                body
            }
            AppError::UpstreamUnavailable(msg) => {
                warn!(error = %msg, "Relay unavailable");
                json!({ "error": msg, "code": self.code() })
            }
            other => json!({ "error": other.to_string(), "code": other.code() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<PolicyError> for AppError {
    fn from(e: PolicyError) -> Self {
        match e {
            PolicyError::Unauthorized => AppError::Unauthorized(e.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation {
            message: rejection.body_text(),
            field_errors: BTreeMap::new(),
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation {
            message: rejection.body_text(),
            field_errors: BTreeMap::new(),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation {
            message: rejection.body_text(),
            field_errors: BTreeMap::new(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = e {
            return AppError::NotFound("record not found".to_owned());
        }
        if let Some(db) = e.as_database_error() {
            match db.code().as_deref() {
                Some(UNIQUE_VIOLATION) => {
                    return AppError::Conflict("a record with these values already exists".to_owned())
                }
                Some(FOREIGN_KEY_VIOLATION) => {
                    return AppError::Conflict("referenced record does not exist".to_owned())
                }
                _ => {}
            }
        }
        AppError::Internal(e.into())
    }
}

// ---------------------------------------------------------------------------
// Field validation
// ---------------------------------------------------------------------------

/// Collects per-field validation messages for a request payload.
#[derive(Debug, Default)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_owned()).or_insert_with(|| message.into());
    }

    /// Add `message` for `field` when `failed` holds.
    pub fn check(&mut self, failed: bool, field: &str, message: &str) {
        if failed {
            self.add(field, message);
        }
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.0.is_empty() {
            return Ok(());
        }
        Err(AppError::Validation {
            message: "request payload failed validation".to_owned(),
            field_errors: self.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        assert_eq!(AppError::not_authenticated().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::not_found("pump control").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::UpstreamUnavailable("down".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn policy_error_becomes_unauthorized() {
        let err = AppError::from(PolicyError::Unauthorized);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[test]
    fn row_not_found_becomes_not_found() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn field_errors_keep_first_message_per_field() {
        let mut errors = FieldErrors::new();
        errors.add("soil_moisture", "must be between 0 and 100");
        errors.add("soil_moisture", "second message");
        errors.check(false, "temperature", "never added");

        match errors.into_result().unwrap_err() {
            AppError::Validation { field_errors, .. } => {
                assert_eq!(field_errors.len(), 1);
                assert_eq!(field_errors["soil_moisture"], "must be between 0 and 100");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_field_errors_pass() {
        assert!(FieldErrors::new().into_result().is_ok());
    }

    #[test]
    fn internal_errors_hide_details() {
        let resp = AppError::Internal(anyhow::anyhow!("password=hunter2")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
