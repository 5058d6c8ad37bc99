use std::collections::BTreeMap;

use axum::{
    http,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

pub type WebResult<T> = std::result::Result<T, WebError>;

#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("Internal Server Error: {0}")]
    Internal(#[from] anyhow::Error),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Invalid input: {0}")]
    Validation(FieldErrors),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("{0}")]
    MissingAssociation(&'static str),
    #[error("no shopping list")]
    EmptyCart,
    #[error("Authentication error: {0}")]
    Unauthorized(String),
    #[error("You do not have permission to perform this action.")]
    Forbidden,
    #[error("Not found")]
    NotFound,
}

impl WebError {
    /// Shortcut for a validation failure on a single field.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::default();
        errors.add(field, message);
        WebError::Validation(errors)
    }
}

/// Per-field validation messages, rendered as `{"field": ["message", ...]}`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Fail with everything collected so far, if anything was collected.
    pub fn into_result(self) -> WebResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(WebError::Validation(self))
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (field, messages)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", field, messages.join(", "))?;
        }
        Ok(())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        // In development, we want to return the error message
        // In production, we want to return a generic error message
        let internal = |err: &dyn std::fmt::Display| {
            tracing::error!("{}", err);
            let detail = if cfg!(debug_assertions) {
                err.to_string()
            } else {
                "Internal Server Error".into()
            };
            (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": detail })),
            )
                .into_response()
        };
        match self {
            WebError::Internal(err) => internal(&err),
            WebError::Database(err) => internal(&err),
            WebError::Pool(err) => internal(&err),
            WebError::Validation(errors) => {
                (http::StatusCode::BAD_REQUEST, Json(errors)).into_response()
            }
            WebError::Conflict(msg) | WebError::MissingAssociation(msg) => {
                (http::StatusCode::BAD_REQUEST, Json(json!({ "errors": msg }))).into_response()
            }
            WebError::EmptyCart => (
                http::StatusCode::BAD_REQUEST,
                Json(json!({ "errors": self.to_string() })),
            )
                .into_response(),
            // Auth failures are always explained
            WebError::Unauthorized(msg) => {
                (http::StatusCode::UNAUTHORIZED, Json(json!({ "detail": msg }))).into_response()
            }
            WebError::Forbidden => (
                http::StatusCode::FORBIDDEN,
                Json(json!({ "detail": self.to_string() })),
            )
                .into_response(),
            WebError::NotFound => (
                http::StatusCode::NOT_FOUND,
                Json(json!({ "detail": "Not found." })),
            )
                .into_response(),
        }
    }
}

/// Whether a store error is a violated UNIQUE or PRIMARY KEY constraint.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}
