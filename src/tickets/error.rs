use axum::extract::rejection::JsonRejection;
use axum::{response::IntoResponse, Json};
use serde::Serialize;
use std::collections::BTreeMap;

pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Per-field validation messages, keyed by request field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

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

    /// `Ok(value)` when nothing was recorded, otherwise a validation error.
    pub fn into_result<T>(self, value: T) -> Result<T, TicketsError> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(TicketsError::Validation(self))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TicketsError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error")]
    Validation(FieldErrors),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<diesel::result::Error> for TicketsError {
    fn from(e: diesel::result::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<diesel::r2d2::PoolError> for TicketsError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        Self::Database(e.to_string())
    }
}

/// Body-level problems (malformed JSON, wrong field types) are reported
/// under `non_field_errors`.
impl From<JsonRejection> for TicketsError {
    fn from(rejection: JsonRejection) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(NON_FIELD_ERRORS, rejection.body_text());
        Self::Validation(errors)
    }
}

impl IntoResponse for TicketsError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        match self {
            Self::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": msg })),
            )
                .into_response(),
            Self::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "Validation error", "fields": fields })),
            )
                .into_response(),
            Self::Database(msg) | Self::Internal(msg) => {
                log::error!("Ticket request failed: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": msg })),
                )
                    .into_response()
            }
        }
    }
}
