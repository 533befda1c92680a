// [apps/master/src/errors.rs]
//! Error surface for the Master: wraps persistence failures and adds the
//! control-plane errors (policy rejection, auth) that the HTTP layer needs
//! to turn into status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use neoscan_persistence::DbError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MasterError {
    #[error("database error: {0}")]
    Database(#[from] DbError),

    #[error("policy violation: {0}")]
    PolicyViolation(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("agent not found")]
    AgentNotFound,

    #[error("task not found")]
    TaskNotFound,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl IntoResponse for MasterError {
    fn into_response(self) -> Response {
        let status = match &self {
            MasterError::Database(DbError::ProjectNotFound)
            | MasterError::Database(DbError::WorkflowNotFound)
            | MasterError::Database(DbError::StageNotFound)
            | MasterError::Database(DbError::TaskNotFound)
            | MasterError::Database(DbError::AgentNotFound)
            | MasterError::AgentNotFound
            | MasterError::TaskNotFound => StatusCode::NOT_FOUND,
            MasterError::Database(DbError::RegistrationConflict(_))
            | MasterError::Database(DbError::ClaimConflict) => StatusCode::CONFLICT,
            MasterError::PolicyViolation(_) | MasterError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            MasterError::Unauthorized => StatusCode::UNAUTHORIZED,
            MasterError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
