use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures the service reports, each tied to one status code.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServerError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Duplicate(String),

    /// Resource still in use or owned elsewhere.
    #[error("{0}")]
    Blocked(String),

    #[error("{0}")]
    ProjectMismatch(String),

    /// A networking action is already queued on the nic.
    #[error("{0}")]
    Locked(String),

    #[error("{0}")]
    BadArgument(String),

    #[error("{0}")]
    Obm(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Duplicate(_) | ServerError::Blocked(_) => StatusCode::CONFLICT,
            ServerError::ProjectMismatch(_) => StatusCode::PRECONDITION_FAILED,
            ServerError::Locked(_) => StatusCode::LOCKED,
            ServerError::BadArgument(_) => StatusCode::BAD_REQUEST,
            ServerError::Obm(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ServerError::NotFound(_) => "NotFoundError",
            ServerError::Duplicate(_) => "DuplicateError",
            ServerError::Blocked(_) => "BlockedError",
            ServerError::ProjectMismatch(_) => "ProjectMismatchError",
            ServerError::Locked(_) => "BlockedError",
            ServerError::BadArgument(_) => "BadArgumentError",
            ServerError::Obm(_) => "OBMError",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(%status, error = %self, "request rejected");
        let body = json!({ "type": self.type_name(), "msg": self.to_string() });
        (status, Json(body)).into_response()
    }
}
