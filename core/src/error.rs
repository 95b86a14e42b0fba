//! Error types for the HIL client.
//!
//! # Design
//! The service reports failures purely through status codes, and the same
//! code can mean different things depending on the operation (409 is
//! "already exists" for `add_nic` but "still in use" for `remove_nic`). The
//! per-operation translation lives in `client::Operation`; this module only
//! defines the resulting taxonomy. Each domain variant carries a
//! human-readable message combining the operation's hint with the server's
//! own `msg`, when it sent one.

use std::fmt;

use thiserror::Error;

/// Domain error classes the service can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authentication,
    NotFound,
    Duplicate,
    Blocked,
    ProjectMismatch,
    Server,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Authentication => "Authentication",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Duplicate => "Duplicate",
            ErrorKind::Blocked => "Blocked",
            ErrorKind::ProjectMismatch => "ProjectMismatch",
            ErrorKind::Server => "Server",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors returned by `HilClient` parse methods and `Session` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 401: credentials rejected by the configured auth backend.
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The resource or relationship already exists.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// A conflicting operation is pending, or the resource is still in use.
    #[error("blocked: {0}")]
    Blocked(String),

    /// The caller's project has no access to one of the resources involved.
    #[error("project mismatch: {0}")]
    ProjectMismatch(String),

    /// 500: the service failed internally (e.g. the OBM could not be reached).
    #[error("server error: {0}")]
    Server(String),

    /// A non-2xx status the operation has no mapping for.
    #[error("unexpected HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    /// No response was received.
    #[error("transport failed: {0}")]
    Transport(String),
}

impl ApiError {
    pub(crate) fn from_kind(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::Authentication => ApiError::Authentication(message),
            ErrorKind::NotFound => ApiError::NotFound(message),
            ErrorKind::Duplicate => ApiError::Duplicate(message),
            ErrorKind::Blocked => ApiError::Blocked(message),
            ErrorKind::ProjectMismatch => ApiError::ProjectMismatch(message),
            ErrorKind::Server => ApiError::Server(message),
        }
    }

    /// The domain class of this error, if it came from a mapped status code.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ApiError::Authentication(_) => Some(ErrorKind::Authentication),
            ApiError::NotFound(_) => Some(ErrorKind::NotFound),
            ApiError::Duplicate(_) => Some(ErrorKind::Duplicate),
            ApiError::Blocked(_) => Some(ErrorKind::Blocked),
            ApiError::ProjectMismatch(_) => Some(ErrorKind::ProjectMismatch),
            ApiError::Server(_) => Some(ErrorKind::Server),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_kind_and_kind_agree() {
        let kinds = [
            ErrorKind::Authentication,
            ErrorKind::NotFound,
            ErrorKind::Duplicate,
            ErrorKind::Blocked,
            ErrorKind::ProjectMismatch,
            ErrorKind::Server,
        ];
        for kind in kinds {
            let err = ApiError::from_kind(kind, "msg".to_string());
            assert_eq!(err.kind(), Some(kind));
        }
    }

    #[test]
    fn client_side_errors_have_no_kind() {
        assert_eq!(ApiError::Transport("refused".into()).kind(), None);
        let err = ApiError::UnexpectedStatus {
            status: 418,
            body: String::new(),
        };
        assert_eq!(err.kind(), None);
    }

    #[test]
    fn display_includes_message() {
        let err = ApiError::Blocked("Operation blocked by other pending operations".into());
        assert_eq!(
            err.to_string(),
            "blocked: Operation blocked by other pending operations"
        );
    }
}
