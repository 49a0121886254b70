//! Per-request routing errors.

use axum::http::StatusCode;

/// Why a request did not produce a metadata value. Each variant maps to one
/// HTTP status and stays isolated to its request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("not found")]
    NotFound,

    /// Missing, unknown or expired session token. The reason is logged,
    /// never sent to the client.
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("forbidden")]
    Forbidden,

    #[error("method not allowed")]
    MethodNotAllowed,

    /// Injected fault. Without a body the standard error page is sent.
    #[error("forced status {status}")]
    Forced {
        status: StatusCode,
        body: Option<String>,
    },
}

impl RouteError {
    pub fn status(&self) -> StatusCode {
        match self {
            RouteError::NotFound => StatusCode::NOT_FOUND,
            RouteError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            RouteError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RouteError::Forbidden => StatusCode::FORBIDDEN,
            RouteError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RouteError::Forced { status, .. } => *status,
        }
    }
}
