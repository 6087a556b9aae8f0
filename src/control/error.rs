//! Control surface error type and its JSON payload.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::{LaunchError, RegistryError};

/// Error body: `{"code": "...", "message": "..."}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// Stable snake_case identifier.
    pub code: &'static str,
    /// Human readable message.
    pub message: String,
}

/// Errors returned by control handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request was malformed.
    #[error("{message}")]
    BadRequest {
        /// Human readable message.
        message: String,
    },
    /// Nothing is running under the requested key.
    #[error("{message}")]
    NotFound {
        /// Stable code.
        code: &'static str,
        /// Human readable message.
        message: String,
    },
    /// Something is already running under the requested key.
    #[error("{message}")]
    Conflict {
        /// Stable code.
        code: &'static str,
        /// Human readable message.
        message: String,
    },
    /// The service cannot take the request right now (missing tool, shutting down).
    #[error("{message}")]
    ServiceUnavailable {
        /// Stable code.
        code: &'static str,
        /// Human readable message.
        message: String,
    },
    /// The worker failed to start; the message carries its diagnostics.
    #[error("{message}")]
    Internal {
        /// Stable code.
        code: &'static str,
        /// Human readable message.
        message: String,
    },
}

impl ApiError {
    /// Shorthand for [`ApiError::BadRequest`].
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
        }
    }

    fn to_status_and_body(&self) -> (StatusCode, ErrorBody) {
        let (status, code, message) = match self {
            ApiError::BadRequest { message } => (StatusCode::BAD_REQUEST, "bad_request", message),
            ApiError::NotFound { code, message } => (StatusCode::NOT_FOUND, *code, message),
            ApiError::Conflict { code, message } => (StatusCode::CONFLICT, *code, message),
            ApiError::ServiceUnavailable { code, message } => {
                (StatusCode::SERVICE_UNAVAILABLE, *code, message)
            }
            ApiError::Internal { code, message } => {
                (StatusCode::INTERNAL_SERVER_ERROR, *code, message)
            }
        };
        (
            status,
            ErrorBody {
                code,
                message: message.clone(),
            },
        )
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        let code = e.as_label();
        let message = e.to_string();
        match e {
            RegistryError::AlreadyActive { .. } => ApiError::Conflict { code, message },
            RegistryError::NotFound { .. } => ApiError::NotFound { code, message },
            RegistryError::ShuttingDown => ApiError::ServiceUnavailable { code, message },
            RegistryError::Launch { source, .. } => match source {
                LaunchError::Unavailable { .. } => ApiError::ServiceUnavailable {
                    code: source.as_label(),
                    message,
                },
                _ => ApiError::Internal {
                    code: source.as_label(),
                    message,
                },
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.to_status_and_body();
        if status.is_server_error() {
            tracing::error!(code = body.code, message = %body.message, "request failed");
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_errors_map_to_http_statuses() {
        let cases = [
            (
                RegistryError::AlreadyActive { key: "a".into() },
                StatusCode::CONFLICT,
                "worker_already_active",
            ),
            (
                RegistryError::NotFound { key: "a".into() },
                StatusCode::NOT_FOUND,
                "worker_not_found",
            ),
            (
                RegistryError::Launch {
                    key: "a".into(),
                    source: LaunchError::Unavailable {
                        program: "ffmpeg".into(),
                    },
                },
                StatusCode::SERVICE_UNAVAILABLE,
                "launch_unavailable",
            ),
            (
                RegistryError::Launch {
                    key: "a".into(),
                    source: LaunchError::ExitedEarly {
                        code: Some(1),
                        diagnostics: "401 Unauthorized".into(),
                    },
                },
                StatusCode::INTERNAL_SERVER_ERROR,
                "launch_exited_early",
            ),
            (
                RegistryError::ShuttingDown,
                StatusCode::SERVICE_UNAVAILABLE,
                "supervisor_shutting_down",
            ),
        ];

        for (err, status, code) in cases {
            let (got_status, body) = ApiError::from(err).to_status_and_body();
            assert_eq!(got_status, status);
            assert_eq!(body.code, code);
        }
    }
}
