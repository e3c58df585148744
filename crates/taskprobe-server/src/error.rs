//! ProbeError → HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use taskprobe_core::domain::{ErrorKind, ProbeError};

/// Error side of every handler. The body is the plain-text message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput | ErrorKind::Provenance => StatusCode::BAD_REQUEST,
        ErrorKind::Transport | ErrorKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ProbeError> for ApiError {
    fn from(error: ProbeError) -> Self {
        let status = status_for(error.kind());
        if status.is_server_error() {
            tracing::error!(kind = %error.kind(), error = %error, "request failed");
        } else {
            tracing::info!(kind = %error.kind(), error = %error, "request rejected");
        }
        Self::new(status, error.message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::InvalidInput, StatusCode::BAD_REQUEST)]
    #[case(ErrorKind::Provenance, StatusCode::BAD_REQUEST)]
    #[case(ErrorKind::Transport, StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(ErrorKind::Configuration, StatusCode::INTERNAL_SERVER_ERROR)]
    fn kinds_map_to_statuses(#[case] kind: ErrorKind, #[case] expected: StatusCode) {
        assert_eq!(status_for(kind), expected);
        let api: ApiError = ProbeError::new(kind, "boom").into();
        assert_eq!(api.status(), expected);
    }
}
