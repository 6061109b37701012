use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use footprints::FootprintError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Failure on its way out of a handler.
#[derive(Debug)]
pub enum ApiError {
    Pipeline(FootprintError),
    PayloadTooLarge(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        let err = match self {
            ApiError::Pipeline(err) => err,
            ApiError::PayloadTooLarge(_) => return StatusCode::PAYLOAD_TOO_LARGE,
        };
        match err {
            FootprintError::Validation(_) | FootprintError::NotFound(_) => StatusCode::BAD_REQUEST,
            FootprintError::RemoteUnavailable(_) | FootprintError::RemoteProcessingFailed { .. } => {
                StatusCode::BAD_GATEWAY
            }
            FootprintError::AcquisitionFailed(_)
            | FootprintError::Client(_)
            | FootprintError::Format(_)
            | FootprintError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FootprintError> for ApiError {
    fn from(err: FootprintError) -> Self {
        Self::Pipeline(err)
    }
}

/// Undecodable bodies are validation failures; oversized ones keep their 413.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(rejection.body_text())
        } else {
            Self::Pipeline(FootprintError::Validation(rejection.body_text()))
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Pipeline(err) => err.fmt(f),
            ApiError::PayloadTooLarge(message) => f.write_str(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, status = status.as_u16(), "Request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
