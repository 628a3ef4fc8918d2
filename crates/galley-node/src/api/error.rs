//! Mapping of engine errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use galley_core::GalleyError;
use serde::Serialize;

/// Error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

/// An engine error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub GalleyError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            GalleyError::NotFound { .. } => StatusCode::NOT_FOUND,
            GalleyError::Conflict { .. } => StatusCode::CONFLICT,
            GalleyError::Validation(_) | GalleyError::Serialization(_) => StatusCode::BAD_REQUEST,
            GalleyError::InvalidModification { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            GalleyError::OutOfStock { .. } => StatusCode::CONFLICT,
            GalleyError::InvalidTransition { .. } => StatusCode::CONFLICT,
            GalleyError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GalleyError> for ApiError {
    fn from(err: GalleyError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        let body = ErrorBody {
            error: self.0.kind(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Handler result type.
pub type ApiResult<T> = Result<T, ApiError>;
