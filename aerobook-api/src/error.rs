use aerobook_core::CoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    InternalServerError(String),
    Core(CoreError),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::AuthenticationError(_) => "UNAUTHORIZED",
            AppError::AuthorizationError(_) => "FORBIDDEN",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::InternalServerError(_) => "INTERNAL",
            AppError::Core(e) => e.kind(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            AppError::AuthorizationError(_) => StatusCode::FORBIDDEN,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Core(e) => match e {
                CoreError::SeatUnavailable(_) => StatusCode::CONFLICT,
                CoreError::HoldExpired(_) => StatusCode::GONE,
                CoreError::ValidationError(_) => StatusCode::BAD_REQUEST,
                CoreError::Conflict(_) => StatusCode::CONFLICT,
                CoreError::AlreadyCancelled(_) => StatusCode::CONFLICT,
                CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let error_message = match self {
            AppError::AuthenticationError(msg)
            | AppError::AuthorizationError(msg)
            | AppError::ValidationError(msg) => msg,
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::Core(CoreError::Storage(msg)) => {
                tracing::error!("Storage failure: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::Core(err) => err.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}
