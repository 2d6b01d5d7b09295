use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("{0}")]
    Unsupported(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Serialize(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            // The tree endpoint's wire contract fixes the unsupported shape
            // as {"message": ...} with status 501.
            AppError::Unsupported(_) => HttpResponse::build(self.status_code())
                .json(serde_json::json!({ "message": self.to_string() })),
            _ => HttpResponse::build(self.status_code()).json(serde_json::json!({
                "error": self.to_string()
            })),
        }
    }
}
