use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Delayed-job queue is not configured")]
    QueueUnavailable,

    #[error("Queue error: {0}")]
    Queue(#[from] delayed_jobs::SchedulerError),

    #[error("Bot API error: {0}")]
    Telegram(#[from] telegram_client::TelegramError),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct JsonError {
    ok: bool,
    error: String,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::QueueUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Queue(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Telegram(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(JsonError {
            ok: false,
            error: self.to_string(),
        })
    }
}
