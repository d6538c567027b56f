use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} rejected request with status {status}: {body}")]
    Rejected {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("queue store error: {0}")]
    Queue(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = SchedulerError> = std::result::Result<T, E>;
