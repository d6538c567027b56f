use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The Bot API answered `ok: false`.
    #[error("Bot API error: {description}")]
    Api {
        code: Option<i64>,
        description: String,
    },

    #[error("failed to decode Bot API response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl TelegramError {
    pub fn api(description: impl Into<String>) -> Self {
        Self::Api {
            code: None,
            description: description.into(),
        }
    }
}

pub type Result<T, E = TelegramError> = std::result::Result<T, E>;
