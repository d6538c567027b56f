use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::client_trait::TelegramApi;
use crate::error::{Result, TelegramError};
use crate::types::{ApiResponse, InlineKeyboardMarkup, Message};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_base: String,
    pub token: String,
}

impl TelegramConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.into(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct EditMessageText<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct EditMessageReplyMarkup {
    chat_id: i64,
    message_id: i64,
    reply_markup: InlineKeyboardMarkup,
}

#[derive(Serialize)]
struct DeleteMessage {
    chat_id: i64,
    message_id: i64,
}

#[derive(Serialize)]
struct AnswerCallbackQuery<'a> {
    callback_query_id: &'a str,
}

/// Bot API client over a shared `reqwest::Client`. Every call is a single
/// attempt.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    config: TelegramConfig,
}

impl TelegramClient {
    pub fn new(client: Client, config: TelegramConfig) -> Self {
        Self { client, config }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.token,
            method
        )
    }

    // The URL carries the token, so only the method name is logged.
    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        debug!(method, "Bot API call");
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| e.without_url())?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| e.without_url())?;

        let envelope: ApiResponse<T> = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(err) if status.is_success() => return Err(err.into()),
            Err(_) => {
                return Err(TelegramError::Api {
                    code: Some(i64::from(status.as_u16())),
                    description: status.to_string(),
                })
            }
        };

        if !envelope.ok {
            let description = envelope
                .description
                .unwrap_or_else(|| "no description".to_string());
            warn!(method, "Bot API returned error: {}", description);
            return Err(TelegramError::Api {
                code: envelope.error_code,
                description,
            });
        }

        envelope
            .result
            .ok_or_else(|| TelegramError::api(format!("{} returned no result", method)))
    }
}

#[async_trait]
impl TelegramApi for TelegramClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<Message> {
        self.call(
            "sendMessage",
            &SendMessage {
                chat_id,
                text,
                reply_markup,
            },
        )
        .await
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        // result is the edited Message or `true`; neither is needed
        let _: serde_json::Value = self
            .call(
                "editMessageText",
                &EditMessageText {
                    chat_id,
                    message_id,
                    text,
                    reply_markup,
                },
            )
            .await?;
        Ok(())
    }

    async fn edit_message_reply_markup(
        &self,
        chat_id: i64,
        message_id: i64,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "editMessageReplyMarkup",
                &EditMessageReplyMarkup {
                    chat_id,
                    message_id,
                    reply_markup: reply_markup.unwrap_or_default(),
                },
            )
            .await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        let _: bool = self
            .call(
                "deleteMessage",
                &DeleteMessage {
                    chat_id,
                    message_id,
                },
            )
            .await?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                &AnswerCallbackQuery { callback_query_id },
            )
            .await?;
        Ok(())
    }
}
