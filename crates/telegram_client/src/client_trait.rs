use async_trait::async_trait;

use crate::error::Result;
use crate::types::{InlineKeyboardMarkup, Message};

/// The subset of Bot API methods the bot uses.
#[async_trait]
pub trait TelegramApi: Send + Sync {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<Message>;

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<()>;

    /// `None` removes the keyboard.
    async fn edit_message_reply_markup(
        &self,
        chat_id: i64,
        message_id: i64,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<()>;

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()>;

    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()>;
}
