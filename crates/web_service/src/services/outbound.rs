//! Applies engine output to the Bot API

use dialogue_core::{Keyboard, Outbound};
use telegram_client::{InlineKeyboardButton, InlineKeyboardMarkup, TelegramApi};
use tracing::{debug, error, warn};

pub fn inline_keyboard(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: keyboard
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|button| InlineKeyboardButton::callback(&button.text, &button.payload))
                    .collect()
            })
            .collect(),
    }
}

/// Perform each effect in order. Failures are logged and never stop the
/// remaining effects.
///
/// A failed edit (message too old, deleted, unchanged) is retried as a new
/// message so the user still gets the prompt. Failed deletes and keyboard
/// clears are only logged.
pub async fn apply(telegram: &dyn TelegramApi, chat_id: i64, effects: Vec<Outbound>) {
    for effect in effects {
        match effect {
            Outbound::Send { text, keyboard } => {
                let markup = keyboard.as_ref().map(inline_keyboard);
                if let Err(e) = telegram.send_message(chat_id, &text, markup).await {
                    error!(chat_id, "Failed to send message: {}", e);
                }
            }
            Outbound::Edit {
                message_id,
                text,
                keyboard,
            } => {
                let markup = keyboard.as_ref().map(inline_keyboard);
                if let Err(e) = telegram
                    .edit_message_text(chat_id, message_id, &text, markup.clone())
                    .await
                {
                    warn!(chat_id, message_id, "Edit failed, sending new message: {}", e);
                    if let Err(e) = telegram.send_message(chat_id, &text, markup).await {
                        error!(chat_id, "Failed to send message: {}", e);
                    }
                }
            }
            Outbound::ClearKeyboard { message_id } => {
                if let Err(e) = telegram
                    .edit_message_reply_markup(chat_id, message_id, None)
                    .await
                {
                    debug!(chat_id, message_id, "Failed to clear keyboard: {}", e);
                }
            }
            Outbound::Delete { message_id } => {
                if let Err(e) = telegram.delete_message(chat_id, message_id).await {
                    debug!(chat_id, message_id, "Failed to delete message: {}", e);
                }
            }
        }
    }
}
