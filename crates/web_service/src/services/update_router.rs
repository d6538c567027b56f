//! Bot API update → engine event

use std::sync::Arc;
use std::time::Instant;

use dialogue_core::{Action, CallbackPayload, DialogueEngine, InboundEvent, UserIdentity};
use telegram_client::{CallbackQuery, Message, TelegramApi, Update, User};
use tracing::{debug, warn};

use super::outbound;

/// Command word of a text message: `/start@my_bot payload` → `/start`.
fn command(text: &str) -> Option<&str> {
    let word = text.split_whitespace().next()?;
    if !word.starts_with('/') {
        return None;
    }
    Some(word.split('@').next().unwrap_or(word))
}

pub fn text_action(text: Option<&str>) -> Action {
    match text.and_then(command) {
        Some("/start") => Action::Start,
        Some("/help") => Action::Help,
        _ => Action::Text,
    }
}

fn identity(user: &User) -> UserIdentity {
    UserIdentity::new(user.id, user.username.clone())
}

pub struct UpdateRouter {
    engine: Arc<DialogueEngine>,
    telegram: Arc<dyn TelegramApi>,
}

impl UpdateRouter {
    pub fn new(engine: Arc<DialogueEngine>, telegram: Arc<dyn TelegramApi>) -> Self {
        Self { engine, telegram }
    }

    pub async fn route(&self, update: Update) {
        if let Some(callback) = update.callback_query {
            self.on_callback(callback).await;
        } else if let Some(message) = update.message {
            self.on_message(message).await;
        } else {
            debug!(update_id = update.update_id, "Ignoring update without message or callback");
        }
    }

    async fn on_message(&self, message: Message) {
        let Some(user) = message.from.as_ref() else {
            debug!(chat_id = message.chat.id, "Ignoring message without sender");
            return;
        };

        let event = InboundEvent::new(identity(user), text_action(message.text.as_deref()));
        let effects = self.engine.handle(event).await;
        outbound::apply(self.telegram.as_ref(), message.chat.id, effects).await;
    }

    async fn on_callback(&self, callback: CallbackQuery) {
        // clear the button spinner before any slow work
        if let Err(e) = self.telegram.answer_callback_query(&callback.id).await {
            warn!(user_id = callback.from.id, "Failed to answer callback query: {}", e);
        }

        let data = callback.data.as_deref().unwrap_or_default();
        let Some(payload) = CallbackPayload::parse(data) else {
            warn!(user_id = callback.from.id, data, "Ignoring unparseable callback data");
            return;
        };

        let chat_id = callback
            .message
            .as_ref()
            .map(|message| message.chat.id)
            .unwrap_or(callback.from.id);

        let mut event = InboundEvent::new(identity(&callback.from), Action::from(payload));
        if let Some(message) = &callback.message {
            event = event.with_source(message.message_id, message.text.clone());
        }

        let started = Instant::now();
        let effects = self.engine.handle(event).await;
        debug!(
            user_id = callback.from.id,
            data,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Callback handled"
        );

        outbound::apply(self.telegram.as_ref(), chat_id, effects).await;
    }
}
