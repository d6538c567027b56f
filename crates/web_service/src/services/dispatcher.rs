use std::sync::Arc;

use async_trait::async_trait;
use delayed_jobs::JobDispatcher;
use dialogue_core::Keyboard;
use telegram_client::TelegramApi;
use tracing::info;

use super::outbound::inline_keyboard;

/// Sends due follow-ups straight to the user's private chat.
///
/// Option buttons carry `postfinal__<i>`; the branch is recovered from the
/// message text when one is tapped.
pub struct TelegramDispatcher {
    telegram: Arc<dyn TelegramApi>,
}

impl TelegramDispatcher {
    pub fn new(telegram: Arc<dyn TelegramApi>) -> Self {
        Self { telegram }
    }
}

#[async_trait]
impl JobDispatcher for TelegramDispatcher {
    async fn dispatch(
        &self,
        user_id: i64,
        message: &str,
        options: Option<&[String]>,
    ) -> anyhow::Result<()> {
        let markup = options
            .filter(|options| !options.is_empty())
            .map(|options| inline_keyboard(&Keyboard::follow_up(options)));

        self.telegram.send_message(user_id, message, markup).await?;
        info!(user_id, "Delayed message delivered");
        Ok(())
    }
}
