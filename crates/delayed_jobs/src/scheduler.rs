//! Strategy chain for delayed messages

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dialogue_core::{FollowUp, FollowUpScheduler};
use tracing::{error, info, warn};

use crate::error::Result;

/// One way of getting a message delivered later.
#[async_trait]
pub trait DeliveryStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Hand the job off. Success means the job is durably accepted, not
    /// delivered.
    async fn submit(
        &self,
        user_id: i64,
        message: &str,
        options: Option<&[String]>,
        delay: Duration,
    ) -> Result<()>;
}

/// Tries each configured strategy in order until one accepts the job.
///
/// Not transactional: a push that times out after being accepted upstream and
/// then also lands in the queue is delivered twice.
#[derive(Default)]
pub struct FallbackScheduler {
    strategies: Vec<Arc<dyn DeliveryStrategy>>,
}

impl FallbackScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn DeliveryStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.strategies.is_empty()
    }

    /// The scheduler as an engine port, `None` when no strategy is set up so
    /// the engine keeps its prompts inline.
    pub fn into_follow_up(self) -> Option<Arc<dyn FollowUpScheduler>> {
        self.is_configured()
            .then(|| Arc::new(self) as Arc<dyn FollowUpScheduler>)
    }

    /// Returns the name of the strategy that took the job, `None` if the job
    /// was dropped.
    pub async fn schedule_delayed_message(
        &self,
        user_id: i64,
        message: &str,
        options: Option<&[String]>,
        delay: Duration,
    ) -> Option<&'static str> {
        if self.strategies.is_empty() {
            warn!(user_id, "No delayed-delivery strategy configured; delayed message dropped");
            return None;
        }

        for strategy in &self.strategies {
            match strategy.submit(user_id, message, options, delay).await {
                Ok(()) => {
                    info!(user_id, strategy = strategy.name(), delay_secs = delay.as_secs(), "Delayed message scheduled");
                    return Some(strategy.name());
                }
                Err(err) => {
                    warn!(user_id, strategy = strategy.name(), "Scheduling failed, trying next strategy: {}", err);
                }
            }
        }

        error!(user_id, "All delayed-delivery strategies failed; delayed message dropped");
        None
    }
}

#[async_trait]
impl FollowUpScheduler for FallbackScheduler {
    async fn schedule(&self, follow_up: FollowUp) {
        self.schedule_delayed_message(
            follow_up.user_id,
            &follow_up.message,
            follow_up.options.as_deref(),
            follow_up.delay,
        )
        .await;
    }
}
