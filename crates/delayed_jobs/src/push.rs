//! Push-schedule strategy
//!
//! Publishes the job to an at-least-once delayed-delivery service
//! (QStash-compatible `POST /v2/publish/<destination>`). The service calls
//! `destination` with the JSON body once the `Upstash-Delay` has passed.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::{Result, SchedulerError};
use crate::job::DispatchRequest;
use crate::scheduler::DeliveryStrategy;

pub const DEFAULT_PUSH_BASE_URL: &str = "https://qstash.upstash.io";

#[derive(Debug, Clone)]
pub struct PushConfig {
    pub base_url: String,
    pub token: String,
    /// Callback the service hits when the job is due, usually
    /// `<public base>/dispatch-delayed`.
    pub destination: String,
}

pub struct PushScheduler {
    client: Client,
    config: PushConfig,
}

impl PushScheduler {
    pub fn new(client: Client, config: PushConfig) -> Self {
        Self { client, config }
    }

    fn publish_url(&self) -> String {
        let destination: String =
            url::form_urlencoded::byte_serialize(self.config.destination.as_bytes()).collect();
        format!(
            "{}/v2/publish/{}",
            self.config.base_url.trim_end_matches('/'),
            destination
        )
    }
}

#[async_trait]
impl DeliveryStrategy for PushScheduler {
    fn name(&self) -> &'static str {
        "push"
    }

    async fn submit(
        &self,
        user_id: i64,
        message: &str,
        options: Option<&[String]>,
        delay: Duration,
    ) -> Result<()> {
        let body = DispatchRequest {
            user_id: Some(user_id),
            message: Some(message.to_string()),
            options: options.map(<[String]>::to_vec),
        };

        let response = self
            .client
            .post(self.publish_url())
            .bearer_auth(&self.config.token)
            .header("Upstash-Delay", format!("{}s", delay.as_secs()))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SchedulerError::Rejected {
                service: "push scheduler",
                status: status.as_u16(),
                body,
            });
        }

        debug!(user_id, "Push scheduler accepted job");
        Ok(())
    }
}
