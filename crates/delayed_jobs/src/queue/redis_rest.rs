//! Queue backed by an Upstash-style Redis REST endpoint
//!
//! Each command is a JSON array POSTed to the base URL with a bearer token.
//! The reply is `{"result": ...}` or `{"error": "..."}`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{JobQueue, QUEUE_KEY};
use crate::error::{Result, SchedulerError};

#[derive(Debug, Clone)]
pub struct RedisRestConfig {
    pub url: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
struct CommandReply {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

pub struct RedisRestQueue {
    client: Client,
    config: RedisRestConfig,
}

impl RedisRestQueue {
    pub fn new(client: Client, config: RedisRestConfig) -> Self {
        Self { client, config }
    }

    async fn command(&self, args: Value) -> Result<Value> {
        debug!("Redis REST command: {}", args);
        let response = self
            .client
            .post(self.config.url.trim_end_matches('/'))
            .bearer_auth(&self.config.token)
            .json(&args)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SchedulerError::Rejected {
                service: "redis rest",
                status: status.as_u16(),
                body,
            });
        }

        let reply: CommandReply = response.json().await?;
        match reply.error {
            Some(error) => Err(SchedulerError::Queue(error)),
            None => Ok(reply.result),
        }
    }
}

#[async_trait]
impl JobQueue for RedisRestQueue {
    async fn add(&self, score: i64, member: &str) -> Result<()> {
        self.command(json!(["ZADD", QUEUE_KEY, score.to_string(), member]))
            .await?;
        Ok(())
    }

    async fn due(&self, max_score: i64, limit: usize) -> Result<Vec<String>> {
        let result = self
            .command(json!([
                "ZRANGEBYSCORE",
                QUEUE_KEY,
                "0",
                max_score.to_string(),
                "LIMIT",
                "0",
                limit.to_string()
            ]))
            .await?;

        match result {
            Value::Null => Ok(Vec::new()),
            other => Ok(serde_json::from_value(other)?),
        }
    }

    async fn remove(&self, member: &str) -> Result<()> {
        self.command(json!(["ZREM", QUEUE_KEY, member])).await?;
        Ok(())
    }
}
