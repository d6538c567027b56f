//! Sorted-set queue fallback
//!
//! Jobs are stored as JSON members scored by their due time in epoch
//! milliseconds. A poller later reads everything with a score at or below
//! "now" and removes it.

mod memory;
mod redis_rest;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::Result;
use crate::job::DelayedJob;
use crate::scheduler::DeliveryStrategy;

pub use memory::InMemoryQueue;
pub use redis_rest::{RedisRestConfig, RedisRestQueue};

/// Sorted-set key shared by producers and the poller.
pub const QUEUE_KEY: &str = "delayed-jobs";

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Insert `member` with `score`.
    async fn add(&self, score: i64, member: &str) -> Result<()>;

    /// Members with score in `[0, max_score]`, ascending, at most `limit`.
    async fn due(&self, max_score: i64, limit: usize) -> Result<Vec<String>>;

    async fn remove(&self, member: &str) -> Result<()>;
}

/// Strategy that stores the job in a [`JobQueue`] with `dueAt = now + delay`.
pub struct QueueScheduler {
    queue: Arc<dyn JobQueue>,
}

impl QueueScheduler {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl DeliveryStrategy for QueueScheduler {
    fn name(&self) -> &'static str {
        "queue"
    }

    async fn submit(
        &self,
        user_id: i64,
        message: &str,
        options: Option<&[String]>,
        delay: Duration,
    ) -> Result<()> {
        let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        let job = DelayedJob {
            user_id,
            message: message.to_string(),
            options: options.map(<[String]>::to_vec),
            due_at: Utc::now().timestamp_millis().saturating_add(delay_ms),
        };
        let member = serde_json::to_string(&job)?;
        self.queue.add(job.due_at, &member).await
    }
}
