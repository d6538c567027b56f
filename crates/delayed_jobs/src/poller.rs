//! Queue draining

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::job::DelayedJob;
use crate::queue::JobQueue;

/// Jobs read per drain.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Sends a due message to the user.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        user_id: i64,
        message: &str,
        options: Option<&[String]>,
    ) -> anyhow::Result<()>;
}

pub struct QueuePoller {
    queue: Arc<dyn JobQueue>,
    dispatcher: Arc<dyn JobDispatcher>,
    page_size: usize,
}

impl QueuePoller {
    pub fn new(queue: Arc<dyn JobQueue>, dispatcher: Arc<dyn JobDispatcher>) -> Self {
        Self {
            queue,
            dispatcher,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Dispatch every job due at or before `now_ms` (up to one page) and
    /// return how many were read.
    ///
    /// Each member is removed after its dispatch attempt whether or not the
    /// attempt succeeded, so a failing job is never retried. Members that do
    /// not decode are removed too.
    pub async fn drain(&self, now_ms: i64) -> Result<usize> {
        let members = self.queue.due(now_ms, self.page_size).await?;
        let processed = members.len();

        for member in members {
            match serde_json::from_str::<DelayedJob>(&member) {
                Ok(job) => {
                    if let Err(err) = self
                        .dispatcher
                        .dispatch(job.user_id, &job.message, job.options.as_deref())
                        .await
                    {
                        error!(user_id = job.user_id, "Failed to dispatch queued message: {:#}", err);
                    }
                }
                Err(err) => warn!("Dropping undecodable queue member {:?}: {}", member, err),
            }

            if let Err(err) = self.queue.remove(&member).await {
                error!("Failed to remove queue member: {}", err);
            }
        }

        if processed > 0 {
            info!(processed, "Drained delayed-job queue");
        }
        Ok(processed)
    }
}
