use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::poller::QueuePoller;

/// Background loop that drains the queue on a fixed interval, for
/// deployments without an external cron hitting `/cron`.
pub struct PollWorker {
    poller: Arc<QueuePoller>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl PollWorker {
    pub fn new(poller: Arc<QueuePoller>, interval: Duration) -> Self {
        Self {
            poller,
            interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn the loop. The returned flag stops it when set to `false`.
    pub fn spawn(&self) -> (Arc<AtomicBool>, JoinHandle<()>) {
        let poller = Arc::clone(&self.poller);
        let running = Arc::clone(&self.running);
        let interval = self.interval;
        running.store(true, Ordering::SeqCst);

        let flag = Arc::clone(&running);
        let handle = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "PollWorker started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            while running.load(Ordering::SeqCst) {
                ticker.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(err) = poller.drain(Utc::now().timestamp_millis()).await {
                    warn!("Queue drain failed: {}", err);
                }
            }

            info!("PollWorker stopped");
        });

        (flag, handle)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
