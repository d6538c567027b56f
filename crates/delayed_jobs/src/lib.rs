//! delayed_jobs - deliver a message to a user later
//!
//! Two strategies are tried in order: a push-schedule service that calls back
//! `/dispatch-delayed` after the delay, and a sorted-set queue keyed by due
//! time that a poller drains. Callers only see [`FallbackScheduler`].

pub mod error;
pub mod job;
pub mod poller;
pub mod push;
pub mod queue;
pub mod scheduler;
pub mod worker;

pub use error::{Result, SchedulerError};
pub use job::{DelayedJob, DispatchRequest};
pub use poller::{JobDispatcher, QueuePoller, DEFAULT_PAGE_SIZE};
pub use push::{PushConfig, PushScheduler};
pub use queue::{InMemoryQueue, JobQueue, QueueScheduler, RedisRestConfig, RedisRestQueue, QUEUE_KEY};
pub use scheduler::{DeliveryStrategy, FallbackScheduler};
pub use worker::PollWorker;
