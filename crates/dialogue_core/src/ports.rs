//! Outbound ports of the engine
//!
//! Finalization hands results to a [`ResultExporter`]; the follow-up nudge is
//! handed to a [`FollowUpScheduler`]. Neither tells the engine how the work is
//! carried out.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::state::AnswerRecord;

/// Everything the exporter needs about a finished walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyReport {
    pub user_id: i64,
    pub username: Option<String>,
    pub branch_label: String,
    pub answers: Vec<AnswerRecord>,
}

#[async_trait]
pub trait ResultExporter: Send + Sync {
    /// Build the result document and deliver it. Errors mean nothing was
    /// delivered; the engine does not retry.
    async fn export(&self, report: &SurveyReport) -> anyhow::Result<()>;
}

/// A message to deliver to a user later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUp {
    pub user_id: i64,
    pub message: String,
    pub options: Option<Vec<String>>,
    pub delay: Duration,
}

#[async_trait]
pub trait FollowUpScheduler: Send + Sync {
    /// Hand the follow-up off and return without waiting for the delay.
    /// Failures are logged by the implementation, never surfaced.
    async fn schedule(&self, follow_up: FollowUp);
}
