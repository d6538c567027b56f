use async_trait::async_trait;
use chrono::Local;
use dialogue_core::{ResultExporter, SurveyReport};
use tracing::info;

use crate::mailer::Mailer;
use crate::spreadsheet::survey_sheet;

/// Builds the results spreadsheet and mails it to the configured recipient.
pub struct SpreadsheetMailExporter {
    mailer: Mailer,
}

impl SpreadsheetMailExporter {
    pub fn new(mailer: Mailer) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl ResultExporter for SpreadsheetMailExporter {
    async fn export(&self, report: &SurveyReport) -> anyhow::Result<()> {
        let spreadsheet = survey_sheet(report, &Local::now()).to_xlsx()?;
        let message = self
            .mailer
            .build_message(&report.branch_label, spreadsheet)?;
        self.mailer.send(message).await?;

        info!(
            user_id = report.user_id,
            branch = %report.branch_label,
            rows = report.answers.len(),
            "Survey results mailed"
        );
        Ok(())
    }
}
