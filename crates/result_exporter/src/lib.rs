//! result_exporter - spreadsheet + mail delivery of finished surveys

pub mod error;
pub mod exporter;
pub mod mailer;
pub mod spreadsheet;

pub use error::{ExportError, Result};
pub use exporter::SpreadsheetMailExporter;
pub use mailer::{
    attachment_name, MailConfig, MailTransport, Mailer, SmtpEndpoint, SmtpTransport, TlsMode,
    XLSX_CONTENT_TYPE,
};
pub use spreadsheet::{survey_sheet, Row, Worksheet};
