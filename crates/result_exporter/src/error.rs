use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to build spreadsheet: {0}")]
    Spreadsheet(#[from] zip::result::ZipError),

    #[error("failed to write spreadsheet: {0}")]
    Io(#[from] std::io::Error),

    #[error("mail delivery failed (primary: {primary}; fallback: {fallback})")]
    Mail { primary: String, fallback: String },

    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build mail: {0}")]
    Build(String),
}

impl From<lettre::error::Error> for ExportError {
    fn from(err: lettre::error::Error) -> Self {
        Self::Build(err.to_string())
    }
}

pub type Result<T, E = ExportError> = std::result::Result<T, E>;
