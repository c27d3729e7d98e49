use thiserror::Error;

use reqflow_core::errors::ApplicationError;

pub mod directory;
pub mod requisition;
pub mod settings;
pub mod threshold;

pub use directory::SqlDirectoryRepository;
pub use requisition::SqlRequisitionRepository;
pub use settings::SqlSettingsRepository;
pub use threshold::SqlThresholdRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

pub(crate) fn parse_timestamp(
    column: &str,
    raw: &str,
) -> Result<chrono::DateTime<chrono::Utc>, RepositoryError> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&chrono::Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column} `{raw}`: {error}")))
}

pub(crate) fn parse_decimal(
    column: &str,
    raw: &str,
) -> Result<rust_decimal::Decimal, RepositoryError> {
    raw.trim()
        .parse()
        .map_err(|error| RepositoryError::Decode(format!("{column} `{raw}`: {error}")))
}
