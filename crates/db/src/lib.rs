pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use fixtures::{
    OrgSeedDataset, RequisitionSeedInfo, SeedRequisitionContract, SeedResult, VerificationResult,
    SEED_REQUISITIONS,
};
pub use repositories::{
    RepositoryError, SqlDirectoryRepository, SqlRequisitionRepository, SqlSettingsRepository,
    SqlThresholdRepository,
};
