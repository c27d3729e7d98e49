use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use reqflow_core::domain::directory::{
    BranchId, CandidateQuery, CompanyId, DirectoryUser, RegionId, ScopeFilter, UserId,
};
use reqflow_core::errors::ApplicationError;
use reqflow_core::workflow::ports::UserDirectory;

use super::RepositoryError;
use crate::DbPool;

const USER_COLUMNS: &str = "id, display_name, role, active, company_id, region_id, branch_id";

pub struct SqlDirectoryRepository {
    pool: DbPool,
}

impl SqlDirectoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: UserId) -> Result<Option<DirectoryUser>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM directory_user WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn save(&self, user: &DirectoryUser) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO directory_user (id, display_name, role, active, company_id, region_id, branch_id)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 display_name = excluded.display_name,
                 role = excluded.role,
                 active = excluded.active,
                 company_id = excluded.company_id,
                 region_id = excluded.region_id,
                 branch_id = excluded.branch_id",
        )
        .bind(user.id.0)
        .bind(&user.display_name)
        .bind(&user.role)
        .bind(user.active)
        .bind(user.company_id.map(|id| id.0))
        .bind(user.region_id.map(|id| id.0))
        .bind(user.branch_id.map(|id| id.0))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<DirectoryUser>, RepositoryError> {
        let (scope_clause, scope_value) = match query.scope {
            Some(ScopeFilter::Branch(id)) => (" AND branch_id = ?", Some(id.0)),
            Some(ScopeFilter::Company(id)) => (" AND company_id = ?", Some(id.0)),
            Some(ScopeFilter::Region(id)) => (" AND region_id = ?", Some(id.0)),
            None => ("", None),
        };
        let exclude_clause = if query.exclude_user.is_some() { " AND id <> ?" } else { "" };

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM directory_user
             WHERE active = 1 AND LOWER(TRIM(role)) = LOWER(TRIM(?)){exclude_clause}{scope_clause}
             ORDER BY id ASC"
        );

        let mut statement = sqlx::query(&sql).bind(&query.role);
        if let Some(excluded) = query.exclude_user {
            statement = statement.bind(excluded.0);
        }
        if let Some(value) = scope_value {
            statement = statement.bind(value);
        }

        let rows = statement.fetch_all(&self.pool).await?;
        rows.iter().map(user_from_row).collect()
    }
}

fn user_from_row(row: &SqliteRow) -> Result<DirectoryUser, RepositoryError> {
    Ok(DirectoryUser {
        id: UserId(row.try_get("id")?),
        display_name: row.try_get("display_name")?,
        role: row.try_get("role")?,
        active: row.try_get("active")?,
        company_id: row.try_get::<Option<i64>, _>("company_id")?.map(CompanyId),
        region_id: row.try_get::<Option<i64>, _>("region_id")?.map(RegionId),
        branch_id: row.try_get::<Option<i64>, _>("branch_id")?.map(BranchId),
    })
}

#[async_trait]
impl UserDirectory for SqlDirectoryRepository {
    async fn find_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<DirectoryUser>, ApplicationError> {
        Ok(self.candidates(query).await?)
    }
}
