use reqflow_core::config::{AppConfig, LoadOptions};
use reqflow_core::domain::directory::CandidateQuery;
use reqflow_core::settings::{LayeredSettings, WorkflowSettings};
use reqflow_core::workflow::ports::UserDirectory;
use reqflow_core::workflow::ADMIN;
use reqflow_db::migrations::{self, MIGRATOR};
use reqflow_db::{connect_with_config, DbPool, SqlDirectoryRepository, SqlSettingsRepository};
use serde::Serialize;

use crate::commands::CommandResult;

const DOCTOR_FAILURE_EXIT_CODE: u8 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DATABASE_CHECKS: &[&str] =
    &["database_connectivity", "schema_migrations", "workflow_settings", "admin_fallback"];

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code =
        if report.overall_status == CheckStatus::Pass { 0 } else { DOCTOR_FAILURE_EXIT_CODE };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                "configuration loaded and validated",
            ));
            checks.extend(database_checks(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            checks.extend(
                DATABASE_CHECKS
                    .iter()
                    .map(|name| DoctorCheck::skipped(*name, "configuration did not load")),
            );
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn database_checks(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            let mut checks = vec![DoctorCheck::fail(
                "database_connectivity",
                format!("failed to initialize async runtime: {error}"),
            )];
            checks.extend(
                DATABASE_CHECKS[1..]
                    .iter()
                    .map(|name| DoctorCheck::skipped(*name, "the async runtime did not start")),
            );
            return checks;
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                let mut checks = vec![DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to connect to database: {error}"),
                )];
                checks.extend(
                    DATABASE_CHECKS[1..]
                        .iter()
                        .map(|name| DoctorCheck::skipped(*name, "the database is unreachable")),
                );
                return checks;
            }
        };

        let mut checks = vec![DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        )];

        let schema = check_schema(&pool).await;
        let schema_ready = schema.status == CheckStatus::Pass;
        checks.push(schema);

        if schema_ready {
            checks.push(check_workflow_settings(&pool, config).await);
            checks.push(check_admin_fallback(&pool).await);
        } else {
            checks.push(DoctorCheck::skipped("workflow_settings", "migrations are pending"));
            checks.push(DoctorCheck::skipped("admin_fallback", "migrations are pending"));
        }

        pool.close().await;
        checks
    })
}

async fn check_schema(pool: &DbPool) -> DoctorCheck {
    let expected: Vec<i64> = MIGRATOR
        .iter()
        .filter(|migration| migration.migration_type.is_up_migration())
        .map(|migration| migration.version)
        .collect();

    match migrations::applied_versions(pool).await {
        Ok(applied) if applied == expected => {
            DoctorCheck::pass("schema_migrations", format!("schema at versions {applied:?}"))
        }
        Ok(applied) => DoctorCheck::fail(
            "schema_migrations",
            format!(
                "applied versions {applied:?} differ from bundled {expected:?}; \
                 run `reqflow migrate`"
            ),
        ),
        Err(error) => DoctorCheck::fail("schema_migrations", error.to_string()),
    }
}

async fn check_workflow_settings(pool: &DbPool, config: &AppConfig) -> DoctorCheck {
    let settings =
        LayeredSettings::new(SqlSettingsRepository::new(pool.clone()), config.settings_provider());

    match WorkflowSettings::load(&settings).await {
        Ok(loaded) => DoctorCheck::pass(
            "workflow_settings",
            format!(
                "max requisition amount {}, max {} approvals, SLA {} days / {} hours",
                loaded.max_requisition_amount,
                loaded.max_approvals_per_requisition,
                loaded.end_to_end_sla_days,
                loaded.payment_sla_hours
            ),
        ),
        Err(error) => DoctorCheck::fail("workflow_settings", error.to_string()),
    }
}

async fn check_admin_fallback(pool: &DbPool) -> DoctorCheck {
    let directory = SqlDirectoryRepository::new(pool.clone());

    match directory.find_candidates(&CandidateQuery::for_role(ADMIN)).await {
        Ok(admins) if admins.is_empty() => DoctorCheck::fail(
            "admin_fallback",
            "no active admin account; escalations with no eligible approver will fail",
        ),
        Ok(admins) => {
            DoctorCheck::pass("admin_fallback", format!("{} active admin account(s)", admins.len()))
        }
        Err(error) => DoctorCheck::fail("admin_fallback", error.to_string()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::{render_human, CheckStatus, DoctorCheck, DoctorReport};

    #[test]
    fn human_report_marks_each_check() {
        let report = DoctorReport {
            overall_status: CheckStatus::Fail,
            summary: "doctor: one or more readiness checks failed".to_string(),
            checks: vec![
                DoctorCheck::pass("config_validation", "ok"),
                DoctorCheck::fail("admin_fallback", "no active admin account"),
                DoctorCheck::skipped("workflow_settings", "migrations are pending"),
            ],
        };

        let rendered = render_human(&report);
        assert!(rendered.contains("- [ok] config_validation: ok"));
        assert!(rendered.contains("- [fail] admin_fallback: no active admin account"));
        assert!(rendered
            .contains("- [skip] workflow_settings: skipped because migrations are pending"));
    }
}
