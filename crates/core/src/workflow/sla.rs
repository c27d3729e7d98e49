use chrono::{DateTime, Duration, Utc};

use crate::domain::requisition::SlaDeadlines;
use crate::errors::ApplicationError;
use crate::settings::{keys, WorkflowSettings};

/// Deadlines are computed once from the creation time; existing ones are kept as-is.
pub fn assign_sla(
    existing: &SlaDeadlines,
    created_at: DateTime<Utc>,
    settings: &WorkflowSettings,
) -> Result<SlaDeadlines, ApplicationError> {
    if !settings.track_workflow_metrics || existing.is_assigned() {
        return Ok(existing.clone());
    }

    let end_to_end = Duration::try_days(settings.end_to_end_sla_days);
    let payment = Duration::try_hours(settings.payment_sla_hours);

    Ok(SlaDeadlines {
        end_to_end_due_at: Some(offset(created_at, end_to_end, keys::END_TO_END_SLA_DAYS)?),
        payment_due_at: Some(offset(created_at, payment, keys::PAYMENT_SLA_HOURS)?),
    })
}

fn offset(
    created_at: DateTime<Utc>,
    delta: Option<Duration>,
    key: &str,
) -> Result<DateTime<Utc>, ApplicationError> {
    delta.and_then(|delta| created_at.checked_add_signed(delta)).ok_or_else(|| {
        ApplicationError::Configuration(format!(
            "setting `{key}` puts the deadline outside the representable date range"
        ))
    })
}
