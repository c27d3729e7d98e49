use reqflow_core::workflow::{BatchItem, ResolveMode};
use reqflow_core::RequisitionId;
use reqflow_db::connect_with_config;
use serde_json::{json, Value};

use crate::commands::resolve::outcome_payload;
use crate::commands::{build_runtime, correlation_id, load_config, workflow_service, CommandResult};
use crate::ReresolveArgs;

pub fn run(args: &ReresolveArgs) -> CommandResult {
    if !args.all_pending && args.requisition_ids.is_empty() {
        return CommandResult::failure(
            "reresolve",
            "usage",
            "pass one or more requisition ids or --all-pending",
            1,
        );
    }

    let config = match load_config("reresolve") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("reresolve") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let mode = if args.force { ResolveMode::Force } else { ResolveMode::IfUnresolved };
    let correlation_id = correlation_id();

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return CommandResult::failure(
                    "reresolve",
                    "db_connectivity",
                    error.to_string(),
                    4,
                )
            }
        };

        let service = workflow_service(&pool, &config);
        let items = if args.all_pending {
            service.reresolve_pending(mode, args.limit, &correlation_id).await
        } else {
            let ids: Vec<RequisitionId> = args
                .requisition_ids
                .iter()
                .map(|id| RequisitionId(id.trim().to_string()))
                .collect();
            Ok(service.reresolve_batch(&ids, mode, &correlation_id).await)
        };
        pool.close().await;

        match items {
            Ok(items) => batch_result(&items),
            Err(error) => {
                CommandResult::from_resolution_error("reresolve", &error, &correlation_id)
            }
        }
    })
}

fn batch_result(items: &[BatchItem]) -> CommandResult {
    let applied = items
        .iter()
        .filter(|item| item.result.as_ref().is_ok_and(|outcome| outcome.was_applied()))
        .count();
    let failed = items.iter().filter(|item| item.result.is_err()).count();
    let unchanged = items.len() - applied - failed;

    let data = json!({
        "total": items.len(),
        "applied": applied,
        "unchanged": unchanged,
        "failed": failed,
        "items": items.iter().map(item_payload).collect::<Vec<_>>(),
    });
    let message = format!(
        "processed {} requisitions: {applied} applied, {unchanged} unchanged, {failed} failed",
        items.len()
    );

    if failed == 0 {
        CommandResult::success_with_data("reresolve", message, data)
    } else {
        CommandResult::failure_with_data("reresolve", "partial_failure", message, 11, data)
    }
}

fn item_payload(item: &BatchItem) -> Value {
    match &item.result {
        Ok(outcome) => outcome_payload(outcome),
        Err(error) => json!({
            "requisition_id": item.requisition_id.0,
            "applied": false,
            "error_class": error.class().as_str(),
            "message": error.to_string(),
        }),
    }
}
