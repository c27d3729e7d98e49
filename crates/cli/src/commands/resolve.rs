use reqflow_core::workflow::{ResolutionOutcome, ResolveMode};
use reqflow_core::RequisitionId;
use reqflow_db::connect_with_config;
use serde_json::{json, Value};
use tracing::info;

use crate::commands::{build_runtime, correlation_id, load_config, workflow_service, CommandResult};
use crate::ResolveArgs;

pub fn run(args: &ResolveArgs) -> CommandResult {
    let config = match load_config("resolve") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("resolve") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let id = RequisitionId(args.requisition_id.trim().to_string());
    let mode = if args.force { ResolveMode::Force } else { ResolveMode::IfUnresolved };
    let correlation_id = correlation_id();

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return CommandResult::failure("resolve", "db_connectivity", error.to_string(), 4)
            }
        };

        info!(
            event_name = "cli.resolve.started",
            correlation_id = %correlation_id,
            requisition_id = %id,
            force = args.force,
            "resolving requisition"
        );
        let service = workflow_service(&pool, &config);
        let result = service.resolve(&id, mode, &correlation_id).await;
        pool.close().await;

        match result {
            Ok(outcome) => {
                let message = if outcome.was_applied() {
                    format!("approval chain stored for requisition `{id}`")
                } else {
                    format!("requisition `{id}` already has an approval chain; nothing changed")
                };
                CommandResult::success_with_data("resolve", message, outcome_payload(&outcome))
            }
            Err(error) => {
                CommandResult::from_resolution_error("resolve", &error, &correlation_id)
            }
        }
    })
}

pub(crate) fn outcome_payload(outcome: &ResolutionOutcome) -> Value {
    let requisition = outcome.requisition();
    let mut payload = json!({
        "requisition_id": requisition.id.0,
        "applied": outcome.was_applied(),
        "status": requisition.status.as_str(),
        "tier": requisition.tier,
        "next_approver_id": requisition.next_approver.map(|id| id.0),
        "workflow_sequence": requisition.workflow_sequence,
        "sla": requisition.sla,
    });

    if let ResolutionOutcome::Applied { chain, .. } = outcome {
        payload["fast_tracked"] = json!(chain.fast_tracked);
        payload["truncated"] = json!(chain.truncated);
        payload["escalated_steps"] = json!(chain.escalated_steps);
        payload["collapsed_to_admin"] = json!(chain.collapsed_to_admin);
    }

    payload
}
