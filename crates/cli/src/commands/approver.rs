use serde_json::{json, Value};

use payflow_core::config::AppConfig;
use payflow_core::lifecycle::{self, DecisionAction};
use payflow_core::views::approver::{self, DecisionFilter};
use payflow_core::{PurchaseRequest, RequestId};

use crate::commands::{
    gateway, gateway_failure, require_session, runtime, session_store, CommandResult,
};

fn queue_row(request: &PurchaseRequest) -> Value {
    json!({
        "id": request.id,
        "title": request.title,
        "description": request.description,
        "amount": request.amount,
        "status": request.status,
        "current_level": request.current_level,
        "receipt": request.receipt,
        "attachments": request.attachments.len(),
    })
}

pub fn queue(config: &AppConfig) -> CommandResult {
    const COMMAND: &str = "approver.queue";

    let store = session_store(config);
    let session = match require_session(COMMAND, &store) {
        Ok(session) => session,
        Err(failure) => return failure,
    };
    let runtime = match runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    let gateway = match gateway(COMMAND, config) {
        Ok(gateway) => gateway,
        Err(failure) => return failure,
    };

    let fetched = match runtime.block_on(gateway.pending_queue(&session)) {
        Ok(fetched) => fetched,
        Err(error) => return gateway_failure(COMMAND, &store, error),
    };

    // The backend already scopes the queue; the client-side mirror keeps a
    // stale or over-broad response from showing an unactionable row.
    let queue = approver::pending_queue(&fetched, &session.user);
    CommandResult::success_with_data(
        COMMAND,
        format!("{} requests awaiting your decision", queue.len()),
        json!(queue.iter().map(|request| queue_row(request)).collect::<Vec<_>>()),
    )
}

pub fn history(config: &AppConfig, filter: DecisionFilter) -> CommandResult {
    const COMMAND: &str = "approver.history";

    let store = session_store(config);
    let session = match require_session(COMMAND, &store) {
        Ok(session) => session,
        Err(failure) => return failure,
    };
    let runtime = match runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    let gateway = match gateway(COMMAND, config) {
        Ok(gateway) => gateway,
        Err(failure) => return failure,
    };

    let entries = match runtime.block_on(gateway.my_approvals(&session)) {
        Ok(entries) => entries,
        Err(error) => return gateway_failure(COMMAND, &store, error),
    };

    let filtered = approver::filter_history(&entries, filter);
    CommandResult::success_with_data(
        COMMAND,
        format!("{} decisions", filtered.len()),
        json!(filtered),
    )
}

fn decide(
    command: &'static str,
    config: &AppConfig,
    id: i64,
    action: DecisionAction,
    comments: Option<&str>,
) -> CommandResult {
    let store = session_store(config);
    let session = match require_session(command, &store) {
        Ok(session) => session,
        Err(failure) => return failure,
    };
    let runtime = match runtime(command) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    let gateway = match gateway(command, config) {
        Ok(gateway) => gateway,
        Err(failure) => return failure,
    };

    // Mirror the transition guard against a fresh copy before submitting, so a
    // doomed action is refused with a precise reason instead of a round trip.
    let detail = match runtime.block_on(gateway.request_detail(&session, RequestId(id))) {
        Ok(detail) => detail,
        Err(error) => return gateway_failure(command, &store, error),
    };
    if let Err(guard) = lifecycle::authorize_decision(&detail, &session.user) {
        return CommandResult::failure(command, "permission", guard.to_string(), 7);
    }

    match runtime.block_on(gateway.decide(&session, RequestId(id), action, comments)) {
        Ok(updated) => CommandResult::success_with_data(
            command,
            format!("request {id} is now {}", updated.status),
            json!({
                "request": queue_row(&updated),
                "approvals": updated.approvals,
            }),
        ),
        Err(error) => gateway_failure(command, &store, error),
    }
}

pub fn decide_approve(config: &AppConfig, id: i64, comments: Option<&str>) -> CommandResult {
    decide("approver.approve", config, id, DecisionAction::Approve, comments)
}

pub fn decide_reject(config: &AppConfig, id: i64, comments: Option<&str>) -> CommandResult {
    decide("approver.reject", config, id, DecisionAction::Reject, comments)
}
