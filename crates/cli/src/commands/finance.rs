use std::path::Path;

use chrono::Utc;
use serde_json::{json, Value};

use payflow_core::config::AppConfig;
use payflow_core::views::finance;
use payflow_core::{DocumentSlot, PurchaseRequest, RequestId};

use crate::commands::po::PurchaseOrderRenderer;
use crate::commands::{
    gateway, gateway_failure, require_session, run_slot_upload, runtime, session_store,
    CommandResult,
};

fn row(request: &PurchaseRequest) -> Value {
    json!({
        "id": request.id,
        "title": request.title,
        "description": request.description,
        "amount": request.amount,
        "supplier": request.supplier,
        "status": request.status,
        "receipt": request.receipt,
        "purchase_order_file": request.purchase_order_file,
        "capabilities": finance::capabilities(request),
    })
}

#[derive(Clone, Copy)]
enum FinanceQueue {
    Approved,
    Rejected,
    AwaitingApproval,
}

impl FinanceQueue {
    fn label(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::AwaitingApproval => "awaiting-approval",
        }
    }
}

fn fetch_queue(command: &'static str, config: &AppConfig, kind: FinanceQueue) -> CommandResult {
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

    let result = runtime.block_on(async {
        match kind {
            FinanceQueue::Approved => gateway.approved_requests(&session).await,
            FinanceQueue::Rejected => gateway.rejected_requests(&session).await,
            FinanceQueue::AwaitingApproval => gateway.finance_pending_requests(&session).await,
        }
    });

    match result {
        Ok(requests) => CommandResult::success_with_data(
            command,
            format!("{} {} requests", requests.len(), kind.label()),
            json!(requests.iter().map(row).collect::<Vec<_>>()),
        ),
        Err(error) => gateway_failure(command, &store, error),
    }
}

pub fn approved(config: &AppConfig) -> CommandResult {
    fetch_queue("finance.approved", config, FinanceQueue::Approved)
}

pub fn rejected(config: &AppConfig) -> CommandResult {
    fetch_queue("finance.rejected", config, FinanceQueue::Rejected)
}

pub fn pending(config: &AppConfig) -> CommandResult {
    fetch_queue("finance.pending", config, FinanceQueue::AwaitingApproval)
}

pub fn upload_receipt(config: &AppConfig, id: i64, file: &Path) -> CommandResult {
    run_slot_upload(
        "finance.upload-receipt",
        config,
        id,
        file,
        DocumentSlot::Receipt,
        |request, _session| finance::capabilities(request).can_upload_receipt,
        "receipt upload is unavailable: the request must be approved and the slot empty",
    )
}

pub fn comment(config: &AppConfig, id: i64, text: &str) -> CommandResult {
    const COMMAND: &str = "finance.comment";

    if text.trim().is_empty() {
        return CommandResult::failure(COMMAND, "validation", "comment text is required", 8);
    }

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

    let detail = match runtime.block_on(gateway.request_detail(&session, RequestId(id))) {
        Ok(detail) => detail,
        Err(error) => return gateway_failure(COMMAND, &store, error),
    };
    if !finance::capabilities(&detail).can_comment {
        return CommandResult::failure(
            COMMAND,
            "permission",
            format!("finance comments are limited to approved requests; request {id} is {}", detail.status),
            7,
        );
    }

    match runtime.block_on(gateway.add_finance_comment(&session, RequestId(id), text)) {
        Ok(_) => CommandResult::success(COMMAND, format!("finance comment added to request {id}")),
        Err(error) => gateway_failure(COMMAND, &store, error),
    }
}

/// Render a purchase-order document from already-loaded fields. Local
/// formatting only; the single network call is the fetch of the request.
pub fn po(config: &AppConfig, id: i64, out: Option<&Path>) -> CommandResult {
    const COMMAND: &str = "finance.po";

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

    let detail = match runtime.block_on(gateway.request_detail(&session, RequestId(id))) {
        Ok(detail) => detail,
        Err(error) => return gateway_failure(COMMAND, &store, error),
    };

    let renderer = PurchaseOrderRenderer::new();
    let html = match renderer.render(&detail, Utc::now()) {
        Ok(html) => html,
        Err(error) => return CommandResult::failure(COMMAND, "validation", error.to_string(), 8),
    };

    let path = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| std::path::PathBuf::from(format!("PO_request_{id}.html")));
    if let Err(error) = std::fs::write(&path, html) {
        return CommandResult::failure(
            COMMAND,
            "io",
            format!("could not write `{}`: {error}", path.display()),
            4,
        );
    }

    CommandResult::success_with_data(
        COMMAND,
        format!("purchase order rendered for request {id}"),
        json!({ "request_id": id, "path": path }),
    )
}
