use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde_json::{json, Value};

use payflow_core::config::AppConfig;
use payflow_core::views::staff::{self, StaffBoard};
use payflow_core::{DocumentSlot, NewRequest, PurchaseRequest, RequestId, RequestPatch};
use payflow_gateway::{BatchError, CloudStore, DocumentUploader, StoredFile};

use crate::commands::{
    gateway, gateway_failure, require_session, run_slot_upload, runtime, session_store,
    CommandResult,
};

fn row(request: &PurchaseRequest) -> Value {
    json!({
        "id": request.id,
        "title": request.title,
        "amount": request.amount,
        "status": request.status,
        "current_level": request.current_level,
        "proforma": request.proforma,
        "receipt": request.receipt,
        "attachments": request.attachments.len(),
    })
}

pub fn list(config: &AppConfig) -> CommandResult {
    const COMMAND: &str = "staff.list";

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

    let requests = match runtime.block_on(gateway.list_my_requests(&session)) {
        Ok(requests) => requests,
        Err(error) => return gateway_failure(COMMAND, &store, error),
    };

    let board = StaffBoard::project(requests, &session.user);
    let counts = board.counts();
    CommandResult::success_with_data(
        COMMAND,
        format!(
            "{} pending, {} approved, {} rejected",
            counts.pending, counts.approved, counts.rejected
        ),
        json!({
            "counts": counts,
            "pending": board.pending.iter().map(row).collect::<Vec<_>>(),
            "approved": board.approved.iter().map(row).collect::<Vec<_>>(),
            "rejected": board.rejected.iter().map(row).collect::<Vec<_>>(),
        }),
    )
}

pub fn show(config: &AppConfig, id: i64) -> CommandResult {
    const COMMAND: &str = "staff.show";

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

    match runtime.block_on(gateway.request_detail(&session, RequestId(id))) {
        Ok(detail) => {
            let capabilities = staff::capabilities(&detail, &session.user);
            CommandResult::success_with_data(
                COMMAND,
                format!("request {id} is {}", detail.status),
                json!({ "request": detail, "capabilities": capabilities }),
            )
        }
        Err(error) => gateway_failure(COMMAND, &store, error),
    }
}

pub fn create(
    config: &AppConfig,
    title: String,
    description: String,
    amount: Decimal,
    supplier: Option<String>,
) -> CommandResult {
    const COMMAND: &str = "staff.create";

    let new_request = match NewRequest::new(title, description, amount, supplier) {
        Ok(new_request) => new_request,
        Err(error) => return CommandResult::failure(COMMAND, "validation", error.to_string(), 8),
    };

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

    match runtime.block_on(gateway.create_request(&session, &new_request)) {
        Ok(created) => CommandResult::success_with_data(
            COMMAND,
            format!("request {} created", created.id),
            row(&created),
        ),
        Err(error) => gateway_failure(COMMAND, &store, error),
    }
}

pub fn edit(
    config: &AppConfig,
    id: i64,
    title: Option<String>,
    description: Option<String>,
    amount: Option<Decimal>,
    supplier: Option<String>,
) -> CommandResult {
    const COMMAND: &str = "staff.edit";

    let patch = RequestPatch { title, description, amount, supplier };
    if patch.is_empty() {
        return CommandResult::failure(COMMAND, "validation", "no fields to change", 8);
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
    if !detail.editable_by(&session.user) {
        return CommandResult::failure(
            COMMAND,
            "permission",
            format!("request {id} is not editable while {}", detail.status),
            7,
        );
    }

    if let Err(error) = runtime.block_on(gateway.update_request(&session, RequestId(id), &patch)) {
        return gateway_failure(COMMAND, &store, error);
    }

    match runtime.block_on(gateway.request_detail(&session, RequestId(id))) {
        Ok(updated) => CommandResult::success_with_data(
            COMMAND,
            format!("request {id} updated"),
            row(&updated),
        ),
        Err(error) => gateway_failure(COMMAND, &store, error),
    }
}

pub fn comment(config: &AppConfig, id: i64, text: &str) -> CommandResult {
    const COMMAND: &str = "staff.comment";

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

    match runtime.block_on(gateway.add_comment(&session, RequestId(id), text)) {
        Ok(_) => CommandResult::success(COMMAND, format!("comment added to request {id}")),
        Err(error) => gateway_failure(COMMAND, &store, error),
    }
}

pub fn upload_proforma(config: &AppConfig, id: i64, file: &Path) -> CommandResult {
    run_slot_upload(
        "staff.upload-proforma",
        config,
        id,
        file,
        DocumentSlot::Proforma,
        |request, session| staff::capabilities(request, &session.user).can_upload_proforma,
        "proforma upload is unavailable: the request must be yours, pending, and the slot empty",
    )
}

pub fn upload_receipt(config: &AppConfig, id: i64, file: &Path) -> CommandResult {
    run_slot_upload(
        "staff.upload-receipt",
        config,
        id,
        file,
        DocumentSlot::Receipt,
        |request, session| staff::capabilities(request, &session.user).can_upload_receipt,
        "receipt upload is unavailable: the request must be yours, pending, and the slot empty",
    )
}

pub fn attach(config: &AppConfig, id: i64, files: &[PathBuf]) -> CommandResult {
    const COMMAND: &str = "staff.attach";

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

    let settings = match config.storage.require() {
        Ok(settings) => settings,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2)
        }
    };
    let cloud = match CloudStore::new(&settings) {
        Ok(cloud) => cloud,
        Err(error) => {
            return CommandResult::failure(COMMAND, "upload_transport", error.to_string(), 11)
        }
    };

    let mut staged = Vec::with_capacity(files.len());
    for file in files {
        match StoredFile::from_path(file) {
            Ok(item) => staged.push(item),
            Err(error) => {
                return CommandResult::failure(
                    COMMAND,
                    "io",
                    format!("could not read `{}`: {error}", file.display()),
                    4,
                )
            }
        }
    }

    let names: Vec<String> = staged.iter().map(|file| file.name.clone()).collect();
    let progress = std::sync::Arc::new(move |index: usize, pct: u8| {
        tracing::info!(
            event_name = "upload.progress",
            file_name = %names[index],
            pct,
            "transferring"
        );
    });

    let uploader = DocumentUploader::new(&cloud, &gateway);
    match runtime.block_on(uploader.attach_batch(&session, RequestId(id), staged, progress)) {
        Ok(urls) => CommandResult::success_with_data(
            COMMAND,
            format!("{} attachments associated with request {id}", urls.len()),
            json!({ "request_id": id, "urls": urls }),
        ),
        Err(error @ BatchError::Transfer { .. }) => CommandResult::failure(
            COMMAND,
            "upload_transport",
            format!("{error}; transferred before the failure: {:?}", error.uploaded()),
            11,
        ),
        Err(BatchError::Association { uploaded, source }) => {
            if source.is_auth() {
                return gateway_failure(COMMAND, &store, source);
            }
            CommandResult::failure(
                COMMAND,
                "association",
                format!("{}; transferred but unassociated: {uploaded:?}", source.message()),
                12,
            )
        }
    }
}
