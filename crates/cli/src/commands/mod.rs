pub mod approver;
pub mod auth;
pub mod finance;
pub mod po;
pub mod staff;

use serde::Serialize;
use serde_json::Value;

use payflow_core::config::AppConfig;
use payflow_core::session::{Session, SessionStore};
use payflow_gateway::{Gateway, GatewayError};

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn success_with_data(command: &str, message: impl Into<String>, data: Value) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: Some(data),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string_pretty(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn session_store(config: &AppConfig) -> SessionStore {
    SessionStore::new(config.session.file.clone())
}

pub(crate) fn runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

pub(crate) fn gateway(command: &str, config: &AppConfig) -> Result<Gateway, CommandResult> {
    Gateway::new(&config.api).map_err(|error| {
        CommandResult::failure(
            command,
            "gateway_init",
            format!("failed to initialize backend client: {error}"),
            3,
        )
    })
}

pub(crate) fn require_session(
    command: &str,
    store: &SessionStore,
) -> Result<Session, CommandResult> {
    match store.load() {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(CommandResult::failure(
            command,
            "session",
            "not signed in; run `payflow login <username> --password <password>`",
            4,
        )),
        Err(error) => Err(CommandResult::failure(
            command,
            "session",
            format!("session state is unreadable: {error}"),
            4,
        )),
    }
}

/// Convert a gateway failure into a command outcome. An authentication failure
/// tears the persisted session down regardless of which call tripped it.
pub(crate) fn gateway_failure(
    command: &str,
    store: &SessionStore,
    error: GatewayError,
) -> CommandResult {
    if error.is_auth() {
        if let Err(clear_error) = store.clear() {
            tracing::warn!(
                event_name = "session.clear_failed",
                error = %clear_error,
                "could not remove the stale session file"
            );
        }
        return CommandResult::failure(
            command,
            "authentication",
            format!("{}; session cleared, sign in again", error.message()),
            6,
        );
    }

    let (error_class, exit_code) = match &error {
        GatewayError::PermissionDenied { .. } => ("permission", 7),
        GatewayError::Validation { .. } => ("validation", 8),
        GatewayError::Conflict { .. } => ("conflict", 9),
        GatewayError::NotFound { .. } => ("not_found", 10),
        GatewayError::Transport(_) => ("transport", 5),
        GatewayError::Upstream { .. } => ("upstream", 5),
        GatewayError::Decode(_) => ("decode", 5),
        GatewayError::Unauthenticated { .. } => unreachable!("handled above"),
    };
    CommandResult::failure(command, error_class, error.message(), exit_code)
}

/// Shared two-phase slot upload used by the staff and finance workspaces. The
/// capability check runs against a freshly fetched copy so a stale local view
/// can never push into a populated slot.
pub(crate) fn run_slot_upload(
    command: &'static str,
    config: &AppConfig,
    id: i64,
    file: &std::path::Path,
    slot: payflow_core::DocumentSlot,
    allowed: impl Fn(&payflow_core::PurchaseRequest, &Session) -> bool,
    denial: &str,
) -> CommandResult {
    use payflow_core::RequestId;
    use payflow_gateway::{progress_sink, CloudStore, DocumentUploader, StoredFile, UploadError};

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

    // Storage must be configured before any transfer is attempted.
    let settings = match config.storage.require() {
        Ok(settings) => settings,
        Err(error) => {
            return CommandResult::failure(command, "config_validation", error.to_string(), 2)
        }
    };
    let cloud = match CloudStore::new(&settings) {
        Ok(cloud) => cloud,
        Err(error) => {
            return CommandResult::failure(command, "upload_transport", error.to_string(), 11)
        }
    };

    let staged = match StoredFile::from_path(file) {
        Ok(staged) => staged,
        Err(error) => {
            return CommandResult::failure(
                command,
                "io",
                format!("could not read `{}`: {error}", file.display()),
                4,
            )
        }
    };

    let detail = match runtime.block_on(gateway.request_detail(&session, RequestId(id))) {
        Ok(detail) => detail,
        Err(error) => return gateway_failure(command, &store, error),
    };
    if !allowed(&detail, &session) {
        return CommandResult::failure(command, "permission", denial, 7);
    }

    let file_name = staged.name.clone();
    let progress = progress_sink(move |pct| {
        tracing::info!(event_name = "upload.progress", file_name = %file_name, pct, "transferring");
    });

    let uploader = DocumentUploader::new(&cloud, &gateway);
    let url = match runtime.block_on(uploader.attach_slot(&session, &detail, slot, staged, progress))
    {
        Ok(url) => url,
        Err(UploadError::SlotOccupied { slot }) => {
            return CommandResult::failure(
                command,
                "validation",
                format!("slot `{slot}` already holds a document"),
                8,
            )
        }
        Err(UploadError::UnsupportedSlot { slot }) => {
            return CommandResult::failure(
                command,
                "validation",
                format!("slot `{slot}` is not uploaded from the client"),
                8,
            )
        }
        Err(UploadError::Transfer(error)) => {
            return CommandResult::failure(command, "upload_transport", error.to_string(), 11)
        }
        Err(UploadError::Association(error)) => {
            if error.is_auth() {
                return gateway_failure(command, &store, error);
            }
            return CommandResult::failure(command, "association", error.message(), 12);
        }
    };

    // Re-fetch so the reported state is the backend's, not our prediction.
    match runtime.block_on(gateway.request_detail(&session, RequestId(id))) {
        Ok(updated) => CommandResult::success_with_data(
            command,
            format!("document attached to request {id}"),
            serde_json::json!({
                "request_id": id,
                "slot": slot,
                "url": url,
                "status": updated.status,
            }),
        ),
        Err(error) => gateway_failure(command, &store, error),
    }
}
