use serde_json::json;

use payflow_core::config::AppConfig;
use payflow_core::session::Session;
use payflow_gateway::NewAccount;

use crate::commands::{gateway, gateway_failure, require_session, runtime, session_store, CommandResult};

fn session_data(session: &Session) -> serde_json::Value {
    json!({
        "username": session.user.username,
        "role": session.user.role,
        "landing": session.landing_route(),
    })
}

fn persist_and_report(command: &str, config: &AppConfig, session: Session) -> CommandResult {
    let store = session_store(config);
    if let Err(error) = store.save(&session) {
        return CommandResult::failure(
            command,
            "session",
            format!("signed in but could not persist the session: {error}"),
            4,
        );
    }

    tracing::info!(
        event_name = "auth.session_established",
        username = %session.user.username,
        role = %session.user.role,
        "session persisted"
    );
    CommandResult::success_with_data(
        command,
        format!("signed in as {}", session.user.username),
        session_data(&session),
    )
}

pub fn login(config: &AppConfig, username: &str, password: &str) -> CommandResult {
    const COMMAND: &str = "login";

    let runtime = match runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    let gateway = match gateway(COMMAND, config) {
        Ok(gateway) => gateway,
        Err(failure) => return failure,
    };

    match runtime.block_on(gateway.login(username, password)) {
        Ok(session) => persist_and_report(COMMAND, config, session),
        Err(error) => gateway_failure(COMMAND, &session_store(config), error),
    }
}

pub fn register(
    config: &AppConfig,
    username: String,
    email: String,
    password: String,
    confirm_password: String,
) -> CommandResult {
    const COMMAND: &str = "register";

    if password != confirm_password {
        return CommandResult::failure(COMMAND, "validation", "passwords do not match", 8);
    }

    let runtime = match runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    let gateway = match gateway(COMMAND, config) {
        Ok(gateway) => gateway,
        Err(failure) => return failure,
    };

    let account = NewAccount { username, email, password, confirm_password };
    match runtime.block_on(gateway.register(&account)) {
        Ok(session) => persist_and_report(COMMAND, config, session),
        Err(error) => gateway_failure(COMMAND, &session_store(config), error),
    }
}

pub fn logout(config: &AppConfig) -> CommandResult {
    const COMMAND: &str = "logout";

    let store = session_store(config);
    match store.clear() {
        Ok(()) => CommandResult::success(COMMAND, "session removed"),
        Err(error) => CommandResult::failure(
            COMMAND,
            "session",
            format!("could not remove the session file: {error}"),
            4,
        ),
    }
}

pub fn whoami(config: &AppConfig) -> CommandResult {
    const COMMAND: &str = "whoami";

    let store = session_store(config);
    match require_session(COMMAND, &store) {
        Ok(session) => CommandResult::success_with_data(
            COMMAND,
            format!("signed in as {}", session.user.username),
            session_data(&session),
        ),
        Err(failure) => failure,
    }
}
