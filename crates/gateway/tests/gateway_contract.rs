//! Contract tests for the gateway against an in-process stub backend.
//!
//! The stub replicates just enough of the REST contract to exercise the client
//! end to end: bearer auth, the paginated collection wrapper, the approval
//! ladder guards, and the three error-envelope shapes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use payflow_core::config::ApiConfig;
use payflow_core::lifecycle::DecisionAction;
use payflow_core::{NewRequest, RequestId, RequestStatus, Role};
use payflow_gateway::{Gateway, GatewayError};
use rust_decimal::Decimal;

#[derive(Clone, Default)]
struct StubState {
    requests: Arc<Mutex<Vec<Value>>>,
    next_id: Arc<AtomicI64>,
}

type StubReply = (StatusCode, Json<Value>);

fn envelope(status: StatusCode, detail: Value) -> StubReply {
    (status, Json(json!({ "error": { "detail": detail, "status_code": status.as_u16() } })))
}

fn users() -> HashMap<&'static str, Value> {
    HashMap::from([
        ("amina", json!({ "username": "amina", "role": "staff" })),
        ("lead-1", json!({ "username": "lead-1", "role": "approver_level_1" })),
        ("lead-2", json!({ "username": "lead-2", "role": "approver_level_2" })),
        ("joy", json!({ "username": "joy", "role": "finance" })),
        // Provisioning bug stand-in: account with no role claim at all.
        ("ghost", json!({ "username": "ghost" })),
    ])
}

fn identify(headers: &HeaderMap) -> Result<Value, StubReply> {
    let token = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            envelope(
                StatusCode::UNAUTHORIZED,
                json!({ "detail": "Authentication credentials were not provided." }),
            )
        })?;

    let username = token.strip_prefix("jwt-").unwrap_or_default();
    users().get(username).cloned().ok_or_else(|| {
        envelope(
            StatusCode::UNAUTHORIZED,
            json!({ "detail": "Given token not valid for any token type" }),
        )
    })
}

async fn login(Json(body): Json<Value>) -> StubReply {
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    match users().get(username) {
        Some(user) if password == "pw" => (
            StatusCode::OK,
            Json(json!({
                "access": format!("jwt-{username}"),
                "refresh": "jwt-refresh",
                "user": user,
            })),
        ),
        _ => envelope(
            StatusCode::UNAUTHORIZED,
            json!({ "detail": "No active account found with the given credentials" }),
        ),
    }
}

async fn list_requests(State(state): State<StubState>, headers: HeaderMap) -> StubReply {
    let user = match identify(&headers) {
        Ok(user) => user,
        Err(reply) => return reply,
    };
    let username = user["username"].as_str().unwrap_or_default().to_string();

    let requests = state.requests.lock().unwrap();
    let own: Vec<Value> = requests
        .iter()
        .filter(|request| request["created_by"]["username"] == json!(username))
        .cloned()
        .collect();

    // Paginated wrapper, as DRF would emit it.
    (StatusCode::OK, Json(json!({ "count": own.len(), "next": null, "results": own })))
}

async fn create_request(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StubReply {
    let user = match identify(&headers) {
        Ok(user) => user,
        Err(reply) => return reply,
    };

    let amount = body["amount"].as_str().and_then(|raw| raw.parse::<f64>().ok()).or(body["amount"].as_f64());
    if amount.map(|value| value < 0.0).unwrap_or(true) {
        return envelope(
            StatusCode::BAD_REQUEST,
            json!({ "amount": ["Ensure this value is greater than or equal to 0."] }),
        );
    }

    let id = state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
    let request = json!({
        "id": id,
        "title": body["title"],
        "description": body["description"],
        "amount": body["amount"],
        "supplier": body["supplier"],
        "status": "PENDING",
        "current_level": 1,
        "created_by": user,
        "created_at": "2026-03-01T09:00:00Z",
        "updated_at": "2026-03-01T09:00:00Z",
        "approvals": [],
        "attachments": [],
    });
    state.requests.lock().unwrap().push(request.clone());
    (StatusCode::CREATED, Json(request))
}

async fn request_detail(
    State(state): State<StubState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> StubReply {
    if let Err(reply) = identify(&headers) {
        return reply;
    }

    let requests = state.requests.lock().unwrap();
    match requests.iter().find(|request| request["id"] == json!(id)) {
        Some(request) => (StatusCode::OK, Json(request.clone())),
        None => envelope(StatusCode::NOT_FOUND, json!("Not found.")),
    }
}

async fn pending_queue(State(state): State<StubState>, headers: HeaderMap) -> StubReply {
    let user = match identify(&headers) {
        Ok(user) => user,
        Err(reply) => return reply,
    };
    let level = match user["role"].as_str() {
        Some("approver_level_1") => 1,
        Some("approver_level_2") => 2,
        _ => {
            return envelope(
                StatusCode::FORBIDDEN,
                json!({ "detail": "You do not have permission to perform this action." }),
            )
        }
    };

    let requests = state.requests.lock().unwrap();
    let queue: Vec<Value> = requests
        .iter()
        .filter(|request| {
            request["status"] == json!("PENDING") && request["current_level"] == json!(level)
        })
        .cloned()
        .collect();
    (StatusCode::OK, Json(json!(queue)))
}

async fn decide(
    state: StubState,
    id: i64,
    headers: HeaderMap,
    body: Value,
    decision: &str,
) -> StubReply {
    let user = match identify(&headers) {
        Ok(user) => user,
        Err(reply) => return reply,
    };

    let mut requests = state.requests.lock().unwrap();
    let Some(request) = requests.iter_mut().find(|request| request["id"] == json!(id)) else {
        return envelope(StatusCode::NOT_FOUND, json!("Not found."));
    };

    if request["status"] != json!("PENDING") {
        return envelope(StatusCode::BAD_REQUEST, json!("Request already finalized."));
    }

    let current_level = request["current_level"].as_i64().unwrap_or(1);
    let expected_role = if current_level == 1 { "approver_level_1" } else { "approver_level_2" };
    if user["role"] != json!(expected_role) {
        return envelope(
            StatusCode::FORBIDDEN,
            json!("You are not assigned to this approval level."),
        );
    }

    let approval = json!({
        "id": id * 10 + current_level,
        "level": current_level,
        "approver": user,
        "decision": decision,
        "comments": body["comments"].as_str().unwrap_or(""),
        "decided_at": "2026-03-02T10:00:00Z",
    });
    request["approvals"].as_array_mut().unwrap().push(approval);

    if decision == "REJECTED" {
        request["status"] = json!("REJECTED");
    } else if current_level >= 2 {
        request["status"] = json!("APPROVED");
        request["approved_at"] = json!("2026-03-02T10:00:00Z");
    } else {
        request["current_level"] = json!(current_level + 1);
    }
    request["updated_at"] = json!("2026-03-02T10:00:00Z");

    (StatusCode::OK, Json(request.clone()))
}

async fn approve(
    State(state): State<StubState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StubReply {
    decide(state, id, headers, body, "APPROVED").await
}

async fn reject(
    State(state): State<StubState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StubReply {
    decide(state, id, headers, body, "REJECTED").await
}

async fn approved_requests(State(state): State<StubState>, headers: HeaderMap) -> StubReply {
    if let Err(reply) = identify(&headers) {
        return reply;
    }
    let requests = state.requests.lock().unwrap();
    let approved: Vec<Value> =
        requests.iter().filter(|request| request["status"] == json!("APPROVED")).cloned().collect();
    (StatusCode::OK, Json(json!(approved)))
}

async fn submit_receipt(
    State(state): State<StubState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StubReply {
    if let Err(reply) = identify(&headers) {
        return reply;
    }

    let mut requests = state.requests.lock().unwrap();
    let Some(request) = requests.iter_mut().find(|request| request["id"] == json!(id)) else {
        return envelope(StatusCode::NOT_FOUND, json!("Not found."));
    };

    if request["receipt"].is_string() {
        return envelope(StatusCode::BAD_REQUEST, json!("Receipt already uploaded."));
    }
    request["receipt"] = body["external_url"].clone();
    (StatusCode::OK, Json(json!({ "message": "Receipt submitted" })))
}

async fn my_approvals(State(state): State<StubState>, headers: HeaderMap) -> StubReply {
    let user = match identify(&headers) {
        Ok(user) => user,
        Err(reply) => return reply,
    };

    let requests = state.requests.lock().unwrap();
    let mut entries = Vec::new();
    for request in requests.iter() {
        for approval in request["approvals"].as_array().into_iter().flatten() {
            if approval["approver"]["username"] == user["username"] {
                let mut entry = approval.clone();
                entry["request"] = json!({
                    "id": request["id"],
                    "title": request["title"],
                    "description": request["description"],
                    "status": request["status"],
                });
                entries.push(entry);
            }
        }
    }
    (StatusCode::OK, Json(json!(entries)))
}

async fn spawn_stub() -> Result<Gateway> {
    let state = StubState::default();
    let app = Router::new()
        .route("/api/auth/login/", post(login))
        .route("/api/requests/", get(list_requests).post(create_request))
        .route("/api/requests/pending/", get(pending_queue))
        .route("/api/requests/approved/", get(approved_requests))
        .route("/api/requests/my-approvals/", get(my_approvals))
        .route("/api/requests/{id}/", get(request_detail))
        .route("/api/requests/{id}/approve/", patch(approve))
        .route("/api/requests/{id}/reject/", patch(reject))
        .route("/api/requests/{id}/submit-receipt/", post(submit_receipt))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(Gateway::new(&ApiConfig {
        base_url: format!("http://{address}/api"),
        timeout_secs: 5,
    })?)
}

fn laptops() -> NewRequest {
    NewRequest::new("Laptops", "Three developer laptops", Decimal::new(1200, 0), None)
        .expect("valid request")
}

#[tokio::test]
async fn full_ladder_scenario_approve_then_reject() -> Result<()> {
    let gateway = spawn_stub().await?;

    let staff = gateway.login("amina", "pw").await?;
    let created = gateway.create_request(&staff, &laptops()).await?;
    assert_eq!(created.status, RequestStatus::Pending);
    assert_eq!(created.current_level.as_u8(), 1);
    assert!(created.approvals.is_empty());

    let lead_one = gateway.login("lead-1", "pw").await?;
    let queue = gateway.pending_queue(&lead_one).await?;
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].title, "Laptops");

    let after_first = gateway
        .decide(&lead_one, created.id, DecisionAction::Approve, Some("ok"))
        .await?;
    assert_eq!(after_first.status, RequestStatus::Pending);
    assert_eq!(after_first.current_level.as_u8(), 2);
    assert_eq!(after_first.approvals.len(), 1);

    // Level one's queue no longer offers the request after a re-fetch.
    assert!(gateway.pending_queue(&lead_one).await?.is_empty());

    let lead_two = gateway.login("lead-2", "pw").await?;
    let rejected = gateway
        .decide(&lead_two, created.id, DecisionAction::Reject, Some("too expensive"))
        .await?;
    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert_eq!(rejected.approvals.len(), 2);
    assert_eq!(rejected.approvals[1].comments, "too expensive");

    let history = gateway.my_approvals(&lead_two).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].request.as_ref().map(|digest| digest.title.as_str()), Some("Laptops"));
    Ok(())
}

#[tokio::test]
async fn wrong_level_approver_receives_a_guard_violation() -> Result<()> {
    let gateway = spawn_stub().await?;
    let staff = gateway.login("amina", "pw").await?;
    let created = gateway.create_request(&staff, &laptops()).await?;

    let lead_two = gateway.login("lead-2", "pw").await?;
    let error = gateway
        .decide(&lead_two, created.id, DecisionAction::Approve, None)
        .await
        .expect_err("level two cannot decide at level one");

    match error {
        GatewayError::PermissionDenied { message } => {
            assert_eq!(message, "You are not assigned to this approval level.");
        }
        other => panic!("expected permission denial, got {other:?}"),
    }

    // No state change: the request is still pending at level one.
    let detail = gateway.request_detail(&staff, created.id).await?;
    assert_eq!(detail.current_level.as_u8(), 1);
    assert!(detail.approvals.is_empty());
    Ok(())
}

#[tokio::test]
async fn decision_on_finalized_request_is_a_validation_failure() -> Result<()> {
    let gateway = spawn_stub().await?;
    let staff = gateway.login("amina", "pw").await?;
    let created = gateway.create_request(&staff, &laptops()).await?;

    let lead_one = gateway.login("lead-1", "pw").await?;
    gateway.decide(&lead_one, created.id, DecisionAction::Reject, None).await?;

    let error = gateway
        .decide(&lead_one, created.id, DecisionAction::Approve, None)
        .await
        .expect_err("finalized request refuses further decisions");
    match error {
        GatewayError::Validation { message } => {
            assert_eq!(message, "Request already finalized.");
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn invalid_token_maps_to_an_authentication_error() -> Result<()> {
    let gateway = spawn_stub().await?;
    let mut session = gateway.login("amina", "pw").await?;
    session.token = String::from("jwt-expired").into();

    let error = gateway.list_my_requests(&session).await.expect_err("stale token must fail");
    assert!(error.is_auth());
    Ok(())
}

#[tokio::test]
async fn bad_credentials_surface_the_nested_envelope_detail() -> Result<()> {
    let gateway = spawn_stub().await?;
    let error = gateway.login("amina", "wrong").await.expect_err("bad password");

    match error {
        GatewayError::Unauthenticated { message } => {
            assert_eq!(message, "No active account found with the given credentials");
        }
        other => panic!("expected authentication error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn login_without_role_claim_falls_back_to_staff_landing() -> Result<()> {
    let gateway = spawn_stub().await?;
    let session = gateway.login("ghost", "pw").await?;
    assert_eq!(session.user.role, Role::Staff);
    assert_eq!(session.landing_route(), "/staff");
    Ok(())
}

#[tokio::test]
async fn staff_list_unwraps_the_paginated_results_wrapper() -> Result<()> {
    let gateway = spawn_stub().await?;
    let staff = gateway.login("amina", "pw").await?;
    gateway.create_request(&staff, &laptops()).await?;

    let own = gateway.list_my_requests(&staff).await?;
    assert_eq!(own.len(), 1);

    // Another staff member sees none of them.
    let other = gateway.login("ghost", "pw").await?;
    assert!(gateway.list_my_requests(&other).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn field_map_validation_errors_surface_their_first_message() -> Result<()> {
    let gateway = spawn_stub().await?;
    let staff = gateway.login("amina", "pw").await?;

    // Bypass the client-side constructor guard to exercise the wire shape.
    let mut negative = laptops();
    negative.amount = Decimal::new(-5, 0);

    let error =
        gateway.create_request(&staff, &negative).await.expect_err("backend rejects the amount");
    match error {
        GatewayError::Validation { message } => {
            assert_eq!(message, "Ensure this value is greater than or equal to 0.");
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn receipt_slot_is_append_once_on_the_backend_too() -> Result<()> {
    let gateway = spawn_stub().await?;
    let staff = gateway.login("amina", "pw").await?;
    let created = gateway.create_request(&staff, &laptops()).await?;

    let lead_one = gateway.login("lead-1", "pw").await?;
    gateway.decide(&lead_one, created.id, DecisionAction::Approve, None).await?;
    let lead_two = gateway.login("lead-2", "pw").await?;
    gateway.decide(&lead_two, created.id, DecisionAction::Approve, None).await?;

    let finance = gateway.login("joy", "pw").await?;
    gateway
        .submit_receipt(&finance, created.id, "https://files.example/receipt.pdf")
        .await?;

    let error = gateway
        .submit_receipt(&finance, created.id, "https://files.example/other.pdf")
        .await
        .expect_err("second receipt must be refused");
    assert!(matches!(error, GatewayError::Validation { .. }));

    let detail = gateway.request_detail(&finance, created.id).await?;
    assert_eq!(detail.receipt.as_deref(), Some("https://files.example/receipt.pdf"));

    let approved = gateway.approved_requests(&finance).await?;
    assert_eq!(approved.len(), 1);
    Ok(())
}

#[tokio::test]
async fn missing_request_detail_is_not_found() -> Result<()> {
    let gateway = spawn_stub().await?;
    let staff = gateway.login("amina", "pw").await?;

    let error = gateway
        .request_detail(&staff, RequestId(404))
        .await
        .expect_err("unknown id should be not found");
    assert!(matches!(error, GatewayError::NotFound { .. }));
    Ok(())
}
