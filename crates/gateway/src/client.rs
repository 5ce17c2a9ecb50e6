//! Typed bindings for the backend REST contract.
//!
//! The gateway is a stateless pass-through: it injects the bearer token from an
//! explicitly passed [`Session`], classifies non-success responses through the
//! error envelope, and decodes bodies into the core domain types. It never
//! caches; callers re-fetch after every mutation.

use std::time::Duration;

use reqwest::Method;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use payflow_core::config::ApiConfig;
use payflow_core::domain::approval::ApprovalHistoryEntry;
use payflow_core::domain::request::{NewRequest, PurchaseRequest, RequestId, RequestPatch};
use payflow_core::lifecycle::DecisionAction;
use payflow_core::session::Session;

use crate::error::GatewayError;

#[derive(Clone, Debug)]
pub struct Gateway {
    http: reqwest::Client,
    base_url: String,
}

/// Self-service sign-up payload. The backend only grants staff accounts this
/// way; approver and finance roles are provisioned out of band.
#[derive(Clone, Debug, Serialize)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    access: Option<String>,
    #[serde(default)]
    token: Option<String>,
    user: payflow_core::Identity,
}

impl AuthResponse {
    fn into_session(self) -> Result<Session, GatewayError> {
        let token = self
            .access
            .or(self.token)
            .ok_or_else(|| GatewayError::Decode("auth response carried no token".to_string()))?;
        Ok(Session::new(token, self.user))
    }
}

/// Collections arrive either bare or under a paginated `results` wrapper.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Collection<T> {
    Bare(Vec<T>),
    Paginated { results: Vec<T> },
}

impl<T> Collection<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            Self::Bare(items) | Self::Paginated { results: items } => items,
        }
    }
}

#[derive(Debug, Serialize)]
struct DecisionBody<'a> {
    decision: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    comments: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ExternalUrlBody<'a> {
    external_url: &'a str,
}

#[derive(Debug, Serialize)]
struct ExternalUrlsBody<'a> {
    external_urls: &'a [String],
}

#[derive(Debug, Serialize)]
struct CommentBody<'a> {
    comment: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: Option<String>,
}

impl Gateway {
    pub fn new(api: &ApiConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()?;
        Ok(Self { http, base_url: api.base_url.trim_end_matches('/').to_string() })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        session: Option<&Session>,
    ) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, self.endpoint(path));
        if let Some(session) = session {
            builder = builder.bearer_auth(session.token.expose_secret());
        }
        builder
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        context: &'static str,
    ) -> Result<T, GatewayError> {
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        if !(200..300).contains(&status) {
            let error = GatewayError::from_response(status, &body);
            tracing::warn!(
                event_name = "gateway.call.rejected",
                context,
                status,
                error = %error,
                "backend rejected the call"
            );
            return Err(error);
        }

        serde_json::from_str(&body)
            .map_err(|error| GatewayError::Decode(format!("{context}: {error}")))
    }

    async fn fetch_collection<T: DeserializeOwned>(
        &self,
        path: &str,
        session: &Session,
        context: &'static str,
    ) -> Result<Vec<T>, GatewayError> {
        let collection: Collection<T> =
            self.execute(self.request(Method::GET, path, Some(session)), context).await?;
        Ok(collection.into_items())
    }

    // -- auth ---------------------------------------------------------------

    pub async fn login(&self, username: &str, password: &str) -> Result<Session, GatewayError> {
        let body = serde_json::json!({ "username": username, "password": password });
        let response: AuthResponse = self
            .execute(self.request(Method::POST, "auth/login/", None).json(&body), "auth.login")
            .await?;
        response.into_session()
    }

    pub async fn register(&self, account: &NewAccount) -> Result<Session, GatewayError> {
        let response: AuthResponse = self
            .execute(self.request(Method::POST, "auth/register/", None).json(account), "auth.register")
            .await?;
        response.into_session()
    }

    // -- staff --------------------------------------------------------------

    pub async fn list_my_requests(
        &self,
        session: &Session,
    ) -> Result<Vec<PurchaseRequest>, GatewayError> {
        self.fetch_collection("requests/", session, "requests.list").await
    }

    pub async fn request_detail(
        &self,
        session: &Session,
        id: RequestId,
    ) -> Result<PurchaseRequest, GatewayError> {
        self.execute(
            self.request(Method::GET, &format!("requests/{id}/"), Some(session)),
            "requests.detail",
        )
        .await
    }

    pub async fn create_request(
        &self,
        session: &Session,
        request: &NewRequest,
    ) -> Result<PurchaseRequest, GatewayError> {
        let correlation_id = Uuid::new_v4();
        let created: PurchaseRequest = self
            .execute(
                self.request(Method::POST, "requests/", Some(session)).json(request),
                "requests.create",
            )
            .await?;
        tracing::info!(
            event_name = "gateway.request.created",
            correlation_id = %correlation_id,
            request_id = %created.id,
            "purchase request created"
        );
        Ok(created)
    }

    pub async fn update_request(
        &self,
        session: &Session,
        id: RequestId,
        patch: &RequestPatch,
    ) -> Result<PurchaseRequest, GatewayError> {
        self.execute(
            self.request(Method::PATCH, &format!("requests/{id}/"), Some(session)).json(patch),
            "requests.update",
        )
        .await
    }

    pub async fn add_comment(
        &self,
        session: &Session,
        id: RequestId,
        comment: &str,
    ) -> Result<Ack, GatewayError> {
        self.execute(
            self.request(Method::POST, &format!("requests/{id}/add-comment/"), Some(session))
                .json(&CommentBody { comment }),
            "requests.add_comment",
        )
        .await
    }

    // -- approver -----------------------------------------------------------

    pub async fn pending_queue(
        &self,
        session: &Session,
    ) -> Result<Vec<PurchaseRequest>, GatewayError> {
        self.fetch_collection("requests/pending/", session, "requests.pending").await
    }

    pub async fn my_approvals(
        &self,
        session: &Session,
    ) -> Result<Vec<ApprovalHistoryEntry>, GatewayError> {
        self.fetch_collection("requests/my-approvals/", session, "requests.my_approvals").await
    }

    pub async fn decide(
        &self,
        session: &Session,
        id: RequestId,
        action: DecisionAction,
        comments: Option<&str>,
    ) -> Result<PurchaseRequest, GatewayError> {
        let path = match action {
            DecisionAction::Approve => format!("requests/{id}/approve/"),
            DecisionAction::Reject => format!("requests/{id}/reject/"),
        };
        let body = DecisionBody { decision: action.decision().as_str(), comments };

        let correlation_id = Uuid::new_v4();
        let updated: PurchaseRequest = self
            .execute(
                self.request(Method::PATCH, &path, Some(session)).json(&body),
                "requests.decide",
            )
            .await?;
        tracing::info!(
            event_name = "gateway.request.decided",
            correlation_id = %correlation_id,
            request_id = %id,
            decision = body.decision,
            status = %updated.status,
            "approval decision recorded"
        );
        Ok(updated)
    }

    // -- finance ------------------------------------------------------------

    pub async fn approved_requests(
        &self,
        session: &Session,
    ) -> Result<Vec<PurchaseRequest>, GatewayError> {
        self.fetch_collection("requests/approved/", session, "requests.approved").await
    }

    pub async fn rejected_requests(
        &self,
        session: &Session,
    ) -> Result<Vec<PurchaseRequest>, GatewayError> {
        self.fetch_collection("requests/rejected/", session, "requests.rejected").await
    }

    pub async fn finance_pending_requests(
        &self,
        session: &Session,
    ) -> Result<Vec<PurchaseRequest>, GatewayError> {
        self.fetch_collection("requests/finance-pending/", session, "requests.finance_pending")
            .await
    }

    pub async fn add_finance_comment(
        &self,
        session: &Session,
        id: RequestId,
        comment: &str,
    ) -> Result<Ack, GatewayError> {
        self.execute(
            self.request(Method::POST, &format!("requests/{id}/finance-comment/"), Some(session))
                .json(&CommentBody { comment }),
            "requests.finance_comment",
        )
        .await
    }

    // -- document association -----------------------------------------------

    pub async fn submit_receipt(
        &self,
        session: &Session,
        id: RequestId,
        external_url: &str,
    ) -> Result<Ack, GatewayError> {
        self.execute(
            self.request(Method::POST, &format!("requests/{id}/submit-receipt/"), Some(session))
                .json(&ExternalUrlBody { external_url }),
            "requests.submit_receipt",
        )
        .await
    }

    pub async fn upload_proforma(
        &self,
        session: &Session,
        id: RequestId,
        external_url: &str,
    ) -> Result<Ack, GatewayError> {
        self.execute(
            self.request(Method::POST, &format!("requests/{id}/upload-proforma/"), Some(session))
                .json(&ExternalUrlBody { external_url }),
            "requests.upload_proforma",
        )
        .await
    }

    pub async fn upload_attachments(
        &self,
        session: &Session,
        id: RequestId,
        external_urls: &[String],
    ) -> Result<Ack, GatewayError> {
        self.execute(
            self.request(Method::POST, &format!("requests/{id}/upload-attachments/"), Some(session))
                .json(&ExternalUrlsBody { external_urls }),
            "requests.upload_attachments",
        )
        .await
    }
}
