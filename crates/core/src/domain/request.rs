use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::approval::Approval;
use crate::domain::identity::{ApprovalLevel, Identity, Role};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub i64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        };
        f.write_str(label)
    }
}

/// Named, append-once document slots on a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSlot {
    Proforma,
    Receipt,
    PurchaseOrderFile,
}

impl DocumentSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proforma => "proforma",
            Self::Receipt => "receipt",
            Self::PurchaseOrderFile => "purchase_order_file",
        }
    }
}

impl std::fmt::Display for DocumentSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generic attachment reference hosted on the external object store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    #[serde(default)]
    pub external_url: Option<String>,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// A free-text note (staff or finance thread) with author and timestamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub author: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// A staff-submitted purchase request moving through the approval ladder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub id: RequestId,
    pub title: String,
    pub description: String,
    pub amount: Decimal,
    #[serde(default)]
    pub supplier: Option<String>,
    pub status: RequestStatus,
    pub current_level: ApprovalLevel,
    pub created_by: Identity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub proforma: Option<String>,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub purchase_order_file: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub approvals: Vec<Approval>,
    #[serde(default)]
    pub comments: Vec<Note>,
    #[serde(default)]
    pub finance_comments: Vec<Note>,
}

impl PurchaseRequest {
    pub fn is_finalized(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn owned_by(&self, identity: &Identity) -> bool {
        self.created_by.username == identity.username
    }

    /// Staff may edit their own request only while it is pending or rejected.
    /// Editing a rejected request leaves its status untouched.
    pub fn editable_by(&self, identity: &Identity) -> bool {
        identity.role == Role::Staff
            && self.owned_by(identity)
            && matches!(self.status, RequestStatus::Pending | RequestStatus::Rejected)
    }

    pub fn document(&self, slot: DocumentSlot) -> Option<&str> {
        let value = match slot {
            DocumentSlot::Proforma => &self.proforma,
            DocumentSlot::Receipt => &self.receipt,
            DocumentSlot::PurchaseOrderFile => &self.purchase_order_file,
        };
        value.as_deref()
    }

    pub fn slot_is_empty(&self, slot: DocumentSlot) -> bool {
        self.document(slot).is_none()
    }

    pub fn approval_at(&self, level: ApprovalLevel) -> Option<&Approval> {
        self.approvals.iter().find(|approval| approval.level == level)
    }
}

/// Payload for creating a request. Construction validates what the form would.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewRequest {
    pub title: String,
    pub description: String,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
}

impl NewRequest {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        amount: Decimal,
        supplier: Option<String>,
    ) -> Result<Self, DomainError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(DomainError::InvariantViolation("request title must not be empty".into()));
        }
        if amount < Decimal::ZERO {
            return Err(DomainError::InvariantViolation(format!(
                "request amount must be non-negative, got {amount}"
            )));
        }

        Ok(Self { title, description: description.into(), amount, supplier })
    }
}

/// Partial edit of the staff-mutable fields. Unset fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RequestPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
}

impl RequestPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.amount.is_none()
            && self.supplier.is_none()
    }
}

/// Deterministic request fixtures shared by tests across the workspace.
pub mod fixtures {
    use chrono::TimeZone;

    use super::*;

    pub fn staff() -> Identity {
        Identity::new("amina", Role::Staff)
    }

    pub fn request(id: i64, status: RequestStatus, level: ApprovalLevel) -> PurchaseRequest {
        let created_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        PurchaseRequest {
            id: RequestId(id),
            title: format!("Request {id}"),
            description: "Replacement hardware".to_string(),
            amount: Decimal::new(120_000, 2),
            supplier: None,
            status,
            current_level: level,
            created_by: staff(),
            created_at,
            updated_at: created_at,
            approved_at: None,
            proforma: None,
            receipt: None,
            purchase_order_file: None,
            attachments: Vec::new(),
            approvals: Vec::new(),
            comments: Vec::new(),
            finance_comments: Vec::new(),
        }
    }
}
