use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::identity::{ApprovalLevel, Identity};
use crate::domain::request::{RequestId, RequestStatus};

/// Outcome of a single level's decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    #[serde(rename = "APPROVED")]
    Approved,
    #[serde(rename = "REJECTED")]
    Rejected,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One level's decision record on a purchase request.
///
/// `decision` and `decided_at` stay empty until the level acts; `id` is absent on
/// records predicted locally before the backend has confirmed them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub level: ApprovalLevel,
    #[serde(default)]
    pub approver: Option<Identity>,
    #[serde(default)]
    pub decision: Option<Decision>,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub decided_at: Option<DateTime<Utc>>,
}

impl Approval {
    pub fn is_decided(&self) -> bool {
        self.decision.is_some()
    }
}

/// Slimmed request fields carried alongside an approver's history entries so the
/// history view can render without a second fetch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestDigest {
    pub id: RequestId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: RequestStatus,
    #[serde(default)]
    pub proforma: Option<String>,
}

/// An entry in the "my approvals" history feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalHistoryEntry {
    #[serde(flatten)]
    pub approval: Approval,
    #[serde(default)]
    pub request: Option<RequestDigest>,
}

impl ApprovalHistoryEntry {
    pub fn decision(&self) -> Option<Decision> {
        self.approval.decision
    }
}
