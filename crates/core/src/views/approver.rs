use serde::{Deserialize, Serialize};

use crate::domain::approval::{ApprovalHistoryEntry, Decision};
use crate::domain::identity::Identity;
use crate::domain::request::{PurchaseRequest, RequestStatus};
use crate::lifecycle;

/// Requests awaiting this approver: pending and sitting at their level.
///
/// The backend already scopes `/requests/pending/` server-side; this filter is
/// the client's mirror so stale collections never show an actionable row.
pub fn pending_queue<'a>(
    requests: &'a [PurchaseRequest],
    approver: &Identity,
) -> Vec<&'a PurchaseRequest> {
    let Some(level) = approver.role.approval_level() else {
        return Vec::new();
    };

    requests
        .iter()
        .filter(|request| request.status == RequestStatus::Pending && request.current_level == level)
        .collect()
}

/// Whether the approve/reject controls should be offered for a request.
pub fn can_decide(request: &PurchaseRequest, approver: &Identity) -> bool {
    lifecycle::authorize_decision(request, approver).is_ok()
}

/// History tab filter over the approver's own decisions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionFilter {
    #[default]
    All,
    Approved,
    Rejected,
}

impl DecisionFilter {
    fn matches(&self, decision: Option<Decision>) -> bool {
        match self {
            Self::All => true,
            Self::Approved => decision == Some(Decision::Approved),
            Self::Rejected => decision == Some(Decision::Rejected),
        }
    }
}

impl std::str::FromStr for DecisionFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown decision filter `{other}` (expected all|approved|rejected)")),
        }
    }
}

pub fn filter_history(
    entries: &[ApprovalHistoryEntry],
    filter: DecisionFilter,
) -> Vec<&ApprovalHistoryEntry> {
    entries.iter().filter(|entry| filter.matches(entry.decision())).collect()
}
