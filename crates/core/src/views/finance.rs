use serde::{Deserialize, Serialize};

use crate::domain::request::{DocumentSlot, PurchaseRequest, RequestStatus};

/// The finance dashboard: every request, split into the three finance queues.
/// `awaiting_approval` is view-only; actions exist only on approved requests.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FinanceBoard {
    pub approved: Vec<PurchaseRequest>,
    pub rejected: Vec<PurchaseRequest>,
    pub awaiting_approval: Vec<PurchaseRequest>,
}

impl FinanceBoard {
    pub fn partition(requests: Vec<PurchaseRequest>) -> Self {
        let mut board = Self::default();
        for request in requests {
            match request.status {
                RequestStatus::Approved => board.approved.push(request),
                RequestStatus::Rejected => board.rejected.push(request),
                RequestStatus::Pending => board.awaiting_approval.push(request),
            }
        }
        board
    }
}

/// Actions the finance view may offer for one request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinanceCapabilities {
    pub can_upload_receipt: bool,
    pub can_comment: bool,
    pub can_generate_po: bool,
}

pub fn capabilities(request: &PurchaseRequest) -> FinanceCapabilities {
    let approved = request.status == RequestStatus::Approved;
    FinanceCapabilities {
        can_upload_receipt: approved && request.slot_is_empty(DocumentSlot::Receipt),
        can_comment: approved,
        can_generate_po: approved,
    }
}
