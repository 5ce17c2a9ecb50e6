use serde::{Deserialize, Serialize};

use crate::domain::identity::{Identity, Role};
use crate::domain::request::{DocumentSlot, PurchaseRequest, RequestStatus};

/// The staff dashboard: the viewer's own requests partitioned by status.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StaffBoard {
    pub pending: Vec<PurchaseRequest>,
    pub approved: Vec<PurchaseRequest>,
    pub rejected: Vec<PurchaseRequest>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
}

impl StaffBoard {
    /// Keep only the viewer's requests and split them into the three tabs.
    /// Non-staff viewers get an empty board.
    pub fn project(requests: Vec<PurchaseRequest>, viewer: &Identity) -> Self {
        let mut board = Self::default();
        if viewer.role != Role::Staff {
            return board;
        }

        for request in requests.into_iter().filter(|request| request.owned_by(viewer)) {
            match request.status {
                RequestStatus::Pending => board.pending.push(request),
                RequestStatus::Approved => board.approved.push(request),
                RequestStatus::Rejected => board.rejected.push(request),
            }
        }
        board
    }

    pub fn counts(&self) -> StatusCounts {
        StatusCounts {
            pending: self.pending.len(),
            approved: self.approved.len(),
            rejected: self.rejected.len(),
        }
    }
}

/// Actions the staff view may offer for one request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffCapabilities {
    pub can_edit: bool,
    pub can_upload_proforma: bool,
    pub can_upload_receipt: bool,
    pub can_comment: bool,
}

/// Uploads are offered only while pending and only into an empty slot; a
/// populated slot withdraws its control permanently.
pub fn capabilities(request: &PurchaseRequest, viewer: &Identity) -> StaffCapabilities {
    let owner = viewer.role == Role::Staff && request.owned_by(viewer);
    if !owner {
        return StaffCapabilities::default();
    }

    let pending = request.status == RequestStatus::Pending;
    StaffCapabilities {
        can_edit: request.editable_by(viewer),
        can_upload_proforma: pending && request.slot_is_empty(DocumentSlot::Proforma),
        can_upload_receipt: pending && request.slot_is_empty(DocumentSlot::Receipt),
        can_comment: true,
    }
}
