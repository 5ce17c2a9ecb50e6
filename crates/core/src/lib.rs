pub mod config;
pub mod domain;
pub mod envelope;
pub mod errors;
pub mod lifecycle;
pub mod session;
pub mod views;

pub use domain::approval::{Approval, ApprovalHistoryEntry, Decision, RequestDigest};
pub use domain::identity::{ApprovalLevel, Identity, Role};
pub use domain::request::{
    Attachment, DocumentSlot, NewRequest, Note, PurchaseRequest, RequestId, RequestPatch,
    RequestStatus,
};
pub use envelope::extract_message;
pub use errors::DomainError;
pub use lifecycle::{DecisionAction, LifecycleError, LifecycleState, TransitionOutcome};
pub use session::{Session, SessionError, SessionStore};
pub use views::approver::DecisionFilter;
pub use views::finance::FinanceBoard;
pub use views::staff::StaffBoard;
