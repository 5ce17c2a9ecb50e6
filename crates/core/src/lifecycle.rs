//! Client-side mirror of the request approval state machine.
//!
//! The backend is the authority on every transition; these predicates exist so
//! the client never offers an action the backend would refuse, and so tests can
//! exercise the ladder without a network. Everything here is pure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::approval::{Approval, Decision};
use crate::domain::identity::{ApprovalLevel, Identity, Role};
use crate::domain::request::{PurchaseRequest, RequestStatus};

/// The states a request moves through. `Pending` carries the level currently
/// awaiting a decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Pending(ApprovalLevel),
    Approved,
    Rejected,
}

impl LifecycleState {
    pub fn of(request: &PurchaseRequest) -> Self {
        match request.status {
            RequestStatus::Pending => Self::Pending(request.current_level),
            RequestStatus::Approved => Self::Approved,
            RequestStatus::Rejected => Self::Rejected,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionAction {
    Approve,
    Reject,
}

impl DecisionAction {
    pub fn decision(&self) -> Decision {
        match self {
            Self::Approve => Decision::Approved,
            Self::Reject => Decision::Rejected,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("request is already finalized as {status}")]
    AlreadyFinalized { status: RequestStatus },
    #[error("role `{role}` does not decide approvals")]
    RoleCannotDecide { role: Role },
    #[error("decision belongs to level {current}, not level {acting}")]
    WrongLevel { acting: ApprovalLevel, current: ApprovalLevel },
    #[error("level {level} has already recorded a decision")]
    LevelAlreadyDecided { level: ApprovalLevel },
}

/// Result of a legal transition: the state moved between and the approval record
/// appended along the way.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: LifecycleState,
    pub to: LifecycleState,
    pub recorded: Approval,
}

/// Guard for an approve/reject action: the request must still be pending, the
/// actor's role must decide at the request's current level, and that level must
/// not have a recorded decision yet. Returns the level the actor decides at.
pub fn authorize_decision(
    request: &PurchaseRequest,
    actor: &Identity,
) -> Result<ApprovalLevel, LifecycleError> {
    if request.status.is_terminal() {
        return Err(LifecycleError::AlreadyFinalized { status: request.status });
    }

    let Some(acting_level) = actor.role.approval_level() else {
        return Err(LifecycleError::RoleCannotDecide { role: actor.role });
    };

    if acting_level != request.current_level {
        return Err(LifecycleError::WrongLevel { acting: acting_level, current: request.current_level });
    }

    if request.approval_at(acting_level).is_some() {
        return Err(LifecycleError::LevelAlreadyDecided { level: acting_level });
    }

    Ok(acting_level)
}

/// Apply a decision to a request, mutating it the way the backend would: append
/// the approval record for the just-decided level, then advance the level or
/// settle the terminal status.
pub fn apply_decision(
    request: &mut PurchaseRequest,
    actor: &Identity,
    action: DecisionAction,
    comments: &str,
    decided_at: DateTime<Utc>,
) -> Result<TransitionOutcome, LifecycleError> {
    let level = authorize_decision(request, actor)?;
    let from = LifecycleState::of(request);

    let recorded = Approval {
        id: None,
        level,
        approver: Some(actor.clone()),
        decision: Some(action.decision()),
        comments: comments.to_string(),
        decided_at: Some(decided_at),
    };
    request.approvals.push(recorded.clone());

    match action {
        DecisionAction::Reject => {
            request.status = RequestStatus::Rejected;
        }
        DecisionAction::Approve => match level.next() {
            Some(next) => request.current_level = next,
            None => {
                request.status = RequestStatus::Approved;
                request.approved_at = Some(decided_at);
            }
        },
    }
    request.updated_at = decided_at;

    Ok(TransitionOutcome { from, to: LifecycleState::of(request), recorded })
}
