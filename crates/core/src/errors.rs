use thiserror::Error;

use crate::lifecycle::LifecycleError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[cfg(test)]
mod tests {
    use crate::domain::identity::{ApprovalLevel, Role};
    use crate::errors::DomainError;
    use crate::lifecycle::LifecycleError;

    #[test]
    fn lifecycle_errors_surface_transparently() {
        let error = DomainError::from(LifecycleError::WrongLevel {
            acting: ApprovalLevel::Second,
            current: ApprovalLevel::First,
        });
        assert!(error.to_string().contains("level 1"));
    }

    #[test]
    fn invariant_violations_carry_their_message() {
        let error = DomainError::InvariantViolation(format!(
            "role `{}` cannot own requests",
            Role::Finance
        ));
        assert!(error.to_string().contains("finance"));
    }
}
