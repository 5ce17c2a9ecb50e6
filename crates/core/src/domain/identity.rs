use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::DomainError;

/// Role attached to a signed-in identity. Exactly one role per account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[default]
    #[serde(rename = "staff")]
    Staff,
    #[serde(rename = "approver_level_1")]
    ApproverLevel1,
    #[serde(rename = "approver_level_2")]
    ApproverLevel2,
    #[serde(rename = "finance")]
    Finance,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staff => "staff",
            Self::ApproverLevel1 => "approver_level_1",
            Self::ApproverLevel2 => "approver_level_2",
            Self::Finance => "finance",
        }
    }

    /// Landing route for this role. The mapping is exhaustive; adding a role
    /// without a landing is a compile error.
    pub fn landing_route(&self) -> &'static str {
        match self {
            Self::Staff => "/staff",
            Self::ApproverLevel1 | Self::ApproverLevel2 => "/approver",
            Self::Finance => "/finance",
        }
    }

    /// The approval level this role decides at, if any.
    pub fn approval_level(&self) -> Option<ApprovalLevel> {
        match self {
            Self::ApproverLevel1 => Some(ApprovalLevel::First),
            Self::ApproverLevel2 => Some(ApprovalLevel::Second),
            Self::Staff | Self::Finance => None,
        }
    }

    pub fn is_approver(&self) -> bool {
        self.approval_level().is_some()
    }
}

impl std::str::FromStr for Role {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "staff" => Ok(Self::Staff),
            "approver_level_1" => Ok(Self::ApproverLevel1),
            "approver_level_2" => Ok(Self::ApproverLevel2),
            "finance" => Ok(Self::Finance),
            other => Err(DomainError::InvariantViolation(format!("unknown role `{other}`"))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordinal approval stage. Level one must clear before level two is reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ApprovalLevel {
    First,
    Second,
}

impl ApprovalLevel {
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Second)
    }

    pub fn next(&self) -> Option<Self> {
        match self {
            Self::First => Some(Self::Second),
            Self::Second => None,
        }
    }

    /// The role expected to decide at this level.
    pub fn deciding_role(&self) -> Role {
        match self {
            Self::First => Role::ApproverLevel1,
            Self::Second => Role::ApproverLevel2,
        }
    }
}

impl TryFrom<u8> for ApprovalLevel {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::First),
            2 => Ok(Self::Second),
            other => {
                Err(DomainError::InvariantViolation(format!("approval level `{other}` out of range")))
            }
        }
    }
}

impl From<ApprovalLevel> for u8 {
    fn from(value: ApprovalLevel) -> Self {
        value.as_u8()
    }
}

impl std::fmt::Display for ApprovalLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// A signed-in (or referenced) account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    #[serde(default, deserialize_with = "role_or_default")]
    pub role: Role,
}

impl Identity {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self { username: username.into(), role }
    }
}

/// Backend user payloads occasionally omit or mangle `role`; navigation must not
/// fail on them, so decoding falls back to the staff landing.
fn role_or_default<'de, D>(deserializer: D) -> Result<Role, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(|value| value.parse().ok()).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::{ApprovalLevel, Identity, Role};

    #[test]
    fn every_role_has_a_landing_route() {
        assert_eq!(Role::Staff.landing_route(), "/staff");
        assert_eq!(Role::ApproverLevel1.landing_route(), "/approver");
        assert_eq!(Role::ApproverLevel2.landing_route(), "/approver");
        assert_eq!(Role::Finance.landing_route(), "/finance");
    }

    #[test]
    fn approval_levels_map_to_deciding_roles() {
        assert_eq!(ApprovalLevel::First.deciding_role(), Role::ApproverLevel1);
        assert_eq!(ApprovalLevel::Second.deciding_role(), Role::ApproverLevel2);
        assert_eq!(Role::Finance.approval_level(), None);
    }

    #[test]
    fn level_progression_stops_after_final_level() {
        assert_eq!(ApprovalLevel::First.next(), Some(ApprovalLevel::Second));
        assert_eq!(ApprovalLevel::Second.next(), None);
        assert!(ApprovalLevel::Second.is_final());
    }

    #[test]
    fn missing_role_falls_back_to_staff() {
        let identity: Identity =
            serde_json::from_str(r#"{"username": "amina"}"#).expect("identity should decode");
        assert_eq!(identity.role, Role::Staff);
        assert_eq!(identity.role.landing_route(), "/staff");
    }

    #[test]
    fn unknown_role_falls_back_to_staff() {
        let identity: Identity =
            serde_json::from_str(r#"{"username": "amina", "role": "superuser"}"#)
                .expect("identity should decode");
        assert_eq!(identity.role, Role::Staff);
    }

    #[test]
    fn known_roles_round_trip_through_the_wire_format() {
        let identity: Identity =
            serde_json::from_str(r#"{"username": "joy", "role": "approver_level_2"}"#)
                .expect("identity should decode");
        assert_eq!(identity.role, Role::ApproverLevel2);

        let raw = serde_json::to_string(&identity).expect("identity should encode");
        assert!(raw.contains("approver_level_2"));
    }

    #[test]
    fn out_of_range_level_is_rejected() {
        let error = ApprovalLevel::try_from(3).expect_err("level 3 should be rejected");
        assert!(error.to_string().contains("out of range"));
    }
}
