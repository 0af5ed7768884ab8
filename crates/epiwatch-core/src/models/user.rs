//! User and hospital directory projections
//!
//! The user/role and hospital directories are external collaborators; this
//! subsystem only consumes them through id-keyed lookups and role-filtered
//! listings, so the projections carried here are deliberately thin.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Role of a platform user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Patient receiving care
    Patient,
    /// Practicing doctor
    Doctor,
    /// Non-doctor hospital staff
    HospitalStaff,
    /// Platform administrator
    Admin,
}

impl Role {
    /// Stable string form used in storage and on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Doctor => "doctor",
            Self::HospitalStaff => "hospital_staff",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Self::Patient),
            "doctor" => Ok(Self::Doctor),
            "hospital_staff" => Ok(Self::HospitalStaff),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// User projection returned by the user directory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Unique identifier
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Directory role
    pub role: Role,
}

/// Hospital projection returned by the hospital directory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hospital {
    /// Unique identifier
    pub id: Uuid,

    /// Hospital name
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Patient, Role::Doctor, Role::HospitalStaff, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!("superuser".parse::<Role>().is_err());
    }
}
