//! Alert data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::outbreak::Severity;
use crate::models::user::Role;

/// Kind of alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Derived from or describing an outbreak
    #[default]
    Outbreak,
    /// Elevated-risk warning
    Warning,
    /// Informational advisory
    Advisory,
    /// Resolution notice
    Resolution,
}

impl AlertType {
    /// Stable string form used in storage
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Outbreak => "outbreak",
            Self::Warning => "warning",
            Self::Advisory => "advisory",
            Self::Resolution => "resolution",
        }
    }
}

impl FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "outbreak" => Ok(Self::Outbreak),
            "warning" => Ok(Self::Warning),
            "advisory" => Ok(Self::Advisory),
            "resolution" => Ok(Self::Resolution),
            other => Err(format!("unknown alert type: {other}")),
        }
    }
}

/// Recipient role targeted by an alert
///
/// A closed enum rather than free-form strings; `All` is an explicit variant
/// matched exhaustively, never a sentinel string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetRole {
    /// All doctors
    Doctor,
    /// All non-doctor hospital staff
    HospitalStaff,
    /// All administrators
    Admin,
    /// All patients
    Patient,
    /// Every user regardless of role
    All,
}

impl TargetRole {
    /// Whether a user with the given directory role falls under this target.
    pub fn matches(self, role: Role) -> bool {
        match self {
            Self::All => true,
            Self::Doctor => role == Role::Doctor,
            Self::HospitalStaff => role == Role::HospitalStaff,
            Self::Admin => role == Role::Admin,
            Self::Patient => role == Role::Patient,
        }
    }

    /// Stable string form used in storage
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Doctor => "doctor",
            Self::HospitalStaff => "hospital_staff",
            Self::Admin => "admin",
            Self::Patient => "patient",
            Self::All => "all",
        }
    }
}

impl fmt::Display for TargetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "doctor" => Ok(Self::Doctor),
            "hospital_staff" => Ok(Self::HospitalStaff),
            "admin" => Ok(Self::Admin),
            "patient" => Ok(Self::Patient),
            "all" => Ok(Self::All),
            other => Err(format!("unknown target role: {other}")),
        }
    }
}

/// Per-user read record embedded in an alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// Recipient user
    pub user_id: Uuid,

    /// Whether the recipient has read the alert
    pub read: bool,

    /// When the alert was read
    pub read_at: Option<DateTime<Utc>>,
}

/// A notice targeted at a recipient cohort
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Unique identifier
    pub id: Uuid,

    /// Outbreak this alert was derived from, if any
    pub outbreak_id: Option<Uuid>,

    /// Kind of alert
    pub alert_type: AlertType,

    /// Severity, mirroring the outbreak severity scale
    pub severity: Severity,

    /// Short headline
    pub title: String,

    /// Full message body
    pub message: String,

    /// Localities the alert concerns
    pub affected_areas: Vec<String>,

    /// District the alert concerns
    pub district: Option<String>,

    /// State the alert concerns
    pub state: Option<String>,

    /// Recipient cohort definition
    pub target_roles: Vec<TargetRole>,

    /// Per-user read ledger; at most one entry per user
    pub ledger: Vec<LedgerEntry>,

    /// User that authored or triggered the alert
    pub created_by: Uuid,

    /// Optional expiry; must be strictly after creation
    pub expires_at: Option<DateTime<Utc>>,

    /// Whether the alert has been resolved (terminal, one-way)
    pub is_resolved: bool,

    /// When the alert was resolved
    pub resolved_at: Option<DateTime<Utc>>,

    /// Admin notes recorded at resolution
    pub resolution_notes: Option<String>,

    /// Derivation idempotency key (outbreak id + outbreak version)
    pub dedup_key: Option<String>,

    /// When the alert was created
    pub created_at: DateTime<Utc>,

    /// When the alert was last updated
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    /// Whether the alert has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }

    /// Whether the alert's cohort covers the given role.
    pub fn targets_role(&self, role: Role) -> bool {
        self.target_roles.iter().any(|target| target.matches(role))
    }

    /// Ledger entry for the given user, if one exists.
    pub fn ledger_entry(&self, user_id: Uuid) -> Option<&LedgerEntry> {
        self.ledger.iter().find(|entry| entry.user_id == user_id)
    }

    /// Resync snapshot predicate: the alert is live and unread for this user.
    ///
    /// Live means not resolved and not expired. The alert is visible when its
    /// cohort covers the user's role or the user already holds a ledger
    /// entry; it drops out once that entry is marked read.
    pub fn unread_for(&self, user_id: Uuid, role: Role, now: DateTime<Utc>) -> bool {
        if self.is_resolved || self.is_expired(now) {
            return false;
        }
        match self.ledger_entry(user_id) {
            Some(entry) => !entry.read,
            None => self.targets_role(role),
        }
    }
}

/// Input for manually authoring an alert (admin only)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertInput {
    pub outbreak_id: Option<Uuid>,
    pub alert_type: Option<AlertType>,
    pub severity: Option<Severity>,
    pub title: String,
    pub message: String,
    pub affected_areas: Option<Vec<String>>,
    pub district: Option<String>,
    pub state: Option<String>,
    pub target_roles: Option<Vec<TargetRole>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AlertInput {
    /// Validate the input against `now` (creation time).
    pub fn validate(&self, now: DateTime<Utc>) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::validation("title must not be empty"));
        }
        if self.message.trim().is_empty() {
            return Err(Error::validation("message must not be empty"));
        }
        if let Some(expires) = self.expires_at {
            if expires <= now {
                return Err(Error::validation("expiresAt must be after creation time"));
            }
        }
        if let Some(targets) = &self.target_roles {
            if targets.is_empty() {
                return Err(Error::validation("targetRoles must not be empty"));
            }
        }
        Ok(())
    }

    /// Build the alert entity for a validated input.
    pub fn into_alert(self, created_by: Uuid) -> Alert {
        let now = Utc::now();
        Alert {
            id: Uuid::new_v4(),
            outbreak_id: self.outbreak_id,
            alert_type: self.alert_type.unwrap_or_default(),
            severity: self.severity.unwrap_or_default(),
            title: self.title,
            message: self.message,
            affected_areas: self.affected_areas.unwrap_or_default(),
            district: self.district,
            state: self.state,
            target_roles: self
                .target_roles
                .unwrap_or_else(|| vec![TargetRole::Doctor, TargetRole::HospitalStaff, TargetRole::Admin]),
            ledger: vec![],
            created_by,
            expires_at: self.expires_at,
            is_resolved: false,
            resolved_at: None,
            resolution_notes: None,
            dedup_key: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for an existing alert (admin only)
///
/// Resolution state is deliberately absent: the only way to resolve an alert
/// is the dedicated resolve operation, and nothing un-resolves it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPatch {
    pub severity: Option<Severity>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub affected_areas: Option<Vec<String>>,
    pub district: Option<String>,
    pub state: Option<String>,
    pub target_roles: Option<Vec<TargetRole>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AlertPatch {
    /// Validate the patch against `now`, mirroring creation-time checks.
    ///
    /// Present fields must satisfy the same constraints as on creation: no
    /// blank title or message, no empty cohort, and no expiry at or before
    /// `now` — a past expiry would silently hide a live alert from every
    /// unread snapshot.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<()> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(Error::validation("title must not be empty"));
            }
        }
        if let Some(message) = &self.message {
            if message.trim().is_empty() {
                return Err(Error::validation("message must not be empty"));
            }
        }
        if let Some(expires) = self.expires_at {
            if expires <= now {
                return Err(Error::validation("expiresAt must be in the future"));
            }
        }
        if let Some(targets) = &self.target_roles {
            if targets.is_empty() {
                return Err(Error::validation("targetRoles must not be empty"));
            }
        }
        Ok(())
    }
}

/// Query parameters for the alert list surface
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertFilter {
    pub severity: Option<Severity>,
    pub district: Option<String>,
    pub state: Option<String>,
    pub is_resolved: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl AlertFilter {
    /// Resolve pagination with defaults and sane bounds.
    ///
    /// The offset saturates so an absurd page number cannot overflow into a
    /// negative OFFSET.
    pub fn pagination(&self) -> (i64, i64) {
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let page = self.page.unwrap_or(1).max(1);
        (per_page, (page - 1).saturating_mul(per_page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_alert() -> Alert {
        Alert {
            id: Uuid::new_v4(),
            outbreak_id: None,
            alert_type: AlertType::Outbreak,
            severity: Severity::High,
            title: "Outbreak alert".to_string(),
            message: "Cases rising".to_string(),
            affected_areas: vec!["Chathamangalam".to_string()],
            district: Some("Kozhikode".to_string()),
            state: Some("Kerala".to_string()),
            target_roles: vec![TargetRole::Doctor, TargetRole::Admin],
            ledger: vec![],
            created_by: Uuid::new_v4(),
            expires_at: None,
            is_resolved: false,
            resolved_at: None,
            resolution_notes: None,
            dedup_key: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn target_role_all_matches_every_role() {
        for role in [Role::Patient, Role::Doctor, Role::HospitalStaff, Role::Admin] {
            assert!(TargetRole::All.matches(role));
        }
    }

    #[test]
    fn target_role_matching_is_exact() {
        assert!(TargetRole::Doctor.matches(Role::Doctor));
        assert!(!TargetRole::Doctor.matches(Role::HospitalStaff));
        assert!(!TargetRole::Patient.matches(Role::Admin));
    }

    #[test]
    fn unread_respects_role_targeting() {
        let alert = sample_alert();
        let user = Uuid::new_v4();
        let now = Utc::now();

        assert!(alert.unread_for(user, Role::Doctor, now));
        assert!(!alert.unread_for(user, Role::Patient, now));
    }

    #[test]
    fn unread_prefers_ledger_over_role() {
        let mut alert = sample_alert();
        let user = Uuid::new_v4();
        let now = Utc::now();

        // A patient is outside the cohort, but an existing ledger entry keeps
        // the alert visible until read.
        alert.ledger.push(LedgerEntry {
            user_id: user,
            read: false,
            read_at: None,
        });
        assert!(alert.unread_for(user, Role::Patient, now));

        alert.ledger[0].read = true;
        alert.ledger[0].read_at = Some(now);
        assert!(!alert.unread_for(user, Role::Patient, now));
        assert!(!alert.unread_for(user, Role::Doctor, now));
    }

    #[test]
    fn unread_excludes_resolved_and_expired() {
        let now = Utc::now();
        let user = Uuid::new_v4();

        let mut resolved = sample_alert();
        resolved.is_resolved = true;
        resolved.resolved_at = Some(now);
        assert!(!resolved.unread_for(user, Role::Doctor, now));

        let mut expired = sample_alert();
        expired.expires_at = Some(now - Duration::minutes(1));
        assert!(!expired.unread_for(user, Role::Doctor, now));
    }

    #[test]
    fn input_rejects_past_expiry() {
        let now = Utc::now();
        let input = AlertInput {
            outbreak_id: None,
            alert_type: None,
            severity: None,
            title: "t".to_string(),
            message: "m".to_string(),
            affected_areas: None,
            district: None,
            state: None,
            target_roles: None,
            expires_at: Some(now - Duration::seconds(1)),
        };
        assert!(input.validate(now).is_err());
    }

    #[test]
    fn filter_pagination_saturates_on_huge_page_numbers() {
        let filter = AlertFilter {
            page: Some(i64::MAX),
            per_page: Some(50),
            ..Default::default()
        };
        let (limit, offset) = filter.pagination();
        assert_eq!(limit, 50);
        assert_eq!(offset, i64::MAX);
        assert!(offset >= 0);
    }

    #[test]
    fn patch_enforces_creation_invariants() {
        let now = Utc::now();

        let patch = AlertPatch {
            expires_at: Some(now - Duration::seconds(1)),
            ..Default::default()
        };
        assert!(patch.validate(now).is_err());

        let patch = AlertPatch {
            title: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(patch.validate(now).is_err());

        let patch = AlertPatch {
            message: Some(String::new()),
            ..Default::default()
        };
        assert!(patch.validate(now).is_err());

        let patch = AlertPatch {
            target_roles: Some(vec![]),
            ..Default::default()
        };
        assert!(patch.validate(now).is_err());
    }

    #[test]
    fn patch_accepts_partial_updates() {
        let now = Utc::now();

        assert!(AlertPatch::default().validate(now).is_ok());

        let patch = AlertPatch {
            severity: Some(Severity::Critical),
            message: Some("updated guidance".to_string()),
            expires_at: Some(now + Duration::hours(1)),
            ..Default::default()
        };
        assert!(patch.validate(now).is_ok());
    }
}
