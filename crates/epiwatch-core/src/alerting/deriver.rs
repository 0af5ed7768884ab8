//! Alert derivation policy
//!
//! Pure function of an outbreak: high and critical severities synthesize one
//! alert draft, everything else derives nothing. The draft carries a dedup
//! key tied to the outbreak version so re-derivation is idempotent at the
//! storage layer.

use chrono::Utc;
use uuid::Uuid;

use crate::models::{Alert, AlertType, Outbreak, Severity, TargetRole};

/// Roles notified for every derived outbreak alert
const STAKEHOLDER_ROLES: [TargetRole; 3] =
    [TargetRole::Doctor, TargetRole::HospitalStaff, TargetRole::Admin];

/// A derived alert, not yet assigned identity or timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct AlertDraft {
    /// Outbreak the draft was derived from
    pub outbreak_id: Uuid,
    /// Mirrors the outbreak severity
    pub severity: Severity,
    /// Templated headline
    pub title: String,
    /// Templated body
    pub message: String,
    /// Locality of the outbreak
    pub affected_areas: Vec<String>,
    /// Outbreak district
    pub district: String,
    /// Outbreak state
    pub state: String,
    /// Stakeholder cohort
    pub target_roles: Vec<TargetRole>,
    /// Outbreak reporter, credited as alert author
    pub created_by: Uuid,
    /// Idempotency key: outbreak id + outbreak version
    pub dedup_key: String,
}

impl AlertDraft {
    /// Materialize the draft into a persistable alert.
    pub fn into_alert(self) -> Alert {
        let now = Utc::now();
        Alert {
            id: Uuid::new_v4(),
            outbreak_id: Some(self.outbreak_id),
            alert_type: AlertType::Outbreak,
            severity: self.severity,
            title: self.title,
            message: self.message,
            affected_areas: self.affected_areas,
            district: Some(self.district),
            state: Some(self.state),
            target_roles: self.target_roles,
            ledger: vec![],
            created_by: self.created_by,
            expires_at: None,
            is_resolved: false,
            resolved_at: None,
            resolution_notes: None,
            dedup_key: Some(self.dedup_key),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Derive an alert draft from an outbreak, if its severity warrants one.
pub fn derive(outbreak: &Outbreak) -> Option<AlertDraft> {
    match outbreak.severity {
        Severity::High | Severity::Critical => {}
        Severity::Low | Severity::Moderate => return None,
    }

    Some(AlertDraft {
        outbreak_id: outbreak.id,
        severity: outbreak.severity,
        title: format!(
            "Disease Outbreak Alert: {} in {}",
            outbreak.disease_name, outbreak.district
        ),
        message: format!(
            "{} case(s) of {} reported in {}, {}. Severity: {}.",
            outbreak.cases_reported,
            outbreak.disease_name,
            outbreak.area,
            outbreak.district,
            outbreak.severity
        ),
        affected_areas: vec![outbreak.area.clone()],
        district: outbreak.district.clone(),
        state: outbreak.state.clone(),
        target_roles: STAKEHOLDER_ROLES.to_vec(),
        created_by: outbreak.reporter_id,
        dedup_key: dedup_key(outbreak),
    })
}

/// Idempotency key for one outbreak version.
///
/// Updates refresh `last_updated_at`, so a changed outbreak may derive a new
/// alert while re-deriving an unchanged one never duplicates.
pub fn dedup_key(outbreak: &Outbreak) -> String {
    format!(
        "{}:{}",
        outbreak.id,
        outbreak.last_updated_at.timestamp_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, OutbreakStatus, Role};
    use rstest::rstest;

    fn outbreak(severity: Severity) -> Outbreak {
        let now = Utc::now();
        Outbreak {
            id: Uuid::new_v4(),
            disease_name: "Nipah".to_string(),
            disease_code: "B33.8".to_string(),
            location: GeoPoint {
                longitude: 75.78,
                latitude: 11.25,
            },
            area: "Chathamangalam".to_string(),
            district: "Kozhikode".to_string(),
            state: "Kerala".to_string(),
            pincode: "673601".to_string(),
            hospital_id: Uuid::new_v4(),
            reporter_id: Uuid::new_v4(),
            reporter_role: Role::Doctor,
            cases_reported: 8,
            severity,
            status: OutbreakStatus::Investigating,
            symptoms: vec!["fever".to_string()],
            affected_age_groups: vec![],
            transmission_type: None,
            containment_measures: vec![],
            notes: None,
            first_reported_at: now,
            last_updated_at: now,
            alert_sent: false,
        }
    }

    #[rstest]
    #[case(Severity::High)]
    #[case(Severity::Critical)]
    fn severe_outbreaks_derive_one_alert(#[case] severity: Severity) {
        let outbreak = outbreak(severity);
        let draft = derive(&outbreak).expect("severity should derive an alert");

        assert_eq!(draft.severity, severity);
        assert_eq!(draft.outbreak_id, outbreak.id);
        assert_eq!(draft.created_by, outbreak.reporter_id);
        assert_eq!(
            draft.target_roles,
            vec![TargetRole::Doctor, TargetRole::HospitalStaff, TargetRole::Admin]
        );
    }

    #[rstest]
    #[case(Severity::Low)]
    #[case(Severity::Moderate)]
    fn mild_outbreaks_derive_nothing(#[case] severity: Severity) {
        assert!(derive(&outbreak(severity)).is_none());
    }

    #[test]
    fn message_is_templated_from_outbreak_fields() {
        let outbreak = outbreak(Severity::Critical);
        let draft = derive(&outbreak).unwrap();

        assert!(draft.title.contains("Nipah"));
        assert!(draft.title.contains("Kozhikode"));
        assert!(draft.message.contains("8 case(s)"));
        assert!(draft.message.contains("Chathamangalam"));
        assert!(draft.message.contains("critical"));
    }

    #[test]
    fn derivation_is_deterministic() {
        let outbreak = outbreak(Severity::High);
        assert_eq!(derive(&outbreak), derive(&outbreak));
    }

    #[test]
    fn dedup_key_tracks_outbreak_version() {
        let mut outbreak = outbreak(Severity::High);
        let original = dedup_key(&outbreak);
        assert_eq!(dedup_key(&outbreak), original);

        outbreak.last_updated_at = outbreak.last_updated_at + chrono::Duration::seconds(1);
        assert_ne!(dedup_key(&outbreak), original);
    }

    #[test]
    fn draft_materializes_with_dedup_key() {
        let outbreak = outbreak(Severity::Critical);
        let alert = derive(&outbreak).unwrap().into_alert();

        assert_eq!(alert.outbreak_id, Some(outbreak.id));
        assert_eq!(alert.dedup_key, Some(dedup_key(&outbreak)));
        assert!(!alert.is_resolved);
        assert!(alert.ledger.is_empty());
    }
}
