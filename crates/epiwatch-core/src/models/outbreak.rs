//! Outbreak data model

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::user::Role;

/// Severity of an outbreak (also mirrored onto derived alerts)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Isolated, low-risk cluster
    Low,
    /// Contained but worth watching
    #[default]
    Moderate,
    /// Spreading, stakeholders must react
    High,
    /// Immediate public-health emergency
    Critical,
}

impl Severity {
    /// Stable string form used in storage
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "moderate" => Ok(Self::Moderate),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Investigation status of an outbreak
///
/// Transitions are free: any authorized writer may set any status value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutbreakStatus {
    /// Being investigated
    #[default]
    Investigating,
    /// Confirmed by health authorities
    Confirmed,
    /// Spread halted
    Contained,
    /// No active cases remain
    Resolved,
}

impl OutbreakStatus {
    /// Stable string form used in storage
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Investigating => "investigating",
            Self::Confirmed => "confirmed",
            Self::Contained => "contained",
            Self::Resolved => "resolved",
        }
    }
}

impl FromStr for OutbreakStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "investigating" => Ok(Self::Investigating),
            "confirmed" => Ok(Self::Confirmed),
            "contained" => Ok(Self::Contained),
            "resolved" => Ok(Self::Resolved),
            other => Err(format!("unknown outbreak status: {other}")),
        }
    }
}

/// Geographic point, serialized as an exactly-two-element `[lon, lat]` array
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Longitude in degrees
    pub longitude: f64,
    /// Latitude in degrees
    pub latitude: f64,
}

impl Serialize for GeoPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        [self.longitude, self.latitude].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GeoPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Vec::<f64>::deserialize(deserializer)?;
        match raw.as_slice() {
            [longitude, latitude] => Ok(Self {
                longitude: *longitude,
                latitude: *latitude,
            }),
            _ => Err(D::Error::custom(format!(
                "coordinates must be a [lon, lat] pair, got {} element(s)",
                raw.len()
            ))),
        }
    }
}

/// A reported cluster of disease cases at a geolocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outbreak {
    /// Unique identifier
    pub id: Uuid,

    /// Disease name (e.g., "Nipah", "Dengue")
    pub disease_name: String,

    /// ICD-style disease code
    pub disease_code: String,

    /// Geolocation of the reported cluster
    pub location: GeoPoint,

    /// Locality within the district
    pub area: String,

    /// District
    pub district: String,

    /// State
    pub state: String,

    /// Postal code
    pub pincode: String,

    /// Reporting hospital
    pub hospital_id: Uuid,

    /// Reporting user
    pub reporter_id: Uuid,

    /// Role the reporter held at report time
    pub reporter_role: Role,

    /// Number of cases reported (>= 1)
    pub cases_reported: i32,

    /// Severity assessment
    pub severity: Severity,

    /// Investigation status
    pub status: OutbreakStatus,

    /// Observed symptoms
    pub symptoms: Vec<String>,

    /// Affected age groups (e.g., "0-5", "60+")
    pub affected_age_groups: Vec<String>,

    /// Transmission type (e.g., "airborne", "waterborne")
    pub transmission_type: Option<String>,

    /// Containment measures in effect
    pub containment_measures: Vec<String>,

    /// Free-form reporter notes
    pub notes: Option<String>,

    /// When the outbreak was first reported
    pub first_reported_at: DateTime<Utc>,

    /// When the outbreak was last updated
    pub last_updated_at: DateTime<Utc>,

    /// Whether an alert has been dispatched for this outbreak
    pub alert_sent: bool,
}

/// Input for reporting a new outbreak
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutbreakInput {
    pub disease_name: String,
    pub disease_code: String,
    /// Raw coordinates; validated to an exact `[lon, lat]` pair
    pub coordinates: Vec<f64>,
    pub area: String,
    pub district: String,
    pub state: String,
    pub pincode: String,
    pub hospital_id: Uuid,
    pub cases_reported: i32,
    pub severity: Option<Severity>,
    pub symptoms: Option<Vec<String>>,
    pub affected_age_groups: Option<Vec<String>>,
    pub transmission_type: Option<String>,
    pub containment_measures: Option<Vec<String>>,
    pub notes: Option<String>,
}

impl OutbreakInput {
    /// Validate the input and extract the geolocation.
    ///
    /// Checks run before any write: coordinate arity and finiteness, case
    /// count, and required text fields.
    pub fn validate(&self) -> Result<GeoPoint> {
        let location = match self.coordinates.as_slice() {
            [longitude, latitude] => GeoPoint {
                longitude: *longitude,
                latitude: *latitude,
            },
            _ => {
                return Err(Error::validation(format!(
                    "coordinates must be a [lon, lat] pair, got {} element(s)",
                    self.coordinates.len()
                )))
            }
        };

        if !location.longitude.is_finite() || !location.latitude.is_finite() {
            return Err(Error::validation("coordinates must be finite numbers"));
        }
        if self.cases_reported < 1 {
            return Err(Error::validation("casesReported must be at least 1"));
        }
        for (field, value) in [
            ("diseaseName", &self.disease_name),
            ("diseaseCode", &self.disease_code),
            ("area", &self.area),
            ("district", &self.district),
            ("state", &self.state),
            ("pincode", &self.pincode),
        ] {
            if value.trim().is_empty() {
                return Err(Error::validation(format!("{field} must not be empty")));
            }
        }

        Ok(location)
    }

    /// Build the outbreak entity for a validated input.
    pub fn into_outbreak(self, location: GeoPoint, reporter_id: Uuid, reporter_role: Role) -> Outbreak {
        let now = Utc::now();
        Outbreak {
            id: Uuid::new_v4(),
            disease_name: self.disease_name,
            disease_code: self.disease_code,
            location,
            area: self.area,
            district: self.district,
            state: self.state,
            pincode: self.pincode,
            hospital_id: self.hospital_id,
            reporter_id,
            reporter_role,
            cases_reported: self.cases_reported,
            severity: self.severity.unwrap_or_default(),
            status: OutbreakStatus::default(),
            symptoms: self.symptoms.unwrap_or_default(),
            affected_age_groups: self.affected_age_groups.unwrap_or_default(),
            transmission_type: self.transmission_type,
            containment_measures: self.containment_measures.unwrap_or_default(),
            notes: self.notes,
            first_reported_at: now,
            last_updated_at: now,
            alert_sent: false,
        }
    }
}

/// Partial update for an existing outbreak
///
/// Only the original reporter or an admin may apply a patch; missing fields
/// are left untouched. Updates never re-trigger alert derivation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutbreakPatch {
    pub cases_reported: Option<i32>,
    pub severity: Option<Severity>,
    pub status: Option<OutbreakStatus>,
    pub symptoms: Option<Vec<String>>,
    pub affected_age_groups: Option<Vec<String>>,
    pub transmission_type: Option<String>,
    pub containment_measures: Option<Vec<String>>,
    pub notes: Option<String>,
}

impl OutbreakPatch {
    /// Validate patch fields that carry constraints of their own.
    pub fn validate(&self) -> Result<()> {
        if let Some(cases) = self.cases_reported {
            if cases < 1 {
                return Err(Error::validation("casesReported must be at least 1"));
            }
        }
        Ok(())
    }
}

/// Query parameters for the outbreak list surface
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutbreakQuery {
    /// Keyword matched against disease/area/district/state
    pub keyword: Option<String>,
    /// Exact district filter
    pub district: Option<String>,
    /// Exact state filter
    pub state: Option<String>,
    /// Exact disease name filter
    pub disease: Option<String>,
    /// 1-based page number
    pub page: Option<i64>,
    /// Page size
    pub per_page: Option<i64>,
}

impl OutbreakQuery {
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

/// Aggregate statistics for one disease
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutbreakStats {
    /// Disease name the group aggregates over
    pub disease_name: String,

    /// Number of outbreak reports
    pub outbreak_count: i64,

    /// Sum of reported cases across reports
    pub total_cases: i64,

    /// Distinct severities observed
    pub severities: Vec<Severity>,

    /// Distinct states with reports
    pub states: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input() -> OutbreakInput {
        OutbreakInput {
            disease_name: "Nipah".to_string(),
            disease_code: "B33.8".to_string(),
            coordinates: vec![75.78, 11.25],
            area: "Chathamangalam".to_string(),
            district: "Kozhikode".to_string(),
            state: "Kerala".to_string(),
            pincode: "673601".to_string(),
            hospital_id: Uuid::new_v4(),
            cases_reported: 8,
            severity: None,
            symptoms: None,
            affected_age_groups: None,
            transmission_type: None,
            containment_measures: None,
            notes: None,
        }
    }

    #[test]
    fn geo_point_serializes_as_pair() {
        let point = GeoPoint {
            longitude: 75.78,
            latitude: 11.25,
        };
        let json = serde_json::to_string(&point).unwrap();
        assert_eq!(json, "[75.78,11.25]");

        let back: GeoPoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, point);
    }

    #[test]
    fn geo_point_rejects_wrong_arity() {
        assert!(serde_json::from_str::<GeoPoint>("[75.78]").is_err());
        assert!(serde_json::from_str::<GeoPoint>("[1.0, 2.0, 3.0]").is_err());
    }

    #[test]
    fn input_validation_accepts_well_formed_report() {
        let location = base_input().validate().unwrap();
        assert_eq!(location.longitude, 75.78);
        assert_eq!(location.latitude, 11.25);
    }

    #[test]
    fn input_validation_rejects_bad_coordinates() {
        let mut input = base_input();
        input.coordinates = vec![75.78];
        assert!(input.validate().is_err());

        input.coordinates = vec![f64::NAN, 11.25];
        assert!(input.validate().is_err());
    }

    #[test]
    fn input_validation_rejects_zero_cases() {
        let mut input = base_input();
        input.cases_reported = 0;
        assert!(input.validate().is_err());
    }

    #[test]
    fn defaults_applied_on_creation() {
        let input = base_input();
        let location = input.validate().unwrap();
        let outbreak = input.into_outbreak(location, Uuid::new_v4(), Role::Doctor);

        assert_eq!(outbreak.severity, Severity::Moderate);
        assert_eq!(outbreak.status, OutbreakStatus::Investigating);
        assert!(!outbreak.alert_sent);
    }

    #[test]
    fn pagination_defaults_and_bounds() {
        let query = OutbreakQuery::default();
        assert_eq!(query.pagination(), (20, 0));

        let query = OutbreakQuery {
            page: Some(3),
            per_page: Some(500),
            ..Default::default()
        };
        assert_eq!(query.pagination(), (100, 200));
    }

    #[test]
    fn pagination_saturates_on_huge_page_numbers() {
        let query = OutbreakQuery {
            page: Some(i64::MAX),
            per_page: Some(100),
            ..Default::default()
        };
        let (limit, offset) = query.pagination();
        assert_eq!(limit, 100);
        assert_eq!(offset, i64::MAX);
        assert!(offset >= 0);
    }
}
