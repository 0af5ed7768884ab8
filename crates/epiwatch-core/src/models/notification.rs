//! Durable per-user notification records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::outbreak::Severity;

/// Delivery priority of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Routine
    Low,
    /// Default priority
    #[default]
    Medium,
    /// Needs prompt attention
    High,
}

impl Priority {
    /// Stable string form used in storage
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

impl From<Severity> for Priority {
    /// Map alert severity onto notification priority.
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Critical | Severity::High => Self::High,
            Severity::Moderate | Severity::Low => Self::Medium,
        }
    }
}

/// A durable notification created for one recipient during fan-out
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Unique identifier
    pub id: Uuid,

    /// Recipient user
    pub user_id: Uuid,

    /// Alert this notification concerns
    pub alert_id: Uuid,

    /// Copied alert headline
    pub title: String,

    /// Copied alert message
    pub message: String,

    /// Delivery priority derived from severity
    pub priority: Priority,

    /// When the notification was created
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Build the notification persisted for one cohort member.
    pub fn for_recipient(alert: &crate::models::alert::Alert, user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            alert_id: alert.id,
            title: alert.title.clone(),
            message: alert.message.clone(),
            priority: alert.severity.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_maps_to_priority() {
        assert_eq!(Priority::from(Severity::Critical), Priority::High);
        assert_eq!(Priority::from(Severity::High), Priority::High);
        assert_eq!(Priority::from(Severity::Moderate), Priority::Medium);
        assert_eq!(Priority::from(Severity::Low), Priority::Medium);
    }
}
