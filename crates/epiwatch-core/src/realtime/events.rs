//! Live channel wire protocol
//!
//! Delivery is at-most-once and fire-and-forget; the durable ledger plus the
//! resync snapshot on reconnect is the actual at-least-once layer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Alert;

/// Outbound event pushed to a connected user
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LiveEvent {
    /// A newly-created alert targeting the recipient
    #[serde(rename_all = "camelCase")]
    NewAlert {
        /// Full alert payload
        alert: Alert,
    },

    /// Resync snapshot of the recipient's unread alerts
    #[serde(rename_all = "camelCase")]
    UnreadAlerts {
        /// Alerts still unread for the recipient
        alerts: Vec<Alert>,
    },

    /// An alert the recipient was notified about has been resolved
    #[serde(rename_all = "camelCase")]
    AlertResolved {
        /// Full alert payload, including resolution fields
        alert: Alert,
    },
}

/// Inbound message from a connected client
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// First frame of every session: identify the user
    #[serde(rename_all = "camelCase")]
    Authenticate {
        /// The connecting user
        user_id: Uuid,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertType, Severity, TargetRole};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn sample_alert() -> Alert {
        Alert {
            id: Uuid::new_v4(),
            outbreak_id: None,
            alert_type: AlertType::Outbreak,
            severity: Severity::Critical,
            title: "t".to_string(),
            message: "m".to_string(),
            affected_areas: vec![],
            district: None,
            state: None,
            target_roles: vec![TargetRole::All],
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
    fn outbound_events_use_protocol_tags() {
        let new_alert = serde_json::to_value(LiveEvent::NewAlert {
            alert: sample_alert(),
        })
        .unwrap();
        assert_eq!(new_alert["type"], "newAlert");

        let snapshot = serde_json::to_value(LiveEvent::UnreadAlerts { alerts: vec![] }).unwrap();
        assert_eq!(snapshot["type"], "unreadAlerts");

        let resolved = serde_json::to_value(LiveEvent::AlertResolved {
            alert: sample_alert(),
        })
        .unwrap();
        assert_eq!(resolved["type"], "alertResolved");
    }

    #[test]
    fn authenticate_frame_parses() {
        let user_id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"authenticate","userId":"{user_id}"}}"#);
        let ClientMessage::Authenticate { user_id: parsed } =
            serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, user_id);
    }
}
