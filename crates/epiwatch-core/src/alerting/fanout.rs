//! Notification fan-out service
//!
//! Resolves an alert's recipient cohort, persists one durable notification
//! per member, extends the read-state ledger, and pushes live events to
//! recipients with a presence entry. Fan-out is best-effort: a failure for
//! one recipient is logged and skipped, never aborting the batch or failing
//! the enclosing creation call.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{AlertRepository, NotificationRepository, OutbreakRepository, UserDirectory};
use crate::error::Result;
use crate::models::{Alert, Notification, Outbreak, Role, TargetRole, UserRecord};
use crate::realtime::{LiveEvent, PresenceRegistry};

use super::deriver;

/// Orchestrates alert derivation, durable fan-out, and live push
pub struct FanoutService {
    alerts: AlertRepository,
    notifications: NotificationRepository,
    outbreaks: OutbreakRepository,
    users: Arc<dyn UserDirectory>,
    presence: Arc<PresenceRegistry>,
}

impl FanoutService {
    /// Create a new fan-out service
    pub fn new(
        alerts: AlertRepository,
        notifications: NotificationRepository,
        outbreaks: OutbreakRepository,
        users: Arc<dyn UserDirectory>,
        presence: Arc<PresenceRegistry>,
    ) -> Self {
        Self {
            alerts,
            notifications,
            outbreaks,
            users,
            presence,
        }
    }

    /// Run the derivation pipeline for a newly-reported outbreak.
    ///
    /// Steps are strictly sequential within one outbreak: derive, persist the
    /// alert, extend the ledger, then push. The dedup key makes re-invocation
    /// on an unchanged outbreak a no-op.
    pub async fn handle_outbreak(&self, outbreak: &Outbreak) -> Result<()> {
        let Some(draft) = deriver::derive(outbreak) else {
            debug!(
                outbreak_id = %outbreak.id,
                severity = %outbreak.severity,
                "severity below alerting threshold, no alert derived"
            );
            return Ok(());
        };

        let alert = draft.into_alert();
        if !self.alerts.insert(&alert).await? {
            info!(
                outbreak_id = %outbreak.id,
                "alert already derived for this outbreak version, skipping"
            );
            return Ok(());
        }

        info!(
            outbreak_id = %outbreak.id,
            alert_id = %alert.id,
            severity = %alert.severity,
            "alert derived from outbreak"
        );

        self.outbreaks.mark_alert_sent(outbreak.id).await?;
        self.dispatch(&alert).await
    }

    /// Fan an alert out to its recipient cohort.
    pub async fn dispatch(&self, alert: &Alert) -> Result<()> {
        let cohort = resolve_cohort(self.users.as_ref(), &alert.target_roles).await?;

        info!(
            alert_id = %alert.id,
            recipients = cohort.len(),
            "fanning out alert"
        );

        for user in &cohort {
            let notification = Notification::for_recipient(alert, user.id);
            if let Err(e) = self.notifications.insert(&notification).await {
                warn!(
                    alert_id = %alert.id,
                    user_id = %user.id,
                    error = %e,
                    "failed to persist notification, skipping recipient"
                );
            }
        }

        let recipient_ids: Vec<Uuid> = cohort.iter().map(|u| u.id).collect();
        let appended = self.alerts.extend_ledger(alert.id, &recipient_ids).await?;
        debug!(alert_id = %alert.id, appended, "ledger extended");

        // Push the alert with its freshly-extended ledger embedded.
        let payload = self.alerts.get(alert.id).await?.unwrap_or_else(|| alert.clone());

        let mut pushed = 0usize;
        for user in &cohort {
            if let Some(session) = self.presence.lookup(user.id) {
                session.push(LiveEvent::NewAlert {
                    alert: payload.clone(),
                });
                pushed += 1;
            }
        }

        info!(alert_id = %alert.id, pushed, "live push complete");
        Ok(())
    }

    /// Notify connected, previously-notified users that an alert is resolved.
    ///
    /// The broadcast deliberately covers only users holding a ledger entry,
    /// not the full target cohort: nobody else ever saw the alert, and the
    /// resync snapshot already excludes resolved alerts.
    pub fn broadcast_resolution(&self, alert: &Alert) {
        let delivered = push_resolution(&self.presence, alert);
        debug!(alert_id = %alert.id, delivered, "resolution broadcast");
    }
}

/// Resolve an alert's target roles to the concrete recipient cohort.
///
/// `All` short-circuits to the whole directory; otherwise the cohort is the
/// union of users matching any listed role.
pub async fn resolve_cohort(
    users: &dyn UserDirectory,
    targets: &[TargetRole],
) -> Result<Vec<UserRecord>> {
    if targets.contains(&TargetRole::All) {
        return users.list_all().await;
    }

    let roles: Vec<Role> = targets
        .iter()
        .filter_map(|target| match target {
            TargetRole::Doctor => Some(Role::Doctor),
            TargetRole::HospitalStaff => Some(Role::HospitalStaff),
            TargetRole::Admin => Some(Role::Admin),
            TargetRole::Patient => Some(Role::Patient),
            TargetRole::All => None,
        })
        .collect();

    users.list_by_roles(&roles).await
}

/// Push `alertResolved` to every connected user with a ledger entry.
///
/// Returns the number of sessions the event was handed to.
pub fn push_resolution(presence: &PresenceRegistry, alert: &Alert) -> usize {
    let mut delivered = 0usize;
    for entry in &alert.ledger {
        if let Some(session) = presence.lookup(entry.user_id) {
            session.push(LiveEvent::AlertResolved {
                alert: alert.clone(),
            });
            delivered += 1;
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDirectory;
    use crate::models::{AlertType, LedgerEntry, Severity};
    use chrono::Utc;
    use tokio::sync::mpsc;

    fn user(role: Role) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            name: format!("{role} user"),
            role,
        }
    }

    fn directory() -> (MemoryDirectory, Vec<UserRecord>) {
        let users = vec![
            user(Role::Doctor),
            user(Role::Doctor),
            user(Role::HospitalStaff),
            user(Role::Admin),
            user(Role::Patient),
        ];
        (MemoryDirectory::with_users(users.clone()), users)
    }

    fn resolved_alert_with_ledger(users: &[Uuid]) -> Alert {
        let now = Utc::now();
        Alert {
            id: Uuid::new_v4(),
            outbreak_id: None,
            alert_type: AlertType::Outbreak,
            severity: Severity::High,
            title: "t".to_string(),
            message: "m".to_string(),
            affected_areas: vec![],
            district: None,
            state: None,
            target_roles: vec![TargetRole::Doctor],
            ledger: users
                .iter()
                .map(|&user_id| LedgerEntry {
                    user_id,
                    read: false,
                    read_at: None,
                })
                .collect(),
            created_by: Uuid::new_v4(),
            expires_at: None,
            is_resolved: true,
            resolved_at: Some(now),
            resolution_notes: Some("contained".to_string()),
            dedup_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn cohort_is_union_of_listed_roles() {
        let (directory, users) = directory();
        let targets = [TargetRole::Doctor, TargetRole::HospitalStaff, TargetRole::Admin];

        let cohort = resolve_cohort(&directory, &targets).await.unwrap();

        assert_eq!(cohort.len(), 4);
        assert!(cohort.iter().all(|u| u.role != Role::Patient));
        // Every cohort member matches at least one listed target.
        for member in &cohort {
            assert!(targets.iter().any(|t| t.matches(member.role)));
        }
        assert!(cohort.len() < users.len());
    }

    #[tokio::test]
    async fn all_target_covers_every_user() {
        let (directory, users) = directory();

        let cohort = resolve_cohort(&directory, &[TargetRole::All]).await.unwrap();

        assert_eq!(cohort.len(), users.len());
    }

    #[tokio::test]
    async fn all_wins_even_when_mixed_with_roles() {
        let (directory, users) = directory();

        let cohort = resolve_cohort(&directory, &[TargetRole::Doctor, TargetRole::All])
            .await
            .unwrap();

        assert_eq!(cohort.len(), users.len());
    }

    #[test]
    fn resolution_reaches_only_connected_ledger_users() {
        let presence = PresenceRegistry::new();
        let notified_connected = Uuid::new_v4();
        let notified_offline = Uuid::new_v4();
        let connected_but_unnotified = Uuid::new_v4();

        let (tx1, mut rx1) = mpsc::unbounded_channel();
        presence.authenticate(notified_connected, tx1);
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        presence.authenticate(connected_but_unnotified, tx2);

        let alert = resolved_alert_with_ledger(&[notified_connected, notified_offline]);
        let delivered = push_resolution(&presence, &alert);

        assert_eq!(delivered, 1);
        assert!(matches!(
            rx1.try_recv(),
            Ok(LiveEvent::AlertResolved { .. })
        ));
        assert!(rx2.try_recv().is_err());
    }
}
