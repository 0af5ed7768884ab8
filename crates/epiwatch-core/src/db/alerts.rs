//! Alert repository and read-state ledger
//!
//! The ledger lives in its own `alert_ledger` table keyed by
//! `(alert_id, user_id)`; loaded alerts embed it as `Alert::ledger`. Keeping
//! the rows separate makes `mark_read` and fan-out appends atomic row upserts
//! rather than read-modify-write cycles over one document.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    Alert, AlertFilter, AlertPatch, AlertType, LedgerEntry, Role, Severity, TargetRole,
};

/// Repository for alerts and their read-state ledger
#[derive(Clone)]
pub struct AlertRepository {
    pool: PgPool,
}

impl AlertRepository {
    /// Create a new alert repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a new alert.
    ///
    /// Returns `false` when the alert carries a dedup key that is already
    /// stored, in which case nothing is written — re-deriving an alert for an
    /// unchanged outbreak is a no-op.
    pub async fn insert(&self, alert: &Alert) -> Result<bool> {
        let target_roles: Vec<&str> = alert.target_roles.iter().map(|r| r.as_str()).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO alerts (
                id, outbreak_id, alert_type, severity, title, message,
                affected_areas, district, state, target_roles, created_by,
                expires_at, is_resolved, resolved_at, resolution_notes,
                dedup_key, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (dedup_key) WHERE dedup_key IS NOT NULL DO NOTHING
            "#,
        )
        .bind(alert.id)
        .bind(alert.outbreak_id)
        .bind(alert.alert_type.as_str())
        .bind(alert.severity.as_str())
        .bind(&alert.title)
        .bind(&alert.message)
        .bind(serde_json::to_value(&alert.affected_areas)?)
        .bind(&alert.district)
        .bind(&alert.state)
        .bind(&target_roles)
        .bind(alert.created_by)
        .bind(alert.expires_at)
        .bind(alert.is_resolved)
        .bind(alert.resolved_at)
        .bind(&alert.resolution_notes)
        .bind(&alert.dedup_key)
        .bind(alert.created_at)
        .bind(alert.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get an alert by ID with its full ledger
    pub async fn get(&self, id: Uuid) -> Result<Option<Alert>> {
        let row = sqlx::query_as::<_, AlertRow>("SELECT * FROM alerts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut alert: Alert = row.into();
        alert.ledger = self
            .load_ledger(&[alert.id])
            .await?
            .remove(&alert.id)
            .unwrap_or_default();

        Ok(Some(alert))
    }

    /// Paginated alert listing with optional filters
    pub async fn list(&self, filter: &AlertFilter) -> Result<(Vec<Alert>, i64)> {
        let (limit, offset) = filter.pagination();
        let severity = filter.severity.map(Severity::as_str);

        let rows = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT * FROM alerts
            WHERE ($1::text IS NULL OR severity = $1)
              AND ($2::text IS NULL OR district = $2)
              AND ($3::text IS NULL OR state = $3)
              AND ($4::boolean IS NULL OR is_resolved = $4)
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(severity)
        .bind(&filter.district)
        .bind(&filter.state)
        .bind(filter.is_resolved)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM alerts
            WHERE ($1::text IS NULL OR severity = $1)
              AND ($2::text IS NULL OR district = $2)
              AND ($3::text IS NULL OR state = $3)
              AND ($4::boolean IS NULL OR is_resolved = $4)
            "#,
        )
        .bind(severity)
        .bind(&filter.district)
        .bind(&filter.state)
        .bind(filter.is_resolved)
        .fetch_one(&self.pool)
        .await?;

        let alerts = self.attach_ledgers(rows).await?;
        Ok((alerts, total))
    }

    /// Merge a patch into an alert, refreshing `updated_at`
    pub async fn update(&self, id: Uuid, patch: &AlertPatch) -> Result<Option<Alert>> {
        let affected_areas = patch
            .affected_areas
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        let target_roles: Option<Vec<String>> = patch
            .target_roles
            .as_ref()
            .map(|roles| roles.iter().map(|r| r.as_str().to_string()).collect());

        let result = sqlx::query(
            r#"
            UPDATE alerts SET
                severity = COALESCE($2, severity),
                title = COALESCE($3, title),
                message = COALESCE($4, message),
                affected_areas = COALESCE($5, affected_areas),
                district = COALESCE($6, district),
                state = COALESCE($7, state),
                target_roles = COALESCE($8, target_roles),
                expires_at = COALESCE($9, expires_at),
                updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(patch.severity.map(Severity::as_str))
        .bind(&patch.title)
        .bind(&patch.message)
        .bind(affected_areas)
        .bind(&patch.district)
        .bind(&patch.state)
        .bind(target_roles)
        .bind(patch.expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get(id).await
    }

    /// Delete an alert (ledger and notifications cascade)
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM alerts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Append unread ledger entries for a batch of recipients.
    ///
    /// Users that already hold an entry on the alert are skipped. Returns the
    /// number of entries actually appended.
    pub async fn extend_ledger(&self, alert_id: Uuid, user_ids: &[Uuid]) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO alert_ledger (alert_id, user_id, read, read_at)
            SELECT $1, user_id, false, NULL FROM unnest($2::uuid[]) AS t(user_id)
            ON CONFLICT (alert_id, user_id) DO NOTHING
            "#,
        )
        .bind(alert_id)
        .bind(user_ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Mark an alert as read for one user.
    ///
    /// Upsert: an existing entry flips to read, a missing one is appended
    /// already-read. Idempotent — the first read timestamp is kept on
    /// repeated calls.
    pub async fn mark_read(&self, alert_id: Uuid, user_id: Uuid) -> Result<LedgerEntry> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM alerts WHERE id = $1)")
            .bind(alert_id)
            .fetch_one(&self.pool)
            .await?;

        if !exists {
            return Err(Error::not_found("Alert", alert_id.to_string()));
        }

        let row = sqlx::query_as::<_, LedgerRow>(
            r#"
            INSERT INTO alert_ledger (alert_id, user_id, read, read_at)
            VALUES ($1, $2, true, $3)
            ON CONFLICT (alert_id, user_id) DO UPDATE
                SET read = true,
                    read_at = COALESCE(alert_ledger.read_at, EXCLUDED.read_at)
            RETURNING alert_id, user_id, read, read_at
            "#,
        )
        .bind(alert_id)
        .bind(user_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    /// Resolve an alert (terminal, one-way).
    ///
    /// Returns the alert plus whether this call performed the transition;
    /// resolving an already-resolved alert is a no-op that reports `false`.
    pub async fn resolve(
        &self,
        id: Uuid,
        notes: Option<&str>,
    ) -> Result<Option<(Alert, bool)>> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE alerts
            SET is_resolved = true, resolved_at = $2, resolution_notes = $3, updated_at = $2
            WHERE id = $1 AND is_resolved = false
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(notes)
        .execute(&self.pool)
        .await?;

        let newly_resolved = result.rows_affected() > 0;

        Ok(self.get(id).await?.map(|alert| (alert, newly_resolved)))
    }

    /// Unread-alerts snapshot for one user.
    ///
    /// Live (non-resolved, non-expired) alerts whose cohort covers the user's
    /// role or where the user already holds a ledger entry, minus those the
    /// user has marked read.
    pub async fn unread_for_user(
        &self,
        user_id: Uuid,
        role: Role,
        limit: i64,
    ) -> Result<Vec<Alert>> {
        let roles = vec![TargetRole::All.as_str(), role.as_str()];

        let rows = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT a.* FROM alerts a
            WHERE a.is_resolved = false
              AND (a.expires_at IS NULL OR a.expires_at > $3)
              AND (
                    a.target_roles && $2::text[]
                    OR EXISTS (
                        SELECT 1 FROM alert_ledger l
                        WHERE l.alert_id = a.id AND l.user_id = $1
                    )
                  )
              AND NOT EXISTS (
                    SELECT 1 FROM alert_ledger l
                    WHERE l.alert_id = a.id AND l.user_id = $1 AND l.read = true
                  )
            ORDER BY a.created_at DESC
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(&roles)
        .bind(Utc::now())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        self.attach_ledgers(rows).await
    }

    /// Load ledger rows for a set of alerts, grouped by alert id
    async fn load_ledger(&self, alert_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<LedgerEntry>>> {
        let rows = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT alert_id, user_id, read, read_at
            FROM alert_ledger
            WHERE alert_id = ANY($1)
            "#,
        )
        .bind(alert_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<LedgerEntry>> = HashMap::new();
        for row in rows {
            grouped.entry(row.alert_id).or_default().push(row.into());
        }

        Ok(grouped)
    }

    /// Embed ledgers into a page of alert rows
    async fn attach_ledgers(&self, rows: Vec<AlertRow>) -> Result<Vec<Alert>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut ledgers = self.load_ledger(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let mut alert: Alert = row.into();
                alert.ledger = ledgers.remove(&alert.id).unwrap_or_default();
                alert
            })
            .collect())
    }
}

// Database row types for mapping

#[derive(sqlx::FromRow)]
struct AlertRow {
    id: Uuid,
    outbreak_id: Option<Uuid>,
    alert_type: String,
    severity: String,
    title: String,
    message: String,
    affected_areas: serde_json::Value,
    district: Option<String>,
    state: Option<String>,
    target_roles: Vec<String>,
    created_by: Uuid,
    expires_at: Option<DateTime<Utc>>,
    is_resolved: bool,
    resolved_at: Option<DateTime<Utc>>,
    resolution_notes: Option<String>,
    dedup_key: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AlertRow> for Alert {
    fn from(row: AlertRow) -> Self {
        Alert {
            id: row.id,
            outbreak_id: row.outbreak_id,
            alert_type: row.alert_type.parse().unwrap_or(AlertType::Outbreak),
            severity: row.severity.parse().unwrap_or_default(),
            title: row.title,
            message: row.message,
            affected_areas: serde_json::from_value(row.affected_areas).unwrap_or_default(),
            district: row.district,
            state: row.state,
            target_roles: row
                .target_roles
                .iter()
                .filter_map(|r| r.parse().ok())
                .collect(),
            ledger: vec![],
            created_by: row.created_by,
            expires_at: row.expires_at,
            is_resolved: row.is_resolved,
            resolved_at: row.resolved_at,
            resolution_notes: row.resolution_notes,
            dedup_key: row.dedup_key,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LedgerRow {
    alert_id: Uuid,
    user_id: Uuid,
    read: bool,
    read_at: Option<DateTime<Utc>>,
}

impl From<LedgerRow> for LedgerEntry {
    fn from(row: LedgerRow) -> Self {
        LedgerEntry {
            user_id: row.user_id,
            read: row.read,
            read_at: row.read_at,
        }
    }
}

// Run with `cargo test -- --ignored` against a disposable Postgres; the
// harness applies ./migrations to a fresh database per test.
#[cfg(test)]
mod tests {
    use super::*;

    fn stored_alert() -> Alert {
        let now = Utc::now();
        Alert {
            id: Uuid::new_v4(),
            outbreak_id: None,
            alert_type: AlertType::Outbreak,
            severity: Severity::High,
            title: "Outbreak alert".to_string(),
            message: "Cases rising".to_string(),
            affected_areas: vec![],
            district: Some("Kozhikode".to_string()),
            state: Some("Kerala".to_string()),
            target_roles: vec![TargetRole::Doctor],
            ledger: vec![],
            created_by: Uuid::new_v4(),
            expires_at: None,
            is_resolved: false,
            resolved_at: None,
            resolution_notes: None,
            dedup_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[sqlx::test]
    #[ignore = "needs a running Postgres (DATABASE_URL)"]
    async fn mark_read_is_idempotent(pool: PgPool) {
        let repo = AlertRepository::new(pool);
        let alert = stored_alert();
        assert!(repo.insert(&alert).await.unwrap());
        let user = Uuid::new_v4();

        let first = repo.mark_read(alert.id, user).await.unwrap();
        let second = repo.mark_read(alert.id, user).await.unwrap();

        assert!(first.read);
        assert!(second.read);
        // The first read timestamp sticks across repeated calls.
        assert_eq!(second.read_at, first.read_at);

        let stored = repo.get(alert.id).await.unwrap().unwrap();
        assert_eq!(stored.ledger.len(), 1);
    }

    #[sqlx::test]
    #[ignore = "needs a running Postgres (DATABASE_URL)"]
    async fn mark_read_flips_existing_unread_entry(pool: PgPool) {
        let repo = AlertRepository::new(pool);
        let alert = stored_alert();
        assert!(repo.insert(&alert).await.unwrap());
        let user = Uuid::new_v4();

        assert_eq!(repo.extend_ledger(alert.id, &[user]).await.unwrap(), 1);

        let entry = repo.mark_read(alert.id, user).await.unwrap();
        assert!(entry.read);
        assert!(entry.read_at.is_some());

        let stored = repo.get(alert.id).await.unwrap().unwrap();
        assert_eq!(stored.ledger.len(), 1);
    }

    #[sqlx::test]
    #[ignore = "needs a running Postgres (DATABASE_URL)"]
    async fn extend_ledger_skips_existing_entries(pool: PgPool) {
        let repo = AlertRepository::new(pool);
        let alert = stored_alert();
        assert!(repo.insert(&alert).await.unwrap());

        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(repo.extend_ledger(alert.id, &[a, b]).await.unwrap(), 2);
        // Overlapping batch: only the new user is appended.
        assert_eq!(repo.extend_ledger(alert.id, &[b, c]).await.unwrap(), 1);

        let stored = repo.get(alert.id).await.unwrap().unwrap();
        assert_eq!(stored.ledger.len(), 3);
        for entry in &stored.ledger {
            assert!(!entry.read);
            assert!(entry.read_at.is_none());
        }
    }

    #[sqlx::test]
    #[ignore = "needs a running Postgres (DATABASE_URL)"]
    async fn extend_ledger_never_downgrades_a_read_entry(pool: PgPool) {
        let repo = AlertRepository::new(pool);
        let alert = stored_alert();
        assert!(repo.insert(&alert).await.unwrap());
        let user = Uuid::new_v4();

        let read = repo.mark_read(alert.id, user).await.unwrap();
        assert_eq!(repo.extend_ledger(alert.id, &[user]).await.unwrap(), 0);

        let stored = repo.get(alert.id).await.unwrap().unwrap();
        let entry = stored.ledger_entry(user).unwrap();
        assert!(entry.read);
        assert_eq!(entry.read_at, read.read_at);
    }
}
