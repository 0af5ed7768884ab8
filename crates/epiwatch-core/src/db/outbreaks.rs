//! Outbreak registry — storage and query surface for outbreak reports

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    GeoPoint, Outbreak, OutbreakPatch, OutbreakQuery, OutbreakStats, OutbreakStatus, Role, Severity,
};

/// Repository for outbreak reports
#[derive(Clone)]
pub struct OutbreakRepository {
    pool: PgPool,
}

impl OutbreakRepository {
    /// Create a new outbreak repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a new outbreak report
    pub async fn insert(&self, outbreak: &Outbreak) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO outbreaks (
                id, disease_name, disease_code, longitude, latitude,
                area, district, state, pincode, hospital_id,
                reporter_id, reporter_role, cases_reported, severity, status,
                symptoms, affected_age_groups, transmission_type, containment_measures, notes,
                first_reported_at, last_updated_at, alert_sent
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23
            )
            "#,
        )
        .bind(outbreak.id)
        .bind(&outbreak.disease_name)
        .bind(&outbreak.disease_code)
        .bind(outbreak.location.longitude)
        .bind(outbreak.location.latitude)
        .bind(&outbreak.area)
        .bind(&outbreak.district)
        .bind(&outbreak.state)
        .bind(&outbreak.pincode)
        .bind(outbreak.hospital_id)
        .bind(outbreak.reporter_id)
        .bind(outbreak.reporter_role.as_str())
        .bind(outbreak.cases_reported)
        .bind(outbreak.severity.as_str())
        .bind(outbreak.status.as_str())
        .bind(serde_json::to_value(&outbreak.symptoms)?)
        .bind(serde_json::to_value(&outbreak.affected_age_groups)?)
        .bind(&outbreak.transmission_type)
        .bind(serde_json::to_value(&outbreak.containment_measures)?)
        .bind(&outbreak.notes)
        .bind(outbreak.first_reported_at)
        .bind(outbreak.last_updated_at)
        .bind(outbreak.alert_sent)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get an outbreak by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<Outbreak>> {
        let row = sqlx::query_as::<_, OutbreakRow>("SELECT * FROM outbreaks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Merge a patch into an outbreak, refreshing `last_updated_at`.
    ///
    /// Authorization (reporter or admin) is checked by the caller before any
    /// write; this method only applies the merge.
    pub async fn update(&self, id: Uuid, patch: &OutbreakPatch) -> Result<Option<Outbreak>> {
        let symptoms = patch
            .symptoms
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        let age_groups = patch
            .affected_age_groups
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        let measures = patch
            .containment_measures
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE outbreaks SET
                cases_reported = COALESCE($2, cases_reported),
                severity = COALESCE($3, severity),
                status = COALESCE($4, status),
                symptoms = COALESCE($5, symptoms),
                affected_age_groups = COALESCE($6, affected_age_groups),
                transmission_type = COALESCE($7, transmission_type),
                containment_measures = COALESCE($8, containment_measures),
                notes = COALESCE($9, notes),
                last_updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(patch.cases_reported)
        .bind(patch.severity.map(Severity::as_str))
        .bind(patch.status.map(OutbreakStatus::as_str))
        .bind(symptoms)
        .bind(age_groups)
        .bind(&patch.transmission_type)
        .bind(measures)
        .bind(&patch.notes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get(id).await
    }

    /// Paginated keyword search with optional exact filters.
    ///
    /// The keyword matches disease name, area, district, and state. Returns
    /// the page plus the total row count for the filter.
    pub async fn search(&self, query: &OutbreakQuery) -> Result<(Vec<Outbreak>, i64)> {
        let (limit, offset) = query.pagination();

        let rows = sqlx::query_as::<_, OutbreakRow>(
            r#"
            SELECT * FROM outbreaks
            WHERE ($1::text IS NULL OR disease_name ILIKE '%' || $1 || '%'
                   OR area ILIKE '%' || $1 || '%'
                   OR district ILIKE '%' || $1 || '%'
                   OR state ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR district = $2)
              AND ($3::text IS NULL OR state = $3)
              AND ($4::text IS NULL OR disease_name = $4)
            ORDER BY first_reported_at DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(&query.keyword)
        .bind(&query.district)
        .bind(&query.state)
        .bind(&query.disease)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM outbreaks
            WHERE ($1::text IS NULL OR disease_name ILIKE '%' || $1 || '%'
                   OR area ILIKE '%' || $1 || '%'
                   OR district ILIKE '%' || $1 || '%'
                   OR state ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR district = $2)
              AND ($3::text IS NULL OR state = $3)
              AND ($4::text IS NULL OR disease_name = $4)
            "#,
        )
        .bind(&query.keyword)
        .bind(&query.district)
        .bind(&query.state)
        .bind(&query.disease)
        .fetch_one(&self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// List the most recently reported outbreaks
    pub async fn recent(&self, limit: i64) -> Result<Vec<Outbreak>> {
        let rows = sqlx::query_as::<_, OutbreakRow>(
            r#"
            SELECT * FROM outbreaks
            ORDER BY first_reported_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Aggregate statistics grouped by disease name
    pub async fn stats(&self) -> Result<Vec<OutbreakStats>> {
        let rows = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT
                disease_name,
                COUNT(*) AS outbreak_count,
                SUM(cases_reported)::BIGINT AS total_cases,
                array_agg(DISTINCT severity) AS severities,
                array_agg(DISTINCT state) AS states
            FROM outbreaks
            GROUP BY disease_name
            ORDER BY total_cases DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Record that an alert has been dispatched for this outbreak
    pub async fn mark_alert_sent(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE outbreaks SET alert_sent = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

// Database row types for mapping

#[derive(sqlx::FromRow)]
struct OutbreakRow {
    id: Uuid,
    disease_name: String,
    disease_code: String,
    longitude: f64,
    latitude: f64,
    area: String,
    district: String,
    state: String,
    pincode: String,
    hospital_id: Uuid,
    reporter_id: Uuid,
    reporter_role: String,
    cases_reported: i32,
    severity: String,
    status: String,
    symptoms: serde_json::Value,
    affected_age_groups: serde_json::Value,
    transmission_type: Option<String>,
    containment_measures: serde_json::Value,
    notes: Option<String>,
    first_reported_at: DateTime<Utc>,
    last_updated_at: DateTime<Utc>,
    alert_sent: bool,
}

impl From<OutbreakRow> for Outbreak {
    fn from(row: OutbreakRow) -> Self {
        Outbreak {
            id: row.id,
            disease_name: row.disease_name,
            disease_code: row.disease_code,
            location: GeoPoint {
                longitude: row.longitude,
                latitude: row.latitude,
            },
            area: row.area,
            district: row.district,
            state: row.state,
            pincode: row.pincode,
            hospital_id: row.hospital_id,
            reporter_id: row.reporter_id,
            reporter_role: row.reporter_role.parse().unwrap_or(Role::Doctor),
            cases_reported: row.cases_reported,
            severity: row.severity.parse().unwrap_or_default(),
            status: row.status.parse().unwrap_or_default(),
            symptoms: serde_json::from_value(row.symptoms).unwrap_or_default(),
            affected_age_groups: serde_json::from_value(row.affected_age_groups).unwrap_or_default(),
            transmission_type: row.transmission_type,
            containment_measures: serde_json::from_value(row.containment_measures).unwrap_or_default(),
            notes: row.notes,
            first_reported_at: row.first_reported_at,
            last_updated_at: row.last_updated_at,
            alert_sent: row.alert_sent,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    disease_name: String,
    outbreak_count: i64,
    total_cases: i64,
    severities: Vec<String>,
    states: Vec<String>,
}

impl From<StatsRow> for OutbreakStats {
    fn from(row: StatsRow) -> Self {
        OutbreakStats {
            disease_name: row.disease_name,
            outbreak_count: row.outbreak_count,
            total_cases: row.total_cases,
            severities: row
                .severities
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect(),
            states: row.states,
        }
    }
}
