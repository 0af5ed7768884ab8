//! API handlers for the HTTP REST API

use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::alerting::FanoutService;
use crate::db::{
    AlertRepository, Database, HospitalDirectory, NotificationRepository, OutbreakRepository,
    UserDirectory,
};
use crate::error::Error;
use crate::models::{
    Alert, AlertFilter, AlertInput, AlertPatch, LedgerEntry, Notification, Outbreak,
    OutbreakInput, OutbreakPatch, OutbreakQuery, OutbreakStats, Role,
};
use crate::realtime::PresenceRegistry;

use super::ApiError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connections bundle
    pub database: Database,
    /// Outbreak storage
    pub outbreaks: OutbreakRepository,
    /// Alert and ledger storage
    pub alerts: AlertRepository,
    /// Durable notification storage
    pub notifications: NotificationRepository,
    /// User directory seam
    pub users: Arc<dyn UserDirectory>,
    /// Hospital directory seam
    pub hospitals: Arc<dyn HospitalDirectory>,
    /// Live connection registry
    pub presence: Arc<PresenceRegistry>,
    /// Alert fan-out pipeline
    pub fanout: Arc<FanoutService>,
    /// Maximum alerts delivered in a resync snapshot
    pub resync_limit: i64,
}

/// Caller identity forwarded by the authenticating gateway.
///
/// Authentication itself is an external collaborator; this subsystem trusts
/// the `x-user-id` / `x-user-role` headers the gateway injects.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    /// Authenticated user id
    pub user_id: Uuid,
    /// Authenticated user role
    pub role: Role,
}

impl AuthContext {
    /// Reject non-admin callers.
    pub fn require_admin(&self) -> Result<(), Error> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(Error::forbidden("admin role required"))
        }
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::validation("missing x-user-id header"))?
            .parse::<Uuid>()
            .map_err(|_| Error::validation("x-user-id must be a UUID"))?;

        let role = parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::validation("missing x-user-role header"))?
            .parse::<Role>()
            .map_err(Error::validation)?;

        Ok(Self { user_id, role })
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall status (`ok` or `degraded`)
    pub status: String,
    /// Service version
    pub version: String,
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = match state.database.health_check().await {
        Ok(()) => "ok",
        Err(_) => "degraded",
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// --- Outbreaks ---

/// Ingest a new outbreak report.
///
/// Validation and the hospital existence check run before any write. Alert
/// derivation and stakeholder fan-out happen on a spawned task so the
/// creation response never waits on (or fails with) the pipeline.
pub async fn create_outbreak(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(input): Json<OutbreakInput>,
) -> Result<(StatusCode, Json<Outbreak>), ApiError> {
    let location = input.validate()?;

    state
        .hospitals
        .get(input.hospital_id)
        .await?
        .ok_or_else(|| Error::not_found("Hospital", input.hospital_id.to_string()))?;

    let outbreak = input.into_outbreak(location, auth.user_id, auth.role);
    state.outbreaks.insert(&outbreak).await?;

    info!(
        outbreak_id = %outbreak.id,
        disease = %outbreak.disease_name,
        district = %outbreak.district,
        severity = %outbreak.severity,
        "outbreak reported"
    );

    let fanout = state.fanout.clone();
    let handed_off = outbreak.clone();
    tokio::spawn(async move {
        if let Err(e) = fanout.handle_outbreak(&handed_off).await {
            error!(outbreak_id = %handed_off.id, error = %e, "alert pipeline failed");
        }
    });

    Ok((StatusCode::CREATED, Json(outbreak)))
}

/// Paginated outbreak listing response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOutbreaksResponse {
    /// Page of matching outbreaks
    pub outbreaks: Vec<Outbreak>,
    /// Total number of matches across all pages
    pub total: i64,
}

/// Keyword search and filtered listing of outbreaks
pub async fn list_outbreaks(
    State(state): State<AppState>,
    Query(query): Query<OutbreakQuery>,
) -> Result<Json<ListOutbreaksResponse>, ApiError> {
    let (outbreaks, total) = state.outbreaks.search(&query).await?;

    Ok(Json(ListOutbreaksResponse { outbreaks, total }))
}

/// Query parameters for the recent-outbreaks endpoint
#[derive(Deserialize)]
pub struct RecentQuery {
    /// Maximum number of outbreaks to return (default 10)
    pub limit: Option<i64>,
}

/// Most recently reported outbreaks
pub async fn recent_outbreaks(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<Outbreak>>, ApiError> {
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let outbreaks = state.outbreaks.recent(limit).await?;

    Ok(Json(outbreaks))
}

/// Aggregate outbreak statistics grouped by disease
pub async fn outbreak_stats(
    State(state): State<AppState>,
) -> Result<Json<Vec<OutbreakStats>>, ApiError> {
    let stats = state.outbreaks.stats().await?;

    Ok(Json(stats))
}

/// Get a single outbreak by ID
pub async fn get_outbreak(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Outbreak>, ApiError> {
    let outbreak = state
        .outbreaks
        .get(id)
        .await?
        .ok_or_else(|| Error::not_found("Outbreak", id.to_string()))?;

    Ok(Json(outbreak))
}

/// Merge a patch into an outbreak.
///
/// Only the original reporter or an admin may write; updates never re-derive
/// alerts.
pub async fn update_outbreak(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(patch): Json<OutbreakPatch>,
) -> Result<Json<Outbreak>, ApiError> {
    patch.validate()?;

    let existing = state
        .outbreaks
        .get(id)
        .await?
        .ok_or_else(|| Error::not_found("Outbreak", id.to_string()))?;

    if existing.reporter_id != auth.user_id && auth.role != Role::Admin {
        return Err(Error::forbidden(
            "only the original reporter or an admin may update an outbreak",
        )
        .into());
    }

    let updated = state
        .outbreaks
        .update(id, &patch)
        .await?
        .ok_or_else(|| Error::not_found("Outbreak", id.to_string()))?;

    Ok(Json(updated))
}

// --- Alerts ---

/// Manually author an alert (admin only) and fan it out
pub async fn create_alert(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(input): Json<AlertInput>,
) -> Result<(StatusCode, Json<Alert>), ApiError> {
    auth.require_admin()?;
    input.validate(chrono::Utc::now())?;

    let alert = input.into_alert(auth.user_id);
    state.alerts.insert(&alert).await?;

    info!(alert_id = %alert.id, severity = %alert.severity, "alert created manually");

    let fanout = state.fanout.clone();
    let handed_off = alert.clone();
    tokio::spawn(async move {
        if let Err(e) = fanout.dispatch(&handed_off).await {
            error!(alert_id = %handed_off.id, error = %e, "alert fan-out failed");
        }
    });

    Ok((StatusCode::CREATED, Json(alert)))
}

/// Paginated alert listing response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAlertsResponse {
    /// Page of matching alerts
    pub alerts: Vec<Alert>,
    /// Total number of matches across all pages
    pub total: i64,
}

/// Filtered, paginated alert listing
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(filter): Query<AlertFilter>,
) -> Result<Json<ListAlertsResponse>, ApiError> {
    let (alerts, total) = state.alerts.list(&filter).await?;

    Ok(Json(ListAlertsResponse { alerts, total }))
}

/// Unread alerts for the calling user
pub async fn unread_alerts(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<Alert>>, ApiError> {
    let alerts = state
        .alerts
        .unread_for_user(auth.user_id, auth.role, state.resync_limit)
        .await?;

    Ok(Json(alerts))
}

/// Get a single alert by ID
pub async fn get_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Alert>, ApiError> {
    let alert = state
        .alerts
        .get(id)
        .await?
        .ok_or_else(|| Error::not_found("Alert", id.to_string()))?;

    Ok(Json(alert))
}

/// Update alert fields (admin only)
pub async fn update_alert(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(patch): Json<AlertPatch>,
) -> Result<Json<Alert>, ApiError> {
    auth.require_admin()?;
    patch.validate(chrono::Utc::now())?;

    let alert = state
        .alerts
        .update(id, &patch)
        .await?
        .ok_or_else(|| Error::not_found("Alert", id.to_string()))?;

    Ok(Json(alert))
}

/// Delete an alert (admin only)
pub async fn delete_alert(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    auth.require_admin()?;

    let deleted = state.alerts.delete(id).await?;
    if !deleted {
        return Err(Error::not_found("Alert", id.to_string()).into());
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Mark an alert as read for the calling user (self-scoped, idempotent)
pub async fn mark_alert_read(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<LedgerEntry>, ApiError> {
    let entry = state
        .alerts
        .mark_read(id, auth.user_id)
        .await?;

    Ok(Json(entry))
}

/// Request body for resolving an alert
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    /// Free-form notes recorded with the resolution
    pub resolution_notes: Option<String>,
}

/// Resolve an alert (admin only, terminal, one-way).
///
/// Broadcasts `alertResolved` to connected users already holding a ledger
/// entry. Resolving an already-resolved alert is a no-op without broadcast.
pub async fn resolve_alert(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<Alert>, ApiError> {
    auth.require_admin()?;

    let (alert, newly_resolved) = state
        .alerts
        .resolve(id, request.resolution_notes.as_deref())
        .await?
        .ok_or_else(|| Error::not_found("Alert", id.to_string()))?;

    if newly_resolved {
        info!(alert_id = %alert.id, "alert resolved");
        state.fanout.broadcast_resolution(&alert);
    }

    Ok(Json(alert))
}

// --- Notifications ---

/// Recent durable notifications for the calling user
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let notifications = state
        .notifications
        .recent_for_user(auth.user_id, 50)
        .await?;

    Ok(Json(notifications))
}
