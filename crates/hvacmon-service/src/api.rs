//! REST API endpoints for the hvacmon-service.
//!
//! This module provides HTTP endpoints for units, readings, statistics,
//! threshold configs, the maintenance log and account management.
//!
//! # Concurrency and Lock Acquisition
//!
//! All async handlers that access shared state acquire locks in a
//! consistent order to prevent deadlocks:
//!
//! 1. `state.config` (RwLock) - read lock only, for auth settings
//! 2. `state.store` (Mutex) - held briefly during queries; avoid
//!    long-running operations while holding this lock
//!
//! # Authorization
//!
//! Every route except `/api/health` and `/api/auth/login` sits behind the
//! session middleware. Roles gate mutations: operators submit readings
//! and read everything, supervisors manage units, thresholds and the
//! maintenance log, admins additionally manage accounts and delete units.
//!
//! # Error Handling
//!
//! All endpoints return structured JSON errors via [`AppError`]. Store
//! "not found" errors map to 404, rejected threshold bounds to 400,
//! duplicate usernames to 409; remaining store errors return 500.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Extension, Json, Router, middleware,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use hvacmon_core::{AggregateStats, Period, ThresholdCheck, evaluate_thresholds};
use hvacmon_store::{
    NewMaintenance, NewReading, NewThreshold, NewUnit, NewUser, ReadingQuery, User, UserUpdate,
};
use hvacmon_types::{MaintenanceRecord, Reading, Role, ThresholdConfig, Unit};

use crate::auth::{self, bearer_token, require_role};
use crate::state::{AppState, AuthUser};

/// Create the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        // Session management
        .route("/api/auth/logout", post(logout))
        // Unit registry
        .route("/api/units", get(list_units).post(create_unit))
        .route(
            "/api/units/{id}",
            get(get_unit).put(update_unit).delete(delete_unit),
        )
        .route("/api/units/{id}/readings", get(get_unit_readings))
        .route("/api/units/{id}/stats", get(get_unit_stats))
        .route("/api/locations", get(list_locations))
        // Readings
        .route("/api/readings", get(get_all_readings).post(submit_reading))
        .route("/api/readings/{id}", axum::routing::delete(delete_reading))
        // Statistics
        .route("/api/stats", get(get_global_stats))
        .route("/api/stats/units", get(get_stats_by_unit))
        .route("/api/stats/locations", get(get_stats_by_location))
        // Threshold configs
        .route("/api/thresholds", get(list_thresholds).post(create_threshold))
        .route(
            "/api/thresholds/{id}",
            get(get_threshold).put(update_threshold).delete(delete_threshold),
        )
        // Maintenance log
        .route(
            "/api/maintenance",
            get(list_maintenance).post(create_maintenance),
        )
        .route(
            "/api/maintenance/{id}",
            get(get_maintenance).delete(delete_maintenance),
        )
        .route(
            "/api/maintenance/{id}/attachment",
            get(get_maintenance_attachment),
        )
        // Accounts (admin only)
        .route("/api/users", get(list_users).post(create_user))
        .route(
            "/api/users/{username}",
            put(update_user).delete(delete_user),
        )
        // CSV export
        .route("/api/export/readings.csv", get(export_readings))
        .route("/api/export/units.csv", get(export_units))
        .route("/api/export/maintenance.csv", get(export_maintenance))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_session,
        ));

    Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(login))
        .merge(protected)
        .with_state(state)
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

// ==========================================================================
// Authentication
// ==========================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub role: Role,
}

/// Exchange credentials for a session token.
///
/// Returns 401 for unknown usernames and wrong passwords alike.
async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = {
        let store = state.store.lock().await;
        store.verify_credentials(&request.username, &request.password)?
    };

    let Some(user) = user else {
        return Err(AppError::Unauthorized(
            "Invalid username or password".to_string(),
        ));
    };

    let token = state.create_session(&user).await;
    Ok(Json(LoginResponse {
        token,
        username: user.username,
        role: user.role,
    }))
}

/// Invalidate the caller's session token.
async fn logout(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> StatusCode {
    if let Some(token) = bearer_token(&headers) {
        state.revoke_session(token).await;
    }
    StatusCode::NO_CONTENT
}

// ==========================================================================
// Units
// ==========================================================================

async fn list_units(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Unit>>, AppError> {
    let store = state.store.lock().await;
    Ok(Json(store.list_units()?))
}

async fn get_unit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Unit>, AppError> {
    let store = state.store.lock().await;
    let unit = store
        .get_unit(id)?
        .ok_or(AppError::NotFound(format!("Unit not found: {}", id)))?;
    Ok(Json(unit))
}

async fn create_unit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(unit): Json<NewUnit>,
) -> Result<(StatusCode, Json<Unit>), AppError> {
    require_role(&user, Role::Supervisor)?;

    let store = state.store.lock().await;
    let created = store.create_unit(&unit)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_unit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(unit): Json<NewUnit>,
) -> Result<Json<Unit>, AppError> {
    require_role(&user, Role::Supervisor)?;

    let store = state.store.lock().await;
    Ok(Json(store.update_unit(id, &unit)?))
}

/// Delete a unit and everything recorded against it.
async fn delete_unit(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_role(&user, Role::Admin)?;

    let store = state.store.lock().await;
    store.delete_unit(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Distinct locations covered by the unit registry.
async fn list_locations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, AppError> {
    let store = state.store.lock().await;
    Ok(Json(store.list_locations()?))
}

// ==========================================================================
// Readings
// ==========================================================================

/// A newly stored reading together with its threshold evaluation.
#[derive(Debug, Serialize)]
pub struct SubmitReadingResponse {
    pub reading: Reading,
    pub check: ThresholdCheck,
}

/// Store a reading and evaluate it against every applicable threshold
/// config in one round trip.
async fn submit_reading(
    State(state): State<Arc<AppState>>,
    Json(reading): Json<NewReading>,
) -> Result<(StatusCode, Json<SubmitReadingResponse>), AppError> {
    let store = state.store.lock().await;
    let stored = store.insert_reading(&reading)?;
    let configs = store.thresholds_for_unit(stored.unit_id)?;
    drop(store);

    let check = evaluate_thresholds(&stored, &configs);
    Ok((
        StatusCode::CREATED,
        Json(SubmitReadingResponse {
            reading: stored,
            check,
        }),
    ))
}

/// Remove an erroneous observation.
async fn delete_reading(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_role(&user, Role::Supervisor)?;

    let store = state.store.lock().await;
    store.delete_reading(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Query parameters for readings.
#[derive(Debug, Deserialize, Default)]
pub struct ReadingsQueryParams {
    pub unit_id: Option<i64>,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ReadingsQueryParams {
    /// Validate the query parameters.
    /// Returns an error if `since > until`.
    pub fn validate(&self) -> Result<(), AppError> {
        if let (Some(since), Some(until)) = (self.since, self.until)
            && since > until
        {
            return Err(AppError::BadRequest(format!(
                "Invalid time range: 'since' ({}) must be less than or equal to 'until' ({})",
                since, until
            )));
        }
        Ok(())
    }

    fn to_query(&self) -> ReadingQuery {
        let mut query = ReadingQuery::new();
        if let Some(unit_id) = self.unit_id {
            query = query.unit(unit_id);
        }
        if let Some(since) = self.since
            && let Ok(dt) = OffsetDateTime::from_unix_timestamp(since)
        {
            query = query.since(dt);
        }
        if let Some(until) = self.until
            && let Ok(dt) = OffsetDateTime::from_unix_timestamp(until)
        {
            query = query.until(dt);
        }
        query
    }
}

/// Paginated response wrapper with metadata.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    /// The data items.
    pub data: Vec<T>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Pagination metadata.
#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    /// Number of items returned.
    pub count: usize,
    /// Offset from the beginning.
    pub offset: u32,
    /// Maximum items requested (if specified).
    pub limit: Option<u32>,
    /// Whether there are more items available.
    pub has_more: bool,
}

async fn paginated_readings(
    state: &AppState,
    params: &ReadingsQueryParams,
) -> Result<PaginatedResponse<Reading>, AppError> {
    params.validate()?;

    let mut query = params.to_query();
    // Request one extra item to determine if there are more
    if let Some(limit) = params.limit {
        query = query.limit(limit + 1);
    }
    if let Some(offset) = params.offset {
        query = query.offset(offset);
    }

    let store = state.store.lock().await;
    let mut readings = store.query_readings(&query)?;
    drop(store);

    let has_more = params.limit.is_some_and(|l| readings.len() > l as usize);
    if has_more {
        readings.pop();
    }

    Ok(PaginatedResponse {
        pagination: PaginationMeta {
            count: readings.len(),
            offset: params.offset.unwrap_or(0),
            limit: params.limit,
            has_more,
        },
        data: readings,
    })
}

/// Get readings across all units, paginated.
///
/// # Query Parameters
///
/// - `unit_id`: restrict to one unit
/// - `since` / `until`: Unix timestamps (inclusive)
/// - `limit` / `offset`: pagination
async fn get_all_readings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReadingsQueryParams>,
) -> Result<Json<PaginatedResponse<Reading>>, AppError> {
    Ok(Json(paginated_readings(&state, &params).await?))
}

/// Get readings for one unit, paginated.
async fn get_unit_readings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(mut params): Query<ReadingsQueryParams>,
) -> Result<Json<PaginatedResponse<Reading>>, AppError> {
    {
        let store = state.store.lock().await;
        if store.get_unit(id)?.is_none() {
            return Err(AppError::NotFound(format!("Unit not found: {}", id)));
        }
    }
    params.unit_id = Some(id);
    Ok(Json(paginated_readings(&state, &params).await?))
}

// ==========================================================================
// Statistics
// ==========================================================================

/// Query parameters for statistics endpoints.
#[derive(Debug, Deserialize, Default)]
pub struct StatsQueryParams {
    /// Reporting window: `week`, `month`, `year` or `all` (default).
    pub period: Option<String>,
}

impl StatsQueryParams {
    fn parse_period(&self) -> Result<Period, AppError> {
        match &self.period {
            None => Ok(Period::All),
            Some(s) => Period::parse(s).ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Invalid period '{}': expected week, month, year or all",
                    s
                ))
            }),
        }
    }
}

/// Statistics over a single group of readings.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub period: Period,
    pub stats: AggregateStats,
}

/// Statistics grouped by unit id or location.
#[derive(Debug, Serialize)]
pub struct GroupedStatsResponse<K: Ord> {
    pub period: Period,
    pub groups: BTreeMap<K, AggregateStats>,
}

fn period_query(period: Period) -> ReadingQuery {
    let mut query = ReadingQuery::new();
    if let Some(cutoff) = period.cutoff(OffsetDateTime::now_utc()) {
        query = query.since(cutoff);
    }
    query
}

/// Global statistics over the reporting window.
///
/// A window with no readings yields `count == 0` with zeroed stats,
/// not an error.
async fn get_global_stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatsQueryParams>,
) -> Result<Json<StatsResponse>, AppError> {
    let period = params.parse_period()?;

    let store = state.store.lock().await;
    let readings = store.query_readings(&period_query(period))?;
    drop(store);

    Ok(Json(StatsResponse {
        period,
        stats: hvacmon_core::aggregate_global(&readings).rounded(),
    }))
}

/// Per-unit statistics over the reporting window.
async fn get_stats_by_unit(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatsQueryParams>,
) -> Result<Json<GroupedStatsResponse<i64>>, AppError> {
    let period = params.parse_period()?;

    let store = state.store.lock().await;
    let readings = store.query_readings(&period_query(period))?;
    drop(store);

    let groups = hvacmon_core::aggregate_by_unit(&readings)
        .into_iter()
        .map(|(k, s)| (k, s.rounded()))
        .collect();

    Ok(Json(GroupedStatsResponse { period, groups }))
}

/// Per-location statistics over the reporting window. Readings whose
/// unit has been deleted are left out.
async fn get_stats_by_location(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatsQueryParams>,
) -> Result<Json<GroupedStatsResponse<String>>, AppError> {
    let period = params.parse_period()?;

    let store = state.store.lock().await;
    let readings = store.query_readings(&period_query(period))?;
    let units = store.list_units()?;
    drop(store);

    let groups = hvacmon_core::aggregate_by_location(&readings, &units)
        .into_iter()
        .map(|(k, s)| (k, s.rounded()))
        .collect();

    Ok(Json(GroupedStatsResponse { period, groups }))
}

/// Statistics for one unit over the reporting window.
async fn get_unit_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<StatsQueryParams>,
) -> Result<Json<StatsResponse>, AppError> {
    let period = params.parse_period()?;

    let store = state.store.lock().await;
    if store.get_unit(id)?.is_none() {
        return Err(AppError::NotFound(format!("Unit not found: {}", id)));
    }
    let readings = store.query_readings(&period_query(period).unit(id))?;
    drop(store);

    Ok(Json(StatsResponse {
        period,
        stats: hvacmon_core::aggregate_global(&readings).rounded(),
    }))
}

// ==========================================================================
// Threshold configs
// ==========================================================================

/// Query parameters for threshold config listings.
#[derive(Debug, Deserialize, Default)]
pub struct ThresholdsQueryParams {
    pub unit_id: Option<i64>,
    #[serde(default)]
    pub global_only: bool,
}

async fn list_thresholds(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ThresholdsQueryParams>,
) -> Result<Json<Vec<ThresholdConfig>>, AppError> {
    let store = state.store.lock().await;
    let thresholds = if params.global_only {
        store.list_global_thresholds()?
    } else if let Some(unit_id) = params.unit_id {
        store.thresholds_for_unit(unit_id)?
    } else {
        store.list_thresholds()?
    };
    Ok(Json(thresholds))
}

async fn get_threshold(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ThresholdConfig>, AppError> {
    let store = state.store.lock().await;
    let threshold = store
        .get_threshold(id)?
        .ok_or(AppError::NotFound(format!("Threshold not found: {}", id)))?;
    Ok(Json(threshold))
}

async fn create_threshold(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(threshold): Json<NewThreshold>,
) -> Result<(StatusCode, Json<ThresholdConfig>), AppError> {
    require_role(&user, Role::Supervisor)?;

    let store = state.store.lock().await;
    let created = store.create_threshold(&threshold)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_threshold(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(threshold): Json<NewThreshold>,
) -> Result<Json<ThresholdConfig>, AppError> {
    require_role(&user, Role::Supervisor)?;

    let store = state.store.lock().await;
    Ok(Json(store.update_threshold(id, &threshold)?))
}

async fn delete_threshold(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_role(&user, Role::Supervisor)?;

    let store = state.store.lock().await;
    store.delete_threshold(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ==========================================================================
// Maintenance log
// ==========================================================================

/// Query parameters for the maintenance log.
#[derive(Debug, Deserialize, Default)]
pub struct MaintenanceQueryParams {
    pub unit_id: Option<i64>,
}

async fn list_maintenance(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MaintenanceQueryParams>,
) -> Result<Json<Vec<MaintenanceRecord>>, AppError> {
    let store = state.store.lock().await;
    Ok(Json(store.list_maintenance(params.unit_id)?))
}

async fn get_maintenance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<MaintenanceRecord>, AppError> {
    let store = state.store.lock().await;
    let record = store.get_maintenance(id)?.ok_or(AppError::NotFound(format!(
        "Maintenance record not found: {}",
        id
    )))?;
    Ok(Json(record))
}

async fn create_maintenance(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(record): Json<NewMaintenance>,
) -> Result<(StatusCode, Json<MaintenanceRecord>), AppError> {
    require_role(&user, Role::Supervisor)?;

    let store = state.store.lock().await;
    let created = store.insert_maintenance(&record)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Serve the attachment bytes with their stored content type.
async fn get_maintenance_attachment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let store = state.store.lock().await;
    let attachment = store
        .get_maintenance_attachment(id)?
        .ok_or(AppError::NotFound(format!(
            "Maintenance record {} has no attachment",
            id
        )))?;
    drop(store);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, attachment.content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", attachment.filename),
            ),
        ],
        attachment.data,
    )
        .into_response())
}

async fn delete_maintenance(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_role(&user, Role::Supervisor)?;

    let store = state.store.lock().await;
    store.delete_maintenance(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ==========================================================================
// Accounts
// ==========================================================================

async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<User>>, AppError> {
    require_role(&user, Role::Admin)?;

    let store = state.store.lock().await;
    Ok(Json(store.list_users()?))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(new_user): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), AppError> {
    require_role(&user, Role::Admin)?;

    let store = state.store.lock().await;
    let created = store.create_user(&new_user)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(username): Path<String>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<User>, AppError> {
    require_role(&user, Role::Admin)?;

    let updated = {
        let store = state.store.lock().await;
        store.update_user(&username, &update)?
    };

    // Role or password changes invalidate existing sessions
    if update.role.is_some() || update.password.is_some() {
        state.revoke_sessions_for(&username).await;
    }

    Ok(Json(updated))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(username): Path<String>,
) -> Result<StatusCode, AppError> {
    require_role(&user, Role::Admin)?;

    if username == user.username {
        return Err(AppError::BadRequest(
            "Cannot delete your own account".to_string(),
        ));
    }

    {
        let store = state.store.lock().await;
        store.delete_user(&username)?;
    }
    state.revoke_sessions_for(&username).await;

    Ok(StatusCode::NO_CONTENT)
}

// ==========================================================================
// CSV export
// ==========================================================================

/// Export readings as CSV, honoring the same filters as the readings
/// endpoints. Rows come out oldest first.
async fn export_readings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReadingsQueryParams>,
) -> Result<Response, AppError> {
    params.validate()?;

    let query = params.to_query().oldest_first();
    let store = state.store.lock().await;
    let csv = store.export_readings_csv(&query)?;
    drop(store);

    Ok(csv_response("readings.csv", csv))
}

/// Export the unit registry as CSV.
async fn export_units(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let store = state.store.lock().await;
    let csv = store.export_units_csv()?;
    drop(store);

    Ok(csv_response("units.csv", csv))
}

/// Export the maintenance log as CSV, optionally filtered to one unit.
/// Attachment bytes stay out of the export.
async fn export_maintenance(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MaintenanceQueryParams>,
) -> Result<Response, AppError> {
    let store = state.store.lock().await;
    let csv = store.export_maintenance_csv(params.unit_id)?;
    drop(store);

    Ok(csv_response("maintenance.csv", csv))
}

fn csv_response(filename: &str, csv: String) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        csv,
    )
        .into_response()
}

// ==========================================================================
// Errors
// ==========================================================================

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    Store(hvacmon_store::Error),
    Internal(String),
}

impl From<hvacmon_store::Error> for AppError {
    fn from(e: hvacmon_store::Error) -> Self {
        use hvacmon_store::Error;
        match e {
            Error::UnitNotFound(id) => AppError::NotFound(format!("Unit not found: {}", id)),
            Error::ReadingNotFound(id) => {
                AppError::NotFound(format!("Reading not found: {}", id))
            }
            Error::ThresholdNotFound(id) => {
                AppError::NotFound(format!("Threshold not found: {}", id))
            }
            Error::MaintenanceNotFound(id) => {
                AppError::NotFound(format!("Maintenance record not found: {}", id))
            }
            Error::UserNotFound(name) => AppError::NotFound(format!("User not found: {}", name)),
            Error::DuplicateUsername(name) => {
                AppError::Conflict(format!("Username already taken: {}", name))
            }
            Error::InvalidThresholds(e) => AppError::BadRequest(e.to_string()),
            other => AppError::Store(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::config::Config;
    use hvacmon_store::Store;

    fn create_test_state() -> Arc<AppState> {
        let store = Store::open_in_memory().unwrap();
        store.ensure_default_admin("admin", "admin").unwrap();
        AppState::new(store, Config::default())
    }

    async fn response_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn response_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn login_as(app: &Router, username: &str, password: &str) -> String {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/login")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({"username": username, "password": password})
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        body["token"].as_str().unwrap().to_string()
    }

    fn get(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    fn post_json(uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_requires_no_auth() {
        let app = router(create_test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_protected_route_rejects_missing_token() {
        let app = router(create_test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/units")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password() {
        let app = router(create_test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/login")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({"username": "admin", "password": "wrong"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_invalidates_token() {
        let app = router(create_test_state());
        let token = login_as(&app, "admin", "admin").await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/logout")
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app.oneshot(get("/api/units", &token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unit_crud() {
        let app = router(create_test_state());
        let token = login_as(&app, "admin", "admin").await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/units",
                &token,
                serde_json::json!({
                    "name": "AC-1",
                    "location": "Server Room",
                    "installed_on": "2022-06-01"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = response_json(response).await;
        let id = created["id"].as_i64().unwrap();

        let response = app
            .clone()
            .oneshot(get(&format!("/api/units/{}", id), &token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let fetched = response_json(response).await;
        assert_eq!(fetched["name"], "AC-1");
        assert_eq!(fetched["installed_on"], "2022-06-01");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/units/{}", id))
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(get(&format!("/api/units/{}", id), &token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_operator_cannot_create_unit() {
        let state = create_test_state();
        {
            let store = state.store.try_lock().unwrap();
            store
                .create_user(&NewUser {
                    username: "ops".to_string(),
                    password: "hunter2".to_string(),
                    role: Role::Operator,
                    full_name: None,
                })
                .unwrap();
        }
        let app = router(state);
        let token = login_as(&app, "ops", "hunter2").await;

        let response = app
            .oneshot(post_json(
                "/api/units",
                &token,
                serde_json::json!({
                    "name": "AC-1",
                    "location": "Lobby",
                    "installed_on": "2022-06-01"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_users_endpoint_is_admin_only() {
        let state = create_test_state();
        {
            let store = state.store.try_lock().unwrap();
            store
                .create_user(&NewUser {
                    username: "super".to_string(),
                    password: "hunter2".to_string(),
                    role: Role::Supervisor,
                    full_name: None,
                })
                .unwrap();
        }
        let app = router(state);
        let token = login_as(&app, "super", "hunter2").await;

        let response = app.oneshot(get("/api/users", &token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_submit_reading_reports_violations() {
        let app = router(create_test_state());
        let token = login_as(&app, "admin", "admin").await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/units",
                &token,
                serde_json::json!({
                    "name": "AC-1",
                    "location": "Lobby",
                    "installed_on": "2022-06-01"
                }),
            ))
            .await
            .unwrap();
        let unit_id = response_json(response).await["id"].as_i64().unwrap();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/thresholds",
                &token,
                serde_json::json!({
                    "name": "default",
                    "temp_min": 18.0, "temp_max": 24.0,
                    "hum_min": 30.0, "hum_max": 70.0
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(post_json(
                "/api/readings",
                &token,
                serde_json::json!({
                    "unit_id": unit_id,
                    "temperature": 30.0,
                    "humidity": 50.0
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = response_json(response).await;
        assert_eq!(body["check"]["within_limits"], false);
        let alerts = body["check"]["alerts"].as_array().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0]["variable"], "temperature");
        assert_eq!(alerts[0]["violated_bound"], "above");
    }

    #[tokio::test]
    async fn test_submit_reading_unknown_unit_is_404() {
        let app = router(create_test_state());
        let token = login_as(&app, "admin", "admin").await;

        let response = app
            .oneshot(post_json(
                "/api/readings",
                &token,
                serde_json::json!({"unit_id": 42, "temperature": 21.0, "humidity": 50.0}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_threshold_bounds_are_400() {
        let app = router(create_test_state());
        let token = login_as(&app, "admin", "admin").await;

        let response = app
            .oneshot(post_json(
                "/api/thresholds",
                &token,
                serde_json::json!({
                    "name": "bad",
                    "temp_min": 25.0, "temp_max": 20.0,
                    "hum_min": 30.0, "hum_max": 70.0
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_thresholds_global_only() {
        let app = router(create_test_state());
        let token = login_as(&app, "admin", "admin").await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/units",
                &token,
                serde_json::json!({
                    "name": "AC-1",
                    "location": "Server Room",
                    "installed_on": "2022-06-01"
                }),
            ))
            .await
            .unwrap();
        let unit = response_json(response).await;
        let unit_id = unit["id"].as_i64().unwrap();

        for scope in [
            serde_json::json!({ "kind": "global" }),
            serde_json::json!({ "kind": "unit", "unit_id": unit_id }),
        ] {
            let response = app
                .clone()
                .oneshot(post_json(
                    "/api/thresholds",
                    &token,
                    serde_json::json!({
                        "name": "band",
                        "scope": scope,
                        "temp_min": 18.0, "temp_max": 26.0,
                        "hum_min": 30.0, "hum_max": 70.0
                    }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app
            .oneshot(get("/api/thresholds?global_only=true", &token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response_json(response).await;
        let configs = body.as_array().unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0]["scope"]["kind"], "global");
    }

    #[tokio::test]
    async fn test_global_stats_empty_window() {
        let app = router(create_test_state());
        let token = login_as(&app, "admin", "admin").await;

        let response = app
            .oneshot(get("/api/stats?period=week", &token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response_json(response).await;
        assert_eq!(body["period"], "week");
        assert_eq!(body["stats"]["count"], 0);
        assert_eq!(body["stats"]["temperature"]["mean"], 0.0);
    }

    #[tokio::test]
    async fn test_stats_rejects_unknown_period() {
        let app = router(create_test_state());
        let token = login_as(&app, "admin", "admin").await;

        let response = app
            .oneshot(get("/api/stats?period=fortnight", &token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stats_by_unit_after_readings() {
        let app = router(create_test_state());
        let token = login_as(&app, "admin", "admin").await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/units",
                &token,
                serde_json::json!({
                    "name": "AC-1",
                    "location": "Lobby",
                    "installed_on": "2022-06-01"
                }),
            ))
            .await
            .unwrap();
        let unit_id = response_json(response).await["id"].as_i64().unwrap();

        for temp in [20.0, 22.0, 24.0] {
            let response = app
                .clone()
                .oneshot(post_json(
                    "/api/readings",
                    &token,
                    serde_json::json!({
                        "unit_id": unit_id,
                        "temperature": temp,
                        "humidity": 50.0
                    }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app.oneshot(get("/api/stats/units", &token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response_json(response).await;
        let group = &body["groups"][unit_id.to_string()];
        assert_eq!(group["count"], 3);
        assert_eq!(group["temperature"]["mean"], 22.0);
        assert_eq!(group["temperature"]["stddev"], 2.0);
    }

    #[tokio::test]
    async fn test_readings_pagination_has_more() {
        let app = router(create_test_state());
        let token = login_as(&app, "admin", "admin").await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/units",
                &token,
                serde_json::json!({
                    "name": "AC-1",
                    "location": "Lobby",
                    "installed_on": "2022-06-01"
                }),
            ))
            .await
            .unwrap();
        let unit_id = response_json(response).await["id"].as_i64().unwrap();

        for _ in 0..3 {
            app.clone()
                .oneshot(post_json(
                    "/api/readings",
                    &token,
                    serde_json::json!({
                        "unit_id": unit_id,
                        "temperature": 21.0,
                        "humidity": 50.0
                    }),
                ))
                .await
                .unwrap();
        }

        let response = app
            .oneshot(get("/api/readings?limit=2", &token))
            .await
            .unwrap();
        let body = response_json(response).await;
        assert_eq!(body["pagination"]["count"], 2);
        assert_eq!(body["pagination"]["has_more"], true);
    }

    #[tokio::test]
    async fn test_readings_invalid_time_range() {
        let app = router(create_test_state());
        let token = login_as(&app, "admin", "admin").await;

        let response = app
            .oneshot(get("/api/readings?since=200&until=100", &token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_locations() {
        let app = router(create_test_state());
        let token = login_as(&app, "admin", "admin").await;

        for (name, location) in [("AC-1", "Lobby"), ("AC-2", "Roof"), ("AC-3", "Lobby")] {
            let response = app
                .clone()
                .oneshot(post_json(
                    "/api/units",
                    &token,
                    serde_json::json!({
                        "name": name,
                        "location": location,
                        "installed_on": "2022-06-01"
                    }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app.oneshot(get("/api/locations", &token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        assert_eq!(body, serde_json::json!(["Lobby", "Roof"]));
    }

    #[tokio::test]
    async fn test_delete_reading_requires_supervisor() {
        let state = create_test_state();
        {
            let store = state.store.try_lock().unwrap();
            store
                .create_user(&NewUser {
                    username: "ops".to_string(),
                    password: "hunter2".to_string(),
                    role: Role::Operator,
                    full_name: None,
                })
                .unwrap();
        }
        let app = router(state);
        let admin = login_as(&app, "admin", "admin").await;
        let ops = login_as(&app, "ops", "hunter2").await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/units",
                &admin,
                serde_json::json!({
                    "name": "AC-1",
                    "location": "Lobby",
                    "installed_on": "2022-06-01"
                }),
            ))
            .await
            .unwrap();
        let unit_id = response_json(response).await["id"].as_i64().unwrap();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/readings",
                &ops,
                serde_json::json!({"unit_id": unit_id, "temperature": 21.0, "humidity": 50.0}),
            ))
            .await
            .unwrap();
        let reading_id = response_json(response).await["reading"]["id"].as_i64().unwrap();

        let delete = |token: &str| {
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/readings/{}", reading_id))
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap()
        };

        let response = app.clone().oneshot(delete(&ops)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app.oneshot(delete(&admin)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_csv_export_content_type() {
        let app = router(create_test_state());
        let token = login_as(&app, "admin", "admin").await;

        let response = app
            .oneshot(get("/api/export/readings.csv", &token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response
                .headers()
                .get("content-type")
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/csv")
        );
        let body = response_text(response).await;
        assert!(body.starts_with("id,unit_id"));
    }

    #[test]
    fn test_app_error_internal() {
        let error = AppError::Internal("internal error".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
