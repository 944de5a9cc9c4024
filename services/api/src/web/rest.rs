//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{recompute_task::spawn_daily_recompute, state::AppState};
use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Local, NaiveDate, Utc};
use reading_streak_core::{
    BatchReport, DailyOutcome, NewReadingEvent, PortError, StreakError, UserStreak,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        record_reading_event_handler,
        get_streak_handler,
        recompute_daily_summary_handler,
        run_batch_handler,
    ),
    components(
        schemas(
            RecordReadingEventRequest,
            RecordReadingEventResponse,
            StreakResponse,
            RecomputeDailySummaryRequest,
            DailySummaryResponse,
            BatchReportResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Reading Streak API", description = "Reading engagement tracking and daily streaks.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// One page-view reported by the reader app.
#[derive(Deserialize, ToSchema)]
pub struct RecordReadingEventRequest {
    pub page_number: i32,
    #[serde(default)]
    pub surah_name: String,
    pub seconds_open: i32,
    /// Optional client timestamp; the server time is used when absent.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<RecordReadingEventRequest> for NewReadingEvent {
    fn from(req: RecordReadingEventRequest) -> Self {
        NewReadingEvent {
            page_number: req.page_number,
            surah_name: req.surah_name,
            seconds_open: req.seconds_open,
            created_at: req.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct RecordReadingEventResponse {
    pub event_id: i64,
    pub date: NaiveDate,
    pub total_seconds: i64,
    pub percentage_done: u8,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct StreakResponse {
    pub user_id: Uuid,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_active_date: Option<NaiveDate>,
}

impl From<UserStreak> for StreakResponse {
    fn from(streak: UserStreak) -> Self {
        Self {
            user_id: streak.user_id,
            current_streak: streak.current_streak,
            longest_streak: streak.longest_streak,
            last_active_date: streak.last_active_date,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct RecomputeDailySummaryRequest {
    pub date: NaiveDate,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct DailySummaryResponse {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub total_seconds: i64,
    pub threshold_met: bool,
    pub streak: StreakResponse,
}

impl From<DailyOutcome> for DailySummaryResponse {
    fn from(outcome: DailyOutcome) -> Self {
        Self {
            user_id: outcome.summary.user_id,
            date: outcome.summary.date,
            total_seconds: outcome.summary.total_seconds,
            threshold_met: outcome.summary.threshold_met,
            streak: outcome.streak.into(),
        }
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RunBatchQuery {
    /// Day to process; defaults to today (server-local).
    pub date: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct BatchReportResponse {
    pub date: NaiveDate,
    pub processed: usize,
    pub failed: usize,
}

impl From<BatchReport> for BatchReportResponse {
    fn from(report: BatchReport) -> Self {
        Self {
            date: report.date,
            processed: report.processed,
            failed: report.failed,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type HttpError = (StatusCode, Json<ErrorResponse>);

fn http_error(status: StatusCode, code: &str, message: impl Into<String>) -> HttpError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            code: code.to_string(),
        }),
    )
}

fn port_failure(context: &str, e: PortError) -> HttpError {
    match e {
        PortError::NotFound(msg) => http_error(StatusCode::NOT_FOUND, "NOT_FOUND", msg),
        other => {
            error!("{}: {:?}", context, other);
            match other {
                PortError::Unavailable(_) => {
                    http_error(StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE", context)
                }
                _ => http_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", context),
            }
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Record one reading event.
///
/// Validates and stores the event, answers with the progress towards today's
/// threshold, and recomputes the daily summary and streak in the background.
#[utoipa::path(
    post,
    path = "/api/v1/reading-events",
    request_body = RecordReadingEventRequest,
    responses(
        (status = 200, description = "Event recorded", body = RecordReadingEventResponse),
        (status = 401, description = "Missing or invalid x-user-id header"),
        (status = 422, description = "Event rejected by validation", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn record_reading_event_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<RecordReadingEventRequest>,
) -> Result<Json<RecordReadingEventResponse>, HttpError> {
    let outcome = state
        .aggregator
        .record_event(user_id, req.into())
        .await
        .map_err(|e| match e {
            StreakError::Validation(reason) => {
                http_error(StatusCode::UNPROCESSABLE_ENTITY, reason.code(), reason.to_string())
            }
            StreakError::Port(e) => port_failure("Failed to record reading event", e),
        })?;

    spawn_daily_recompute(state.aggregator.clone(), user_id, outcome.date);

    Ok(Json(RecordReadingEventResponse {
        event_id: outcome.event_id,
        date: outcome.date,
        total_seconds: outcome.progress.total_seconds,
        percentage_done: outcome.progress.percentage_done,
    }))
}

/// Get the caller's streak.
#[utoipa::path(
    get,
    path = "/api/v1/streak",
    responses(
        (status = 200, description = "Current streak", body = StreakResponse),
        (status = 401, description = "Missing or invalid x-user-id header"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_streak_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<StreakResponse>, HttpError> {
    let streak = state
        .streaks
        .get_streak(user_id)
        .await
        .map_err(|e| port_failure("Failed to get user streak", e))?;
    Ok(Json(streak.into()))
}

/// Recompute the caller's summary and streak for one date.
#[utoipa::path(
    post,
    path = "/api/v1/daily-summary",
    request_body = RecomputeDailySummaryRequest,
    responses(
        (status = 200, description = "Summary recomputed", body = DailySummaryResponse),
        (status = 401, description = "Missing or invalid x-user-id header"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn recompute_daily_summary_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<RecomputeDailySummaryRequest>,
) -> Result<Json<DailySummaryResponse>, HttpError> {
    let outcome = state
        .aggregator
        .summarize(user_id, req.date)
        .await
        .map_err(|e| port_failure("Failed to update daily summary", e))?;
    Ok(Json(outcome.into()))
}

/// Run the daily streak batch for one date.
#[utoipa::path(
    post,
    path = "/api/v1/batch/run",
    params(RunBatchQuery),
    responses(
        (status = 200, description = "Batch finished", body = BatchReportResponse),
        (status = 401, description = "Missing or invalid x-user-id header"),
        (status = 500, description = "Active users could not be listed", body = ErrorResponse)
    )
)]
pub async fn run_batch_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RunBatchQuery>,
) -> Result<Json<BatchReportResponse>, HttpError> {
    let date = query.date.unwrap_or_else(|| Local::now().date_naive());
    let report = state
        .batch
        .run_for_date(date)
        .await
        .map_err(|e| port_failure("Failed to process daily streaks", e))?;
    Ok(Json(report.into()))
}
