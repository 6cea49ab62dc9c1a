use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

use crate::analytics::{
    Channel, ClickEvent, FilterSet, HeatmapCell, IngestError, IngestService, MetricsQuery,
    MetricsSnapshot, StoredEvent, TrendGranularity, TrendPoint,
};
use crate::cursor::CursorSigner;

/// Window used when the caller gives no bounds
const DEFAULT_WINDOW_DAYS: i64 = 7;
const MAX_EVENTS_PAGE: usize = 500;

pub struct AppState {
    pub ingest: IngestService,
    pub cursors: CursorSigner,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn ingest_unavailable(e: IngestError) -> ApiError {
    error!("Analytics ingest unavailable: {}", e);
    api_error(StatusCode::SERVICE_UNAVAILABLE, "Analytics service unavailable")
}

fn query_rejected(rejection: QueryRejection) -> ApiError {
    api_error(
        StatusCode::BAD_REQUEST,
        format!("Invalid query parameters: {}", rejection.body_text()),
    )
}

fn body_rejected(rejection: JsonRejection) -> ApiError {
    api_error(
        rejection.status(),
        format!("Invalid event body: {}", rejection.body_text()),
    )
}

/// `?key=` is the same as leaving the key out
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

/// Time window and filter query parameters shared by the metrics endpoints
#[derive(Debug, Default, Deserialize)]
pub struct WindowParams {
    /// RFC 3339 instant or YYYY-MM-DD (start of day)
    #[serde(default, deserialize_with = "empty_as_none")]
    pub start: Option<String>,
    /// RFC 3339 instant or YYYY-MM-DD (end of day)
    #[serde(default, deserialize_with = "empty_as_none")]
    pub end: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub tag: Option<String>,
    /// `qr` or `link`
    #[serde(default, deserialize_with = "empty_as_none")]
    pub channel: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub campaign: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrendParams {
    #[serde(default)]
    pub granularity: TrendGranularity,
}

#[derive(Debug, Deserialize)]
pub struct EventListQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub cursor: Option<String>,
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, Serialize)]
pub struct EventListResponse {
    pub events: Vec<StoredEvent>,
    pub next_cursor: Option<String>,
}

/// Parse an RFC 3339 instant or a bare date. A bare date resolves to the
/// first or last instant of that UTC day.
fn parse_instant(value: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
            let time = if end_of_day {
                date.and_hms_nano_opt(23, 59, 59, 999_999_999)?
            } else {
                date.and_hms_opt(0, 0, 0)?
            };
            Some(time.and_utc())
        })
}

fn parse_channel(raw: &str) -> Result<Channel, ApiError> {
    match raw.to_ascii_lowercase().as_str() {
        "qr" => Ok(Channel::Qr),
        "link" => Ok(Channel::Link),
        _ => Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Invalid channel '{raw}'. Expected 'qr' or 'link'"),
        )),
    }
}

fn resolve_window(params: &WindowParams) -> Result<MetricsQuery, ApiError> {
    let end = match params.end.as_deref() {
        Some(raw) => parse_instant(raw, true).ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!("Invalid end date '{raw}'. Supported formats: RFC 3339 or YYYY-MM-DD"),
            )
        })?,
        None => Utc::now(),
    };

    let start = match params.start.as_deref() {
        Some(raw) => parse_instant(raw, false).ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!("Invalid start date '{raw}'. Supported formats: RFC 3339 or YYYY-MM-DD"),
            )
        })?,
        None => end - Duration::days(DEFAULT_WINDOW_DAYS),
    };

    if start > end {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Start date must not be later than end date",
        ));
    }

    let filters = FilterSet {
        user_id: params.user_id.clone(),
        tag: params.tag.clone(),
        channel: params.channel.as_deref().map(parse_channel).transpose()?,
        country: params.country.clone(),
        campaign: params.campaign.clone(),
    };

    Ok(MetricsQuery::new(start, end).with_filters(filters))
}

/// Log a single click event
pub async fn log_event(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ClickEvent>, JsonRejection>,
) -> Result<(StatusCode, Json<SuccessResponse>), ApiError> {
    let Json(event) = body.map_err(body_rejected)?;
    if event.short_url_id.trim().is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "short_url_id cannot be empty",
        ));
    }

    debug!("Logging click event for {}", event.short_url_id);
    state.ingest.log_event(event).await.map_err(ingest_unavailable)?;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse {
            message: "Event logged".to_string(),
        }),
    ))
}

/// Metrics snapshot for a window and filters
pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
    params: Result<Query<WindowParams>, QueryRejection>,
) -> Result<Json<MetricsSnapshot>, ApiError> {
    let Query(params) = params.map_err(query_rejected)?;
    let query = resolve_window(&params)?;
    let snapshot = state
        .ingest
        .calculate_metrics(query)
        .await
        .map_err(ingest_unavailable)?;
    Ok(Json(snapshot))
}

/// Click counts per hour or day
pub async fn get_trend(
    State(state): State<Arc<AppState>>,
    params: Result<Query<WindowParams>, QueryRejection>,
    trend: Result<Query<TrendParams>, QueryRejection>,
) -> Result<Json<Vec<TrendPoint>>, ApiError> {
    let Query(params) = params.map_err(query_rejected)?;
    let Query(trend) = trend.map_err(query_rejected)?;
    let query = resolve_window(&params)?;
    let points = state
        .ingest
        .click_trend(query, trend.granularity)
        .await
        .map_err(ingest_unavailable)?;
    Ok(Json(points))
}

/// Weekday by hour traffic heatmap
pub async fn get_heatmap(
    State(state): State<Arc<AppState>>,
    params: Result<Query<WindowParams>, QueryRejection>,
) -> Result<Json<Vec<HeatmapCell>>, ApiError> {
    let Query(params) = params.map_err(query_rejected)?;
    let query = resolve_window(&params)?;
    let cells = state
        .ingest
        .traffic_heatmap(query)
        .await
        .map_err(ingest_unavailable)?;
    Ok(Json(cells))
}

/// Newest-first event log for the log viewer
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    query: Result<Query<EventListQuery>, QueryRejection>,
) -> Result<Json<EventListResponse>, ApiError> {
    let Query(query) = query.map_err(query_rejected)?;
    let limit = query.limit.clamp(1, MAX_EVENTS_PAGE);

    let after = match query.cursor.as_deref() {
        Some(token) => Some(
            state
                .cursors
                .verify(token)
                .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid cursor: {e}")))?,
        ),
        None => None,
    };

    let page = state
        .ingest
        .recent_events(limit, after)
        .await
        .map_err(ingest_unavailable)?;

    let next_cursor = match page.next {
        Some(next) => Some(state.cursors.sign(&next).map_err(|e| {
            error!("Failed to sign cursor: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create cursor")
        })?),
        None => None,
    };

    Ok(Json(EventListResponse {
        events: page.events,
        next_cursor,
    }))
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
