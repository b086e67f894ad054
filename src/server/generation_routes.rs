//! Theme, generation and cooldown endpoints under `/api/v1`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::state::{SharedCooldownLedger, ServerState};
use crate::catalog::MediaKind;
use crate::cooldown::{CooldownFilter, CooldownRecord, HistoryFilter, PlayHistoryEntry};
use crate::generator::{RunResult, RunStatus};
use crate::scheduler::{ScheduleError, SchedulerHandle, ThemeInfo};

const DEFAULT_PAGE_SIZE: usize = 100;
const MAX_PAGE_SIZE: usize = 1000;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn page_size(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

#[derive(Deserialize, Debug, Default)]
struct GenerateQuery {
    #[serde(default)]
    dry_run: bool,
}

#[derive(Deserialize, Debug, Default)]
struct CooldownQuery {
    #[serde(default)]
    active_only: bool,
    media_type: Option<String>,
    limit: Option<usize>,
    #[serde(default)]
    offset: usize,
}

#[derive(Deserialize, Debug, Default)]
struct HistoryQuery {
    theme: Option<String>,
    channel: Option<String>,
    limit: Option<usize>,
    #[serde(default)]
    offset: usize,
}

#[derive(Serialize)]
struct ThemesResponse {
    count: usize,
    themes: Vec<ThemeInfo>,
}

#[derive(Serialize)]
struct GenerateAllResponse {
    count: usize,
    failed: usize,
    results: Vec<RunResult>,
}

#[derive(Serialize)]
struct CooldownsResponse {
    count: usize,
    active_total: usize,
    cooldowns: Vec<CooldownRecord>,
}

#[derive(Serialize)]
struct HistoryResponse {
    count: usize,
    total: usize,
    history: Vec<PlayHistoryEntry>,
}

fn run_status_code(result: &RunResult) -> StatusCode {
    match result.status {
        RunStatus::Failed => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    }
}

fn schedule_error_response(err: ScheduleError) -> Response {
    match err {
        ScheduleError::UnknownTheme(_) => error_response(StatusCode::NOT_FOUND, err.to_string()),
        ScheduleError::Stopped => error_response(StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        other => error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

/// GET /themes - Configured themes with next run and last result
async fn list_themes(State(scheduler): State<SchedulerHandle>) -> impl IntoResponse {
    let themes = scheduler.list_themes().await;
    Json(ThemesResponse {
        count: themes.len(),
        themes,
    })
}

/// POST /themes/{name}/generate - Run one theme now
async fn generate_theme(
    State(scheduler): State<SchedulerHandle>,
    Path(name): Path<String>,
    Query(query): Query<GenerateQuery>,
) -> Response {
    info!(theme = %name, dry_run = query.dry_run, "Manual generation requested over HTTP");
    match scheduler.trigger_theme(&name, query.dry_run).await {
        Ok(result) => (run_status_code(&result), Json(result)).into_response(),
        Err(e) => {
            warn!(theme = %name, "Manual generation rejected: {}", e);
            schedule_error_response(e)
        }
    }
}

/// POST /generate - Run every theme now
async fn generate_all(
    State(scheduler): State<SchedulerHandle>,
    Query(query): Query<GenerateQuery>,
) -> Response {
    info!(dry_run = query.dry_run, "Generation of all themes requested over HTTP");
    match scheduler.trigger_all(query.dry_run).await {
        Ok(results) => {
            let failed = results
                .iter()
                .filter(|r| r.status == RunStatus::Failed)
                .count();
            Json(GenerateAllResponse {
                count: results.len(),
                failed,
                results,
            })
            .into_response()
        }
        Err(e) => schedule_error_response(e),
    }
}

/// GET /cooldowns - Cooldown records, optionally only active ones
async fn list_cooldowns(
    State(ledger): State<SharedCooldownLedger>,
    Query(query): Query<CooldownQuery>,
) -> Response {
    let media_type = match query.media_type.as_deref() {
        None => None,
        Some(raw) => match MediaKind::parse(raw) {
            Some(kind) => Some(kind),
            None => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Unknown media_type: {}", raw),
                )
            }
        },
    };
    let filter = CooldownFilter {
        media_type,
        active_only: query.active_only,
        expired_only: false,
        limit: Some(page_size(query.limit)),
        offset: query.offset,
    };

    let cooldowns = match ledger.list_cooldowns(&filter) {
        Ok(cooldowns) => cooldowns,
        Err(e) => {
            warn!("Failed to list cooldowns: {:#}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list cooldowns");
        }
    };
    let active_total = match ledger.count_active() {
        Ok(count) => count,
        Err(e) => {
            warn!("Failed to count active cooldowns: {:#}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list cooldowns");
        }
    };

    Json(CooldownsResponse {
        count: cooldowns.len(),
        active_total,
        cooldowns,
    })
    .into_response()
}

/// GET /history - Play history, newest first
async fn list_history(
    State(ledger): State<SharedCooldownLedger>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let filter = HistoryFilter {
        theme_name: query.theme,
        channel_id: query.channel,
        limit: Some(page_size(query.limit)),
        offset: query.offset,
        ..Default::default()
    };

    let history = match ledger.list_history(&filter) {
        Ok(history) => history,
        Err(e) => {
            warn!("Failed to list play history: {:#}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list history");
        }
    };
    let total_filter = HistoryFilter {
        limit: None,
        offset: 0,
        ..filter
    };
    let total = match ledger.store().count_history(&total_filter) {
        Ok(total) => total,
        Err(e) => {
            warn!("Failed to count play history: {:#}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list history");
        }
    };

    Json(HistoryResponse {
        count: history.len(),
        total,
        history,
    })
    .into_response()
}

/// Build the generation routes.
///
/// - GET /themes - List themes
/// - POST /themes/{name}/generate?dry_run - Run one theme
/// - POST /generate?dry_run - Run all themes
/// - GET /cooldowns?active_only&media_type&limit&offset
/// - GET /history?theme&channel&limit&offset
pub fn generation_routes() -> Router<ServerState> {
    Router::new()
        .route("/themes", get(list_themes))
        .route("/themes/{name}/generate", post(generate_theme))
        .route("/generate", post(generate_all))
        .route("/cooldowns", get(list_cooldowns))
        .route("/history", get(list_history))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_clamped() {
        assert_eq!(page_size(None), DEFAULT_PAGE_SIZE);
        assert_eq!(page_size(Some(0)), 1);
        assert_eq!(page_size(Some(25)), 25);
        assert_eq!(page_size(Some(50_000)), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_schedule_errors_map_to_status() {
        assert_eq!(
            schedule_error_response(ScheduleError::UnknownTheme("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            schedule_error_response(ScheduleError::Stopped).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
