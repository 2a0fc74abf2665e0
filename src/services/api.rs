//! REST API routes for the dashboard.
//!
//! These routes expose the aggregation engine over HTTP: the pull-request
//! listing with its summary statistics, the author and repository lists,
//! and the administrative cache-clear operation.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{AuthorListResponse, PrListResponse, RepoListResponse};
use crate::services::tracker::{PrQuery, ReviewTracker};

/// Shared state for the dashboard API routes.
#[derive(Clone)]
pub struct ApiState {
    pub tracker: Arc<ReviewTracker>,
}

// ── Error handling ───────────────────────────────────────────────────────────

/// JSON error response shape.
#[derive(Serialize)]
struct ApiError {
    code: String,
    message: String,
}

/// Wrapper to make AppError usable as an axum error response.
#[derive(Debug)]
struct ApiErr(AppError);

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            AppError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            AppError::GitHubApi { .. } => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            AppError::Network { .. } => (StatusCode::BAD_GATEWAY, "NETWORK_ERROR"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        (
            status,
            Json(ApiError {
                code: code.to_string(),
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<AppError> for ApiErr {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

// ── Query parameter types ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct PrListParams {
    since: Option<String>,
    until: Option<String>,
    repo: Option<String>,
    author: Option<String>,
    status: Option<String>,
    #[serde(default)]
    show_ignored: bool,
}

#[derive(Deserialize)]
struct AuthorListParams {
    since: Option<String>,
    until: Option<String>,
}

#[derive(Serialize)]
struct ClearCacheResponse {
    status: &'static str,
}

// ── Route builder ────────────────────────────────────────────────────────────

/// Build the dashboard API routes.
pub fn api_routes() -> Router<ApiState> {
    Router::new()
        .route("/api/prs", get(list_prs))
        .route("/api/authors", get(list_authors))
        .route("/api/repos", get(list_repos))
        .route("/api/cache/clear", post(clear_cache))
}

// ── Window parsing ───────────────────────────────────────────────────────────

fn parse_date(value: &str, field: &str) -> Result<NaiveDate, ApiErr> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        ApiErr(AppError::invalid_input_field(
            format!("Expected YYYY-MM-DD, got '{}'", value),
            field,
        ))
    })
}

/// Resolve the query window, defaulting to the trailing seven days.
fn resolve_window(
    since: Option<&str>,
    until: Option<&str>,
) -> Result<(NaiveDate, NaiveDate), ApiErr> {
    let today = Utc::now().date_naive();
    let since = match since {
        Some(value) => parse_date(value, "since")?,
        None => today - Days::new(7),
    };
    let until = match until {
        Some(value) => parse_date(value, "until")?,
        None => today,
    };
    Ok((since, until))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /api/prs - pull requests in the window, with summary statistics.
async fn list_prs(
    State(state): State<ApiState>,
    Query(params): Query<PrListParams>,
) -> Result<Json<PrListResponse>, ApiErr> {
    let (since, until) = resolve_window(params.since.as_deref(), params.until.as_deref())?;

    let query = PrQuery {
        since,
        until,
        repo: params.repo,
        author: params.author,
        status: params.status,
        show_ignored: params.show_ignored,
    };

    Ok(Json(state.tracker.list_pull_requests(&query).await?))
}

/// GET /api/authors - distinct pull-request authors in the window.
async fn list_authors(
    State(state): State<ApiState>,
    Query(params): Query<AuthorListParams>,
) -> Result<Json<AuthorListResponse>, ApiErr> {
    let (since, until) = resolve_window(params.since.as_deref(), params.until.as_deref())?;
    let authors = state.tracker.list_authors(since, until).await?;
    Ok(Json(AuthorListResponse { authors }))
}

/// GET /api/repos - the configured repository list.
async fn list_repos(State(state): State<ApiState>) -> Json<RepoListResponse> {
    Json(RepoListResponse {
        repos: state.tracker.repositories().to_vec(),
    })
}

/// POST /api/cache/clear - empty every cache namespace.
async fn clear_cache(State(state): State<ApiState>) -> Json<ClearCacheResponse> {
    state.tracker.clear_caches().await;
    tracing::info!("Caches cleared");
    Json(ClearCacheResponse { status: "ok" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_valid() {
        assert_eq!(
            parse_date("2024-01-07", "since").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 7).unwrap()
        );
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date("01/07/2024", "since").is_err());
        assert!(parse_date("", "until").is_err());
    }

    #[test]
    fn test_resolve_window_defaults_to_trailing_week() {
        let (since, until) = resolve_window(None, None).unwrap();
        assert_eq!(until - since, chrono::Duration::days(7));
    }

    #[test]
    fn test_resolve_window_explicit_dates() {
        let (since, until) = resolve_window(Some("2024-01-01"), Some("2024-01-07")).unwrap();
        assert_eq!(since, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(until, NaiveDate::from_ymd_opt(2024, 1, 7).unwrap());
    }
}
