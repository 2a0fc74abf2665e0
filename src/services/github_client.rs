//! GitHub API client.
//!
//! HTTP client for the GitHub REST API v3 with authentication, fixed-size
//! page fetches, and rate-budget monitoring. Every response is inspected for
//! rate-limit headers before its body is consumed; when the remaining budget
//! drops below the low-water mark the calling path is suspended until the
//! budget window resets.

use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::AppError;

/// Number of items requested per page.
pub const PAGE_SIZE: usize = 100;

/// Remaining-call count below which requests are suspended.
const RATE_BUDGET_LOW_WATER: u32 = 10;

/// GitHub API client configuration.
#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    /// Base URL of the API (e.g., `https://api.github.com`).
    pub base_url: String,

    /// Personal access token for authentication. Empty means unauthenticated.
    pub token: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GitHubClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.github.com".to_string(),
            token: String::new(),
            timeout_secs: 30,
        }
    }
}

/// GitHub API client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    config: GitHubClientConfig,
}

/// Rate-budget telemetry from response headers.
///
/// Recomputed from every response; never persisted.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateBudget {
    /// Remaining calls in the current window, if reported.
    pub remaining: Option<u32>,

    /// Unix timestamp at which the window resets, if reported.
    pub reset_epoch: Option<u64>,
}

// ── Wire types ───────────────────────────────────────────────────────────────

/// GitHub user from API.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub login: Option<String>,
}

/// GitHub label from API.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubLabel {
    pub name: String,
}

/// GitHub pull request from API.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubPullRequest {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub html_url: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub merged_at: Option<chrono::DateTime<chrono::Utc>>,
    pub user: Option<GitHubUser>,
    #[serde(default)]
    pub requested_reviewers: Vec<GitHubUser>,
    #[serde(default)]
    pub labels: Vec<GitHubLabel>,
}

/// GitHub issue comment from API.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubIssueComment {
    pub user: Option<GitHubUser>,
    pub body: Option<String>,
}

/// GitHub pull request review from API.
///
/// Records arrive in chronological order; the resolver relies on that for
/// its last-write-wins verdict handling.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubReview {
    pub user: Option<GitHubUser>,
    #[serde(default)]
    pub state: String,
}

// ── Rate budget policy ───────────────────────────────────────────────────────

/// How long to suspend before the next request, if at all.
///
/// Returns `None` when the remaining budget is unknown (missing headers are
/// treated as an unconstrained budget) or still above the low-water mark.
/// Otherwise the suspension runs to one second past the reported reset.
pub fn suspend_duration(
    remaining: Option<u32>,
    reset_epoch: Option<u64>,
    now_epoch: u64,
) -> Option<Duration> {
    let remaining = remaining?;
    if remaining >= RATE_BUDGET_LOW_WATER {
        return None;
    }
    let reset = reset_epoch.unwrap_or(0);
    Some(Duration::from_secs(reset.saturating_sub(now_epoch) + 1))
}

/// Current Unix timestamp.
fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl GitHubClient {
    /// Create a new GitHub client.
    pub fn new(config: GitHubClientConfig) -> Result<Self, AppError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github.v3+json"),
        );
        // GitHub rejects requests without a user agent.
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("pr-tracker"),
        );

        if !config.token.is_empty() {
            let token_value = header::HeaderValue::from_str(&format!("token {}", config.token))
                .map_err(|_| AppError::config("Invalid token format"))?;
            headers.insert(header::AUTHORIZATION, token_value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Get the full URL for an API path.
    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Parse rate-budget headers from a response.
    fn parse_rate_budget(response: &Response) -> RateBudget {
        let headers = response.headers();

        let get_header = |name: &str| -> Option<u64> {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
        };

        RateBudget {
            remaining: get_header("x-ratelimit-remaining").map(|v| v as u32),
            reset_epoch: get_header("x-ratelimit-reset"),
        }
    }

    /// Suspend the calling path when the observed budget is low.
    ///
    /// Called after every response, error responses included; a response
    /// without rate-limit headers never suspends.
    pub async fn observe_rate_budget(&self, budget: RateBudget) {
        if let Some(wait) = suspend_duration(budget.remaining, budget.reset_epoch, now_epoch()) {
            tracing::warn!(
                remaining = budget.remaining,
                wait_secs = wait.as_secs(),
                "Rate budget low, suspending requests"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Handle API response errors.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
        endpoint: &str,
    ) -> Result<T, AppError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| AppError::internal(format!("Failed to parse response: {}", e)));
        }

        let status_code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        // GitHub returns errors as {"message": "..."}
        let body_message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from));

        let message = match (status, &body_message) {
            (StatusCode::UNAUTHORIZED, _) => "Bad credentials".to_string(),
            (StatusCode::FORBIDDEN, _) => "Access denied".to_string(),
            (StatusCode::NOT_FOUND, _) => "Resource not found".to_string(),
            (_, Some(msg)) => msg.clone(),
            _ => format!("Request failed ({}): {}", status_code, body),
        };

        Err(AppError::github_api_full(message, status_code, endpoint))
    }

    /// Fetch one page of a collection endpoint.
    ///
    /// The rate budget is observed before the body is decoded, so even a
    /// failing page fetch contributes its quota telemetry.
    async fn get_page<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        page: u32,
    ) -> Result<Vec<T>, AppError> {
        let url = self.api_url(endpoint);

        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[
                ("per_page", PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ])
            .send()
            .await?;

        let budget = Self::parse_rate_budget(&response);
        self.observe_rate_budget(budget).await;

        self.handle_response(response, endpoint).await
    }

    /// List one page of pull requests, sorted by creation time descending.
    pub async fn list_pull_requests(
        &self,
        repo: &str,
        state: &str,
        page: u32,
    ) -> Result<Vec<GitHubPullRequest>, AppError> {
        let endpoint = format!("/repos/{}/pulls", repo);
        self.get_page(
            &endpoint,
            &[
                ("state", state.to_string()),
                ("sort", "created".to_string()),
                ("direction", "desc".to_string()),
            ],
            page,
        )
        .await
    }

    /// List one page of issue comments on a pull request.
    pub async fn list_issue_comments(
        &self,
        repo: &str,
        number: u64,
        page: u32,
    ) -> Result<Vec<GitHubIssueComment>, AppError> {
        let endpoint = format!("/repos/{}/issues/{}/comments", repo, number);
        self.get_page(&endpoint, &[], page).await
    }

    /// List one page of reviews on a pull request.
    pub async fn list_reviews(
        &self,
        repo: &str,
        number: u64,
        page: u32,
    ) -> Result<Vec<GitHubReview>, AppError> {
        let endpoint = format!("/repos/{}/pulls/{}/reviews", repo, number);
        self.get_page(&endpoint, &[], page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_trims_trailing_slash() {
        let client = GitHubClient::new(GitHubClientConfig {
            base_url: "https://api.github.com/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.api_url("/repos/org/repo/pulls"),
            "https://api.github.com/repos/org/repo/pulls"
        );
    }

    #[test]
    fn test_suspend_duration_above_low_water() {
        assert_eq!(suspend_duration(Some(50), Some(1000), 900), None);
        assert_eq!(suspend_duration(Some(10), Some(1000), 900), None);
    }

    #[test]
    fn test_suspend_duration_below_low_water() {
        // One second past the reported reset.
        assert_eq!(
            suspend_duration(Some(3), Some(1000), 900),
            Some(Duration::from_secs(101))
        );
    }

    #[test]
    fn test_suspend_duration_reset_in_past() {
        assert_eq!(
            suspend_duration(Some(0), Some(100), 900),
            Some(Duration::from_secs(1))
        );
        assert_eq!(
            suspend_duration(Some(0), None, 900),
            Some(Duration::from_secs(1))
        );
    }

    #[test]
    fn test_suspend_duration_missing_headers() {
        // Absent telemetry never fails or delays the request.
        assert_eq!(suspend_duration(None, None, 900), None);
        assert_eq!(suspend_duration(None, Some(1000), 900), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observe_suspends_until_reset() {
        let client = GitHubClient::new(GitHubClientConfig::default()).unwrap();
        let start = tokio::time::Instant::now();

        client
            .observe_rate_budget(RateBudget {
                remaining: Some(2),
                reset_epoch: Some(now_epoch() + 5),
            })
            .await;

        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_observe_no_suspension_with_healthy_budget() {
        let client = GitHubClient::new(GitHubClientConfig::default()).unwrap();
        let start = tokio::time::Instant::now();

        client
            .observe_rate_budget(RateBudget {
                remaining: Some(4999),
                reset_epoch: Some(now_epoch() + 3600),
            })
            .await;

        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
