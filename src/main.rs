//! Server binary: wires configuration, the GitHub client, the cache
//! service, and the aggregation engine into the dashboard API.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pr_tracker::config::Settings;
use pr_tracker::error::AppError;
use pr_tracker::services::api::ApiState;
use pr_tracker::services::github_client::{GitHubClient, GitHubClientConfig};
use pr_tracker::services::{server, CacheService, ReviewTracker};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pr_tracker=info,tower_http=warn")),
        )
        .init();

    let settings = Settings::parse();
    let repos = settings.load_repos()?;
    if repos.is_empty() {
        tracing::warn!(
            config = %settings.config_path.display(),
            "No repositories configured; queries will return empty results"
        );
    } else {
        tracing::info!(count = repos.len(), "Tracking repositories");
    }

    let client = GitHubClient::new(GitHubClientConfig {
        base_url: settings.github_api_base.clone(),
        token: settings.github_token.clone(),
        timeout_secs: 30,
    })?;

    let cache = Arc::new(CacheService::new());
    let tracker = Arc::new(ReviewTracker::new(client, cache, repos));

    server::run_server(
        &settings.bind_addr,
        &settings.dashboard_origin,
        ApiState { tracker },
    )
    .await
}
