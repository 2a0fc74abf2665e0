//! Dashboard response payloads and summary statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::pull_request::{EnrichedPullRequest, HumanReview, PullRequestStatus};

/// One pull request row as rendered by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrInfo {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub repo: String,
    pub created_at: DateTime<Utc>,
    pub url: String,
    pub status: PullRequestStatus,
    pub reviewed: bool,
    pub human_review: HumanReview,
    pub reviewers: Vec<String>,
    pub approved_by: Vec<String>,
    pub approval_count: usize,
}

impl From<EnrichedPullRequest> for PrInfo {
    fn from(enriched: EnrichedPullRequest) -> Self {
        let human_review = enriched.pr.human_review();
        let approval_count = enriched.approval_count();
        Self {
            number: enriched.pr.number,
            title: enriched.pr.title,
            author: enriched.pr.author,
            repo: enriched.pr.repo,
            created_at: enriched.pr.created_at,
            url: enriched.pr.url,
            status: enriched.pr.status,
            reviewed: enriched.review_bot_seen,
            human_review,
            reviewers: enriched.reviewers,
            approved_by: enriched.approved_by,
            approval_count,
        }
    }
}

/// Summary statistics over a filtered, sorted pull-request list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrStats {
    pub total: usize,
    pub reviewed: usize,
    pub not_reviewed: usize,
    pub reviewed_percent: f64,
    pub with_2_approvals: usize,
    pub with_2_approvals_percent: f64,
}

impl PrStats {
    /// Reduce a pull-request list to its summary counts and percentages.
    pub fn compute(prs: &[PrInfo]) -> Self {
        let total = prs.len();
        let reviewed = prs.iter().filter(|p| p.reviewed).count();
        let with_2_approvals = prs.iter().filter(|p| p.approval_count >= 2).count();

        Self {
            total,
            reviewed,
            not_reviewed: total - reviewed,
            reviewed_percent: percentage(reviewed, total),
            with_2_approvals,
            with_2_approvals_percent: percentage(with_2_approvals, total),
        }
    }
}

/// Percentage of `part` in `total`, rounded to one decimal place.
///
/// Zero when `total` is zero, never NaN.
fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

/// Full response for the pull-request listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrListResponse {
    pub prs: Vec<PrInfo>,
    pub stats: PrStats,
}

/// Response for the author listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorListResponse {
    pub authors: Vec<String>,
}

/// Response for the repository listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoListResponse {
    pub repos: Vec<String>,
}
