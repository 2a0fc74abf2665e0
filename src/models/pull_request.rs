//! Pull request model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestStatus {
    Open,
    Merged,
    Closed,
}

impl PullRequestStatus {
    /// Derive the status from the API state and merge timestamp.
    ///
    /// GitHub reports merged pull requests as `closed`; the `merged_at`
    /// timestamp is what distinguishes the two.
    pub fn derive(api_state: &str, merged: bool) -> Self {
        if merged {
            Self::Merged
        } else if api_state.eq_ignore_ascii_case("closed") {
            Self::Closed
        } else {
            Self::Open
        }
    }
}

impl std::fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Merged => write!(f, "merged"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Human review signal derived from labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HumanReview {
    Approved,
    Waiting,
    None,
}

/// A pull request inside the query window.
///
/// Immutable once fetched; review activity is attached separately via
/// [`EnrichedPullRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    /// Repository in `owner/name` form.
    pub repo: String,

    /// Repository-scoped pull request number.
    pub number: u64,

    /// Pull request title.
    pub title: String,

    /// Author's login.
    pub author: String,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// URL of the pull request in the web UI.
    pub url: String,

    /// Lifecycle status.
    pub status: PullRequestStatus,

    /// Logins with a pending review request.
    pub requested_reviewers: Vec<String>,

    /// Label names attached to the pull request.
    pub labels: Vec<String>,
}

impl PullRequest {
    /// Derive the human-review signal from labels.
    ///
    /// An `approved` label wins over `wait-review`; anything else is `None`.
    pub fn human_review(&self) -> HumanReview {
        let mut waiting = false;
        for label in &self.labels {
            let label = label.to_lowercase();
            if label == "approved" {
                return HumanReview::Approved;
            }
            if label == "wait-review" {
                waiting = true;
            }
        }
        if waiting {
            HumanReview::Waiting
        } else {
            HumanReview::None
        }
    }
}

/// A pull request plus its resolved review activity.
///
/// Built once per query; never mutated after construction.
#[derive(Debug, Clone)]
pub struct EnrichedPullRequest {
    /// The underlying pull request.
    pub pr: PullRequest,

    /// Whether the review bot left its completed-review marker.
    pub review_bot_seen: bool,

    /// Whether any comment carries the ignore token.
    pub ignore_marked: bool,

    /// Ordered-unique reviewer logins (completed first, then pending).
    pub reviewers: Vec<String>,

    /// Ordered-unique logins whose latest terminal review state is approval.
    pub approved_by: Vec<String>,
}

impl EnrichedPullRequest {
    /// Number of distinct approving reviewers.
    pub fn approval_count(&self) -> usize {
        self.approved_by.len()
    }
}
