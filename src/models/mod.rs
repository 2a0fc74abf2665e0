//! Data models for the application.
//!
//! These models represent the core entities flowing through the aggregation
//! engine and the JSON payloads returned by the dashboard API.

pub mod pull_request;
pub mod review;
pub mod stats;

// Re-exports for convenient access
pub use pull_request::{EnrichedPullRequest, HumanReview, PullRequest, PullRequestStatus};
pub use review::{CommentFlags, ReviewVerdict, ReviewerSets};
pub use stats::{AuthorListResponse, PrInfo, PrListResponse, PrStats, RepoListResponse};
