//! Review activity models.
//!
//! These are the resolved per-pull-request review values held in the
//! item-level caches. The raw review and comment records they are derived
//! from never leave the aggregation engine.

use serde::{Deserialize, Serialize};

/// Terminal review verdicts that overwrite a reviewer's previous verdict.
///
/// A plain `COMMENTED` review is deliberately absent: it adds the reviewer
/// to the reviewer set but leaves any earlier verdict standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewVerdict {
    Approved,
    ChangesRequested,
    Dismissed,
}

impl ReviewVerdict {
    /// Parse an API review state, returning `None` for non-terminal states.
    pub fn from_api(state: &str) -> Option<Self> {
        match state {
            "APPROVED" => Some(Self::Approved),
            "CHANGES_REQUESTED" => Some(Self::ChangesRequested),
            "DISMISSED" => Some(Self::Dismissed),
            _ => None,
        }
    }
}

/// Comment-derived flags for a pull request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentFlags {
    /// The review bot left its completed-review marker.
    pub review_bot_seen: bool,

    /// Some comment carries the ignore token.
    pub ignore_marked: bool,
}

/// Resolved reviewer and approver logins for a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerSets {
    /// Distinct reviewer logins in first-seen order.
    pub reviewers: Vec<String>,

    /// Reviewer-set order restricted to logins whose latest verdict approves.
    pub approved_by: Vec<String>,
}
