//! Pull-request review aggregation engine.
//!
//! This module provides the core aggregation functionality:
//! - Windowed pull-request fetching with descending-order early exit
//! - Per-pull-request resolution of comment flags and reviewer sets
//! - Bounded concurrent enrichment across many pull requests
//! - Summary statistics for the dashboard
//!
//! All reads go through the layered TTL caches first; a repeated dashboard
//! query inside the TTL window performs no network work at all.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use futures::future::try_join_all;
use tokio::sync::Semaphore;

use crate::error::AppError;
use crate::models::{
    CommentFlags, EnrichedPullRequest, PrInfo, PrListResponse, PrStats, PullRequest,
    PullRequestStatus, ReviewVerdict, ReviewerSets,
};
use crate::services::cache::{CacheService, ListQueryKey};
use crate::services::github_client::{
    GitHubClient, GitHubIssueComment, GitHubPullRequest, GitHubReview, PAGE_SIZE,
};

/// Login of the automated review bot whose comments mark a PR as reviewed.
const REVIEW_BOT_LOGIN: &str = "github-actions[bot]";

/// Marker text the review bot leaves once its review is complete.
const REVIEW_MARKER: &str = "Code Review";

/// Opt-out token excluding a pull request from tracking, regardless of
/// which account commented it.
const IGNORE_TOKEN: &str = "#ignore-tracker";

/// Login suffix identifying automation accounts.
const BOT_SUFFIX: &str = "[bot]";

/// Maximum per-item enrichment tasks in flight for a single query.
const ENRICH_CONCURRENCY: usize = 10;

/// Whether a login belongs to an automation account.
pub fn is_automation_login(login: &str) -> bool {
    login.ends_with(BOT_SUFFIX)
}

/// Filters accepted by [`ReviewTracker::list_pull_requests`].
#[derive(Debug, Clone)]
pub struct PrQuery {
    /// First day of the window (inclusive).
    pub since: NaiveDate,

    /// Last day of the window (inclusive, extended to end of day).
    pub until: NaiveDate,

    /// Restrict to one configured repository.
    pub repo: Option<String>,

    /// Restrict to one author login (case-insensitive).
    pub author: Option<String>,

    /// Restrict to one lifecycle status (`open`, `merged`, `closed`).
    pub status: Option<String>,

    /// Include pull requests carrying the ignore token.
    pub show_ignored: bool,
}

impl PrQuery {
    fn cache_key(&self) -> ListQueryKey {
        (
            self.since.to_string(),
            self.until.to_string(),
            self.repo.clone(),
            self.author.clone(),
            self.status.clone(),
            self.show_ignored,
        )
    }
}

/// The review aggregation engine.
///
/// Owns the API client and the injected cache service; one instance serves
/// all dashboard queries for the lifetime of the process.
pub struct ReviewTracker {
    client: GitHubClient,
    cache: Arc<CacheService>,
    repos: Vec<String>,
}

impl ReviewTracker {
    /// Create a tracker over the configured repository list.
    pub fn new(client: GitHubClient, cache: Arc<CacheService>, repos: Vec<String>) -> Self {
        Self {
            client,
            cache,
            repos,
        }
    }

    /// The configured repository list.
    pub fn repositories(&self) -> &[String] {
        &self.repos
    }

    /// Empty every cache namespace.
    pub async fn clear_caches(&self) {
        self.cache.clear_all().await;
    }

    /// Run a full dashboard query: fetch, enrich, filter, sort, aggregate.
    ///
    /// With no repositories configured the result is empty, not an error.
    /// A failure in any repository fails the whole query; the caller never
    /// sees a silently truncated result.
    pub async fn list_pull_requests(&self, query: &PrQuery) -> Result<PrListResponse, AppError> {
        let key = query.cache_key();
        if let Some(hit) = self.cache.get_list_query(&key).await {
            return Ok(hit);
        }

        let (since, until) = window_bounds(query.since, query.until);
        let targets = self.target_repos(query.repo.as_deref());

        let mut rows: Vec<PrInfo> = Vec::new();
        for repo in &targets {
            let prs = self
                .fetch_window(repo, since, until, query.author.as_deref())
                .await?;
            tracing::debug!(repo = %repo, count = prs.len(), "Fetched window");

            for enriched in self.enrich(prs).await? {
                if enriched.ignore_marked && !query.show_ignored {
                    continue;
                }
                let info = PrInfo::from(enriched);
                if let Some(status) = &query.status {
                    if info.status.to_string() != *status {
                        continue;
                    }
                }
                rows.push(info);
            }
        }

        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let stats = PrStats::compute(&rows);
        tracing::info!(
            total = stats.total,
            reviewed = stats.reviewed,
            "Dashboard query complete"
        );

        let response = PrListResponse { prs: rows, stats };
        self.cache.put_list_query(key, response.clone()).await;
        Ok(response)
    }

    /// Distinct pull-request authors across all configured repositories.
    pub async fn list_authors(
        &self,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<String>, AppError> {
        let key = (since.to_string(), until.to_string());
        if let Some(hit) = self.cache.get_author_list(&key).await {
            return Ok(hit);
        }

        let (start, end) = window_bounds(since, until);
        let mut authors: BTreeSet<String> = BTreeSet::new();
        for repo in &self.repos {
            for pr in self.fetch_window(repo, start, end, None).await? {
                authors.insert(pr.author);
            }
        }

        let list: Vec<String> = authors.into_iter().collect();
        self.cache.put_author_list(key, list.clone()).await;
        Ok(list)
    }

    /// Narrow to one repository when it is actually configured.
    fn target_repos(&self, repo: Option<&str>) -> Vec<String> {
        match repo {
            Some(r) if self.repos.iter().any(|known| known == r) => vec![r.to_string()],
            _ => self.repos.clone(),
        }
    }

    /// Fetch open and closed pull requests in the window, then apply the
    /// optional author filter to the merged result.
    async fn fetch_window(
        &self,
        repo: &str,
        since: NaiveDateTime,
        until: NaiveDateTime,
        author: Option<&str>,
    ) -> Result<Vec<PullRequest>, AppError> {
        let mut all = Vec::new();
        for state in ["open", "closed"] {
            all.extend(self.fetch_state(repo, state, since, until).await?);
        }

        if let Some(author) = author {
            all.retain(|pr| pr.author.eq_ignore_ascii_case(author));
        }

        Ok(all)
    }

    /// Paginate one state of a repository's pull requests.
    ///
    /// Precondition: the server returns pages sorted by creation time
    /// descending. The first item older than the window start therefore
    /// proves that no remaining item, on this page or any later one, can be
    /// in the window, and pagination stops immediately.
    async fn fetch_state(
        &self,
        repo: &str,
        state: &str,
        since: NaiveDateTime,
        until: NaiveDateTime,
    ) -> Result<Vec<PullRequest>, AppError> {
        let mut results = Vec::new();
        let mut page = 1u32;

        loop {
            let items = self.client.list_pull_requests(repo, state, page).await?;
            let full_page = items.len() >= PAGE_SIZE;

            for item in items {
                match classify_created(item.created_at.naive_utc(), since, until) {
                    WindowDecision::Skip => continue,
                    WindowDecision::Stop => return Ok(results),
                    WindowDecision::Take => {
                        if let Some(pr) = to_pull_request(repo, item) {
                            results.push(pr);
                        }
                    }
                }
            }

            if !full_page {
                break;
            }
            page += 1;
        }

        Ok(results)
    }

    /// Resolve comment-derived flags for one pull request, cached.
    ///
    /// Walks every comment page; the flags accumulate and are never cleared
    /// once set.
    async fn resolve_comment_flags(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<CommentFlags, AppError> {
        let key = (repo.to_string(), number);
        if let Some(hit) = self.cache.get_comment_flags(&key).await {
            return Ok(hit);
        }

        let mut flags = CommentFlags::default();
        let mut page = 1u32;
        loop {
            let comments = self.client.list_issue_comments(repo, number, page).await?;
            let full_page = comments.len() >= PAGE_SIZE;
            absorb_comment_flags(&mut flags, &comments);
            if !full_page {
                break;
            }
            page += 1;
        }

        self.cache.put_comment_flags(key, flags).await;
        Ok(flags)
    }

    /// Resolve reviewer and approver sets for one pull request, cached.
    ///
    /// Walks every review page; a reviewer's latest terminal verdict decides
    /// whether they count as an approver.
    async fn resolve_reviewer_sets(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<ReviewerSets, AppError> {
        let key = (repo.to_string(), number);
        if let Some(hit) = self.cache.get_reviewer_sets(&key).await {
            return Ok(hit);
        }

        let mut fold = ReviewFold::default();
        let mut page = 1u32;
        loop {
            let reviews = self.client.list_reviews(repo, number, page).await?;
            let full_page = reviews.len() >= PAGE_SIZE;
            fold.absorb(&reviews);
            if !full_page {
                break;
            }
            page += 1;
        }

        let sets = fold.finish();
        self.cache.put_reviewer_sets(key, sets.clone()).await;
        Ok(sets)
    }

    /// Enrich pull requests with review activity, at most
    /// [`ENRICH_CONCURRENCY`] items in flight at once.
    ///
    /// Any item failure fails the whole call; sibling requests already
    /// issued are left to run out on their own.
    async fn enrich(&self, prs: Vec<PullRequest>) -> Result<Vec<EnrichedPullRequest>, AppError> {
        let gate = Semaphore::new(ENRICH_CONCURRENCY);
        try_join_all(prs.into_iter().map(|pr| gated(&gate, self.enrich_one(pr)))).await
    }

    /// Resolve both review sub-resources for one pull request and merge the
    /// pending reviewer requests into the resolved reviewer set.
    async fn enrich_one(&self, pr: PullRequest) -> Result<EnrichedPullRequest, AppError> {
        let flags = self.resolve_comment_flags(&pr.repo, pr.number).await?;
        let sets = self.resolve_reviewer_sets(&pr.repo, pr.number).await?;
        let reviewers = merge_reviewers(sets.reviewers, &pr.requested_reviewers);

        Ok(EnrichedPullRequest {
            review_bot_seen: flags.review_bot_seen,
            ignore_marked: flags.ignore_marked,
            reviewers,
            approved_by: sets.approved_by,
            pr,
        })
    }
}

/// Await `fut` once a permit is available on `gate`.
///
/// Futures beyond the permit count sit parked at the gate; each completion
/// releases its permit and admits the next.
async fn gated<T, F>(gate: &Semaphore, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    let _permit = gate
        .acquire()
        .await
        .map_err(|_| AppError::internal("Enrichment gate closed"))?;
    fut.await
}

/// Inclusive datetime bounds for a calendar-date window.
fn window_bounds(since: NaiveDate, until: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = since.and_time(NaiveTime::MIN);
    let end = until.and_time(NaiveTime::MIN) + chrono::Duration::seconds(86_399);
    (start, end)
}

/// Verdict on one listed item relative to the query window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowDecision {
    /// In the window: keep it.
    Take,
    /// After the window end: ignore it but keep scanning the page.
    Skip,
    /// Before the window start: nothing later can be in-window, stop.
    Stop,
}

fn classify_created(
    created: NaiveDateTime,
    since: NaiveDateTime,
    until: NaiveDateTime,
) -> WindowDecision {
    if created > until {
        WindowDecision::Skip
    } else if created < since {
        WindowDecision::Stop
    } else {
        WindowDecision::Take
    }
}

/// Convert a wire pull request into the domain model.
///
/// Returns `None` for automation-account authors and for records missing an
/// author login (nothing to attribute them to).
fn to_pull_request(repo: &str, item: GitHubPullRequest) -> Option<PullRequest> {
    let author = item.user.and_then(|u| u.login)?;
    if is_automation_login(&author) {
        return None;
    }

    let status = PullRequestStatus::derive(&item.state, item.merged_at.is_some());
    let requested_reviewers = item
        .requested_reviewers
        .into_iter()
        .filter_map(|u| u.login)
        .filter(|login| !login.is_empty())
        .collect();

    Some(PullRequest {
        repo: repo.to_string(),
        number: item.number,
        title: item.title,
        author,
        created_at: item.created_at,
        url: item.html_url,
        status,
        requested_reviewers,
        labels: item.labels.into_iter().map(|l| l.name).collect(),
    })
}

/// Fold one page of comments into the accumulated flags.
fn absorb_comment_flags(flags: &mut CommentFlags, comments: &[GitHubIssueComment]) {
    for comment in comments {
        let author = comment
            .user
            .as_ref()
            .and_then(|u| u.login.as_deref())
            .unwrap_or("");
        let body = comment.body.as_deref().unwrap_or("");

        if author == REVIEW_BOT_LOGIN && body.contains(REVIEW_MARKER) {
            flags.review_bot_seen = true;
        }
        if body.contains(IGNORE_TOKEN) {
            flags.ignore_marked = true;
        }
    }
}

/// Accumulator for reviewer resolution across review pages.
#[derive(Default)]
struct ReviewFold {
    /// Insertion-ordered reviewer logins.
    reviewers: Vec<String>,

    /// Membership set backing `reviewers`.
    seen: HashSet<String>,

    /// Latest terminal verdict per login (last write wins).
    verdicts: HashMap<String, ReviewVerdict>,
}

impl ReviewFold {
    /// Fold one page of reviews, in arrival (chronological) order.
    fn absorb(&mut self, reviews: &[GitHubReview]) {
        for review in reviews {
            let Some(login) = review.user.as_ref().and_then(|u| u.login.as_deref()) else {
                continue;
            };
            if login.is_empty() || is_automation_login(login) {
                continue;
            }

            if self.seen.insert(login.to_string()) {
                self.reviewers.push(login.to_string());
            }
            if let Some(verdict) = ReviewVerdict::from_api(&review.state) {
                self.verdicts.insert(login.to_string(), verdict);
            }
        }
    }

    /// Reduce to the final reviewer and approver sets.
    fn finish(self) -> ReviewerSets {
        let approved_by = self
            .reviewers
            .iter()
            .filter(|login| self.verdicts.get(*login) == Some(&ReviewVerdict::Approved))
            .cloned()
            .collect();

        ReviewerSets {
            reviewers: self.reviewers,
            approved_by,
        }
    }
}

/// Ordered-unique union: resolved reviewers first, then pending requests
/// not already present.
fn merge_reviewers(resolved: Vec<String>, pending: &[String]) -> Vec<String> {
    let mut merged = resolved;
    for login in pending {
        if !merged.iter().any(|known| known == login) {
            merged.push(login.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::github_client::GitHubUser;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn review(login: &str, state: &str) -> GitHubReview {
        GitHubReview {
            user: Some(GitHubUser {
                login: Some(login.to_string()),
            }),
            state: state.to_string(),
        }
    }

    fn comment(login: &str, body: &str) -> GitHubIssueComment {
        GitHubIssueComment {
            user: Some(GitHubUser {
                login: Some(login.to_string()),
            }),
            body: Some(body.to_string()),
        }
    }

    fn fold(reviews: &[GitHubReview]) -> ReviewerSets {
        let mut fold = ReviewFold::default();
        fold.absorb(reviews);
        fold.finish()
    }

    fn date(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_is_automation_login() {
        assert!(is_automation_login("dependabot[bot]"));
        assert!(is_automation_login("github-actions[bot]"));
        assert!(!is_automation_login("alice"));
        assert!(!is_automation_login("bot"));
    }

    #[test]
    fn test_classify_created() {
        let since = date(2024, 1, 1, 0);
        let until = date(2024, 1, 7, 23);

        assert_eq!(
            classify_created(date(2024, 1, 3, 10), since, until),
            WindowDecision::Take
        );
        assert_eq!(
            classify_created(date(2024, 1, 8, 0), since, until),
            WindowDecision::Skip
        );
        assert_eq!(
            classify_created(date(2023, 12, 31, 23), since, until),
            WindowDecision::Stop
        );
    }

    #[test]
    fn test_window_bounds_inclusive_end_of_day() {
        let (start, end) = window_bounds(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
        );
        assert_eq!(start, date(2024, 1, 1, 0));
        assert_eq!(
            end,
            NaiveDate::from_ymd_opt(2024, 1, 7)
                .unwrap()
                .and_hms_opt(23, 59, 59)
                .unwrap()
        );
    }

    #[test]
    fn test_to_pull_request_skips_automation_authors() {
        let item = GitHubPullRequest {
            number: 2,
            title: "Bump dep".to_string(),
            state: "open".to_string(),
            html_url: String::new(),
            created_at: chrono::Utc::now(),
            merged_at: None,
            user: Some(GitHubUser {
                login: Some("dependabot[bot]".to_string()),
            }),
            requested_reviewers: Vec::new(),
            labels: Vec::new(),
        };
        assert!(to_pull_request("org/repo", item).is_none());
    }

    #[test]
    fn test_to_pull_request_skips_missing_author() {
        let item = GitHubPullRequest {
            number: 3,
            title: "Ghost".to_string(),
            state: "open".to_string(),
            html_url: String::new(),
            created_at: chrono::Utc::now(),
            merged_at: None,
            user: None,
            requested_reviewers: Vec::new(),
            labels: Vec::new(),
        };
        assert!(to_pull_request("org/repo", item).is_none());
    }

    #[test]
    fn test_to_pull_request_derives_merged_status() {
        let item = GitHubPullRequest {
            number: 4,
            title: "Shipped".to_string(),
            state: "closed".to_string(),
            html_url: String::new(),
            created_at: chrono::Utc::now(),
            merged_at: Some(chrono::Utc::now()),
            user: Some(GitHubUser {
                login: Some("alice".to_string()),
            }),
            requested_reviewers: vec![GitHubUser {
                login: Some("bob".to_string()),
            }],
            labels: Vec::new(),
        };
        let pr = to_pull_request("org/repo", item).unwrap();
        assert_eq!(pr.status, PullRequestStatus::Merged);
        assert_eq!(pr.requested_reviewers, vec!["bob"]);
    }

    #[test]
    fn test_latest_terminal_verdict_wins() {
        // Changes requested, then approved: carol approves.
        let sets = fold(&[
            review("carol", "CHANGES_REQUESTED"),
            review("carol", "APPROVED"),
        ]);
        assert_eq!(sets.approved_by, vec!["carol"]);

        // Reversed order: the later changes-request cancels the approval.
        let sets = fold(&[
            review("carol", "APPROVED"),
            review("carol", "CHANGES_REQUESTED"),
        ]);
        assert!(sets.approved_by.is_empty());
        assert_eq!(sets.reviewers, vec!["carol"]);
    }

    #[test]
    fn test_commented_review_leaves_verdict_intact() {
        let sets = fold(&[review("bob", "APPROVED"), review("bob", "COMMENTED")]);
        assert_eq!(sets.approved_by, vec!["bob"]);

        // A bare comment review still counts as review participation.
        let sets = fold(&[review("dave", "COMMENTED")]);
        assert_eq!(sets.reviewers, vec!["dave"]);
        assert!(sets.approved_by.is_empty());
    }

    #[test]
    fn test_reviewers_keep_first_seen_order() {
        let sets = fold(&[
            review("bob", "COMMENTED"),
            review("carol", "APPROVED"),
            review("bob", "APPROVED"),
        ]);
        assert_eq!(sets.reviewers, vec!["bob", "carol"]);
        // Approvers follow reviewer-set order, not approval order.
        assert_eq!(sets.approved_by, vec!["bob", "carol"]);
    }

    #[test]
    fn test_automation_and_malformed_reviewers_excluded() {
        let sets = fold(&[
            review("ci-helper[bot]", "APPROVED"),
            review("", "APPROVED"),
            GitHubReview {
                user: None,
                state: "APPROVED".to_string(),
            },
            review("bob", "APPROVED"),
        ]);
        assert_eq!(sets.reviewers, vec!["bob"]);
        assert_eq!(sets.approved_by, vec!["bob"]);
    }

    #[test]
    fn test_comment_flags_require_bot_and_marker() {
        let mut flags = CommentFlags::default();
        absorb_comment_flags(&mut flags, &[comment("alice", "Code Review looks fine")]);
        assert!(!flags.review_bot_seen);

        absorb_comment_flags(&mut flags, &[comment("github-actions[bot]", "Deploy done")]);
        assert!(!flags.review_bot_seen);

        absorb_comment_flags(
            &mut flags,
            &[comment("github-actions[bot]", "Code Review complete")],
        );
        assert!(flags.review_bot_seen);
    }

    #[test]
    fn test_ignore_token_from_any_author() {
        let mut flags = CommentFlags::default();
        absorb_comment_flags(&mut flags, &[comment("alice", "please #ignore-tracker")]);
        assert!(flags.ignore_marked);
        assert!(!flags.review_bot_seen);
    }

    #[test]
    fn test_flags_accumulate_across_pages() {
        let mut flags = CommentFlags::default();
        absorb_comment_flags(
            &mut flags,
            &[comment("github-actions[bot]", "Code Review complete")],
        );
        absorb_comment_flags(&mut flags, &[comment("alice", "unrelated")]);
        // A later page without the marker never clears the flag.
        assert!(flags.review_bot_seen);
    }

    #[test]
    fn test_comment_with_missing_fields_is_harmless() {
        let mut flags = CommentFlags::default();
        absorb_comment_flags(
            &mut flags,
            &[GitHubIssueComment {
                user: None,
                body: None,
            }],
        );
        assert_eq!(flags, CommentFlags::default());
    }

    #[test]
    fn test_merge_reviewers_pending_after_resolved() {
        let merged = merge_reviewers(
            vec!["bob".to_string(), "carol".to_string()],
            &["carol".to_string(), "dave".to_string()],
        );
        assert_eq!(merged, vec!["bob", "carol", "dave"]);
    }

    #[tokio::test]
    async fn test_gate_bounds_concurrency() {
        let gate = Semaphore::new(ENRICH_CONCURRENCY);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..25).map(|_| {
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            gated(&gate, async move {
                let in_flight = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(in_flight, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                Ok::<(), AppError>(())
            })
        });

        try_join_all(tasks).await.unwrap();
        assert_eq!(peak.load(Ordering::SeqCst), ENRICH_CONCURRENCY);
    }

    #[tokio::test]
    async fn test_gate_surfaces_item_failure() {
        let gate = Semaphore::new(2);
        let tasks = (0..5).map(|i| {
            gated(&gate, async move {
                if i == 3 {
                    Err(AppError::github_api("boom"))
                } else {
                    Ok(i)
                }
            })
        });

        assert!(try_join_all(tasks).await.is_err());
    }
}
