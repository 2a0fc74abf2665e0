//! Business logic services.
//!
//! This module contains the aggregation engine and its collaborators: the
//! GitHub API client, the layered TTL caches, and the HTTP surface that
//! exposes the engine to the dashboard.

pub mod api;
pub mod cache;
pub mod github_client;
pub mod server;
pub mod tracker;

pub use cache::CacheService;
pub use github_client::GitHubClient;
pub use tracker::ReviewTracker;
