//! PR Review Tracker - dashboard backend for GitHub review readiness.
//!
//! Aggregates pull-request review status across configured repositories:
//! windowed fetching, per-pull-request review resolution with bounded
//! concurrent fan-out, a shared rate budget, and layered TTL caches so
//! repeated dashboard queries avoid refetching unchanged data.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
