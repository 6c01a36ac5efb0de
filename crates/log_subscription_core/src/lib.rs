//! Shared log-subscription reconciliation domain primitives.
//!
//! This crate owns the deterministic part of a reconciliation pass: tracked
//! records, the inventory/state diff, retry and polling policies, the error
//! taxonomy and invocation configuration. It intentionally excludes AWS SDK
//! and Lambda runtime concerns, which live in `log_subscription_lambda`.

pub mod config;
pub mod contract;
pub mod error;
pub mod plan;
pub mod retry;
