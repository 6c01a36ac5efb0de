//! AWS-oriented adapters and handlers for log-subscription reconciliation.
//!
//! This crate owns runtime integration details (the Lambda handler, the
//! Lambda/DynamoDB/CloudWatch Logs adapters and log setup) and the
//! components that drive a pass over them. Deterministic planning lives in
//! `log_subscription_core`.

pub mod adapters;
pub mod aws;
pub mod handlers;
pub mod reconciler;
pub mod services;
pub mod telemetry;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
