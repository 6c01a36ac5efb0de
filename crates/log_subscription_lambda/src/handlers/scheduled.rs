use std::time::Instant;

use chrono::Utc;
use log_subscription_core::config::ReconcilerConfig;
use log_subscription_core::contract::ReconcileReport;
use log_subscription_core::error::ReconcileError;
use serde_json::Value;
use tracing::{error, info};

use crate::reconciler::{Collaborators, Reconciler};

const COMPONENT: &str = "scheduled_handler";

/// Entry point for a scheduler trigger. The event payload is only logged.
pub async fn handle_scheduled_event(
    event: &Value,
    config: &ReconcilerConfig,
    collaborators: Collaborators<'_>,
) -> Result<ReconcileReport, ReconcileError> {
    let started_at = Instant::now();
    info!(
        component = COMPONENT,
        event = "pass_started",
        trigger_source = trigger_field(event, "source").unwrap_or("unknown"),
        trigger_detail_type = trigger_field(event, "detail-type").unwrap_or("unknown"),
        table = %config.table_name,
    );

    let result = Reconciler::new(config, collaborators)
        .run(Utc::now().to_rfc3339())
        .await;

    match &result {
        Ok(report) => info!(
            component = COMPONENT,
            event = "pass_finished",
            duration_ms = started_at.elapsed().as_millis() as u64,
            noop = report.is_noop(),
        ),
        Err(error) => error!(
            component = COMPONENT,
            event = "pass_failed",
            duration_ms = started_at.elapsed().as_millis() as u64,
            error_label = error.as_label(),
            error = %error,
        ),
    }
    result
}

fn trigger_field<'e>(event: &'e Value, key: &str) -> Option<&'e str> {
    event.get(key).and_then(Value::as_str)
}
