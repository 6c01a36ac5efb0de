use log_subscription_core::config::ReconcilerConfig;
use log_subscription_core::contract::{log_group_name, SubscriptionOutcome, UnsubscribeOutcome};
use log_subscription_core::error::{ReconcileError, ServiceError};
use tracing::info;

use crate::adapters::log_service::{LogService, SubscriptionFilterSpec};

const COMPONENT: &str = "subscription_manager";
pub const LOG_SERVICE: &str = "logs";

/// Idempotently attaches or detaches the configured subscription filter on a
/// function's log group.
pub struct SubscriptionManager<'a> {
    logs: &'a dyn LogService,
    filter_name: String,
    filter_pattern: String,
    destination_arn: String,
    log_group_prefix: String,
}

impl<'a> SubscriptionManager<'a> {
    pub fn from_config(logs: &'a dyn LogService, config: &ReconcilerConfig) -> Self {
        Self {
            logs,
            filter_name: config.filter_name.clone(),
            filter_pattern: config.filter_pattern.clone(),
            destination_arn: config.delivery_target_arn.clone(),
            log_group_prefix: config.log_group_prefix.clone(),
        }
    }

    pub async fn ensure_subscribed(
        &self,
        function_name: &str,
    ) -> Result<SubscriptionOutcome, ReconcileError> {
        let log_group = log_group_name(&self.log_group_prefix, function_name);
        if !self.destination_exists(&log_group).await? {
            return Ok(self.destination_missing(function_name, &log_group));
        }

        match self.filter_exists(&log_group).await {
            Ok(true) => {
                info!(
                    component = COMPONENT,
                    event = "subscription_exists",
                    function_name,
                    log_group = %log_group,
                );
                return Ok(SubscriptionOutcome::already_present());
            }
            Ok(false) => {}
            Err(error) if error.is_not_found() => {
                return Ok(self.destination_missing(function_name, &log_group));
            }
            Err(error) => return Err(ReconcileError::upstream(LOG_SERVICE, error)),
        }

        let spec = SubscriptionFilterSpec {
            log_group_name: log_group.clone(),
            filter_name: self.filter_name.clone(),
            filter_pattern: self.filter_pattern.clone(),
            destination_arn: self.destination_arn.clone(),
        };
        match self.logs.put_subscription_filter(&spec).await {
            Ok(()) => {
                info!(
                    component = COMPONENT,
                    event = "subscription_created",
                    function_name,
                    log_group = %log_group,
                    filter_name = %self.filter_name,
                );
                Ok(SubscriptionOutcome::created())
            }
            Err(error) if error.is_not_found() => {
                Ok(self.destination_missing(function_name, &log_group))
            }
            Err(error) => Err(ReconcileError::upstream(LOG_SERVICE, error)),
        }
    }

    pub async fn ensure_unsubscribed(
        &self,
        function_name: &str,
    ) -> Result<UnsubscribeOutcome, ReconcileError> {
        let log_group = log_group_name(&self.log_group_prefix, function_name);
        if !self.destination_exists(&log_group).await? {
            info!(
                component = COMPONENT,
                event = "destination_missing",
                function_name,
                log_group = %log_group,
            );
            return Ok(UnsubscribeOutcome::DestinationMissing);
        }

        let outcome = match self.filter_exists(&log_group).await {
            Ok(false) => UnsubscribeOutcome::FilterAbsent,
            Ok(true) => match self
                .logs
                .delete_subscription_filter(&log_group, &self.filter_name)
                .await
            {
                Ok(()) => UnsubscribeOutcome::Removed,
                Err(error) if error.is_not_found() => UnsubscribeOutcome::FilterAbsent,
                Err(error) => return Err(ReconcileError::upstream(LOG_SERVICE, error)),
            },
            Err(error) if error.is_not_found() => UnsubscribeOutcome::DestinationMissing,
            Err(error) => return Err(ReconcileError::upstream(LOG_SERVICE, error)),
        };

        let event = match outcome {
            UnsubscribeOutcome::Removed => "subscription_deleted",
            UnsubscribeOutcome::FilterAbsent => "subscription_absent",
            UnsubscribeOutcome::DestinationMissing => "destination_missing",
        };
        info!(
            component = COMPONENT,
            event,
            function_name,
            log_group = %log_group,
        );
        Ok(outcome)
    }

    // Lookups are by prefix, so compare names exactly.
    async fn destination_exists(&self, log_group: &str) -> Result<bool, ReconcileError> {
        let groups = self
            .logs
            .describe_log_groups(log_group)
            .await
            .map_err(|error| ReconcileError::upstream(LOG_SERVICE, error))?;
        Ok(groups.iter().any(|group| group == log_group))
    }

    async fn filter_exists(&self, log_group: &str) -> Result<bool, ServiceError> {
        let filters = self
            .logs
            .describe_subscription_filters(log_group, &self.filter_name)
            .await?;
        Ok(filters.iter().any(|filter| *filter == self.filter_name))
    }

    fn destination_missing(&self, function_name: &str, log_group: &str) -> SubscriptionOutcome {
        info!(
            component = COMPONENT,
            event = "destination_missing",
            function_name,
            log_group,
        );
        SubscriptionOutcome::destination_missing()
    }
}
