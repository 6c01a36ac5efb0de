use async_trait::async_trait;
use log_subscription_core::error::ServiceError;

use super::classify_sdk_error;
use crate::adapters::log_service::{LogService, SubscriptionFilterSpec};

#[derive(Clone)]
pub struct CloudWatchLogService {
    client: aws_sdk_cloudwatchlogs::Client,
}

impl CloudWatchLogService {
    pub fn new(client: aws_sdk_cloudwatchlogs::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LogService for CloudWatchLogService {
    // Groups come back sorted by name, so an exact match on `prefix` is
    // always on the first page.
    async fn describe_log_groups(&self, prefix: &str) -> Result<Vec<String>, ServiceError> {
        let output = self
            .client
            .describe_log_groups()
            .log_group_name_prefix(prefix)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        Ok(output
            .log_groups()
            .iter()
            .filter_map(|group| group.log_group_name())
            .map(str::to_string)
            .collect())
    }

    async fn describe_subscription_filters(
        &self,
        log_group_name: &str,
        filter_name_prefix: &str,
    ) -> Result<Vec<String>, ServiceError> {
        let output = self
            .client
            .describe_subscription_filters()
            .log_group_name(log_group_name)
            .filter_name_prefix(filter_name_prefix)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        Ok(output
            .subscription_filters()
            .iter()
            .filter_map(|filter| filter.filter_name())
            .map(str::to_string)
            .collect())
    }

    async fn put_subscription_filter(
        &self,
        spec: &SubscriptionFilterSpec,
    ) -> Result<(), ServiceError> {
        self.client
            .put_subscription_filter()
            .log_group_name(&spec.log_group_name)
            .filter_name(&spec.filter_name)
            .filter_pattern(&spec.filter_pattern)
            .destination_arn(&spec.destination_arn)
            .send()
            .await
            .map(|_| ())
            .map_err(classify_sdk_error)
    }

    async fn delete_subscription_filter(
        &self,
        log_group_name: &str,
        filter_name: &str,
    ) -> Result<(), ServiceError> {
        self.client
            .delete_subscription_filter()
            .log_group_name(log_group_name)
            .filter_name(filter_name)
            .send()
            .await
            .map(|_| ())
            .map_err(classify_sdk_error)
    }
}
