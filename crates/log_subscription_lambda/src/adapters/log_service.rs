use async_trait::async_trait;
use log_subscription_core::error::ServiceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionFilterSpec {
    pub log_group_name: String,
    pub filter_name: String,
    pub filter_pattern: String,
    pub destination_arn: String,
}

#[async_trait]
pub trait LogService: Send + Sync {
    /// Names of log groups starting with `prefix`.
    async fn describe_log_groups(&self, prefix: &str) -> Result<Vec<String>, ServiceError>;

    /// Names of filters on `log_group_name` starting with `filter_name_prefix`.
    async fn describe_subscription_filters(
        &self,
        log_group_name: &str,
        filter_name_prefix: &str,
    ) -> Result<Vec<String>, ServiceError>;

    async fn put_subscription_filter(
        &self,
        spec: &SubscriptionFilterSpec,
    ) -> Result<(), ServiceError>;

    async fn delete_subscription_filter(
        &self,
        log_group_name: &str,
        filter_name: &str,
    ) -> Result<(), ServiceError>;
}
