use std::time::Duration;

use crate::contract::{DEFAULT_FILTER_PATTERN, DEFAULT_LOG_GROUP_PREFIX};
use crate::error::ReconcileError;
use crate::retry::{PollPolicy, RetryPolicy};

pub const TABLE_NAME_VAR: &str = "TRACKING_TABLE_NAME";
pub const FILTER_NAME_VAR: &str = "SUBSCRIPTION_FILTER_NAME";
pub const DELIVERY_TARGET_ARN_VAR: &str = "DELIVERY_TARGET_ARN";
pub const DELIVERY_FUNCTION_NAME_VAR: &str = "DELIVERY_FUNCTION_NAME";
pub const FILTER_PATTERN_VAR: &str = "SUBSCRIPTION_FILTER_PATTERN";
pub const LOG_GROUP_PREFIX_VAR: &str = "LOG_GROUP_PREFIX";
pub const TABLE_POLL_INTERVAL_VAR: &str = "TABLE_POLL_INTERVAL_SECS";
pub const TABLE_POLL_MAX_ATTEMPTS_VAR: &str = "TABLE_POLL_MAX_ATTEMPTS";

// Names used by deployments that predate the uppercase variables.
const LEGACY_TABLE_NAME_VAR: &str = "table_name";
const LEGACY_FILTER_NAME_VAR: &str = "filter_name";
const LEGACY_DELIVERY_TARGET_ARN_VAR: &str = "lambda_arn";

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilerConfig {
    pub table_name: String,
    pub filter_name: String,
    pub delivery_target_arn: String,
    /// Function behind `delivery_target_arn`; never tracked or subscribed.
    pub delivery_function_name: String,
    pub filter_pattern: String,
    pub log_group_prefix: String,
    pub table_poll: PollPolicy,
    pub describe_retry: RetryPolicy,
}

impl ReconcilerConfig {
    pub fn from_env() -> Result<Self, ReconcileError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ReconcileError> {
        let value = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |key: &str, legacy: Option<&str>| {
            value(key)
                .or_else(|| legacy.and_then(&value))
                .ok_or_else(|| ReconcileError::Config(format!("{key} must be configured")))
        };

        let defaults = PollPolicy::default();
        let table_poll = PollPolicy {
            interval: match value(TABLE_POLL_INTERVAL_VAR) {
                Some(raw) => Duration::from_secs(parse_number(TABLE_POLL_INTERVAL_VAR, &raw)?),
                None => defaults.interval,
            },
            max_attempts: match value(TABLE_POLL_MAX_ATTEMPTS_VAR) {
                Some(raw) => parse_number(TABLE_POLL_MAX_ATTEMPTS_VAR, &raw)?,
                None => defaults.max_attempts,
            },
        };

        let delivery_target_arn = required(
            DELIVERY_TARGET_ARN_VAR,
            Some(LEGACY_DELIVERY_TARGET_ARN_VAR),
        )?;
        let delivery_function_name = value(DELIVERY_FUNCTION_NAME_VAR)
            .or_else(|| function_name_from_arn(&delivery_target_arn))
            .ok_or_else(|| {
                ReconcileError::Config(format!("{DELIVERY_FUNCTION_NAME_VAR} must be configured"))
            })?;

        Ok(Self {
            table_name: required(TABLE_NAME_VAR, Some(LEGACY_TABLE_NAME_VAR))?,
            filter_name: required(FILTER_NAME_VAR, Some(LEGACY_FILTER_NAME_VAR))?,
            delivery_target_arn,
            delivery_function_name,
            filter_pattern: value(FILTER_PATTERN_VAR)
                .unwrap_or_else(|| DEFAULT_FILTER_PATTERN.to_string()),
            log_group_prefix: value(LOG_GROUP_PREFIX_VAR)
                .unwrap_or_else(|| DEFAULT_LOG_GROUP_PREFIX.to_string()),
            table_poll,
            describe_retry: RetryPolicy::default(),
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ReconcileError> {
    raw.parse().map_err(|_| {
        ReconcileError::Config(format!("{key} must be a non-negative integer, got {raw:?}"))
    })
}

/// `arn:aws:lambda:<region>:<account>:function:<name>[:<qualifier>]` -> `<name>`.
fn function_name_from_arn(arn: &str) -> Option<String> {
    let (_, rest) = arn.split_once(":function:")?;
    let name = rest.split(':').next()?.trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const DELIVERY: &str = "LogsToElasticsearch_new-domain";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required_pairs() -> Vec<(&'static str, &'static str)> {
        vec![
            (TABLE_NAME_VAR, "lambda-subscriptions"),
            (FILTER_NAME_VAR, "report-forwarder"),
            (
                DELIVERY_TARGET_ARN_VAR,
                "arn:aws:lambda:eu-west-1:123456789012:function:LogsToElasticsearch_new-domain",
            ),
            (DELIVERY_FUNCTION_NAME_VAR, DELIVERY),
        ]
    }

    #[test]
    fn applies_defaults_for_optional_values() {
        let config =
            ReconcilerConfig::from_lookup(lookup(&required_pairs())).expect("config should load");

        assert_eq!(config.table_name, "lambda-subscriptions");
        assert_eq!(config.filter_pattern, "REPORT");
        assert_eq!(config.log_group_prefix, "/aws/lambda/");
        assert_eq!(config.table_poll, PollPolicy::default());
        assert_eq!(config.describe_retry, RetryPolicy::default());
    }

    #[test]
    fn delivery_function_defaults_to_the_target_arn_name() {
        let pairs: Vec<_> = required_pairs()
            .into_iter()
            .filter(|(key, _)| *key != DELIVERY_FUNCTION_NAME_VAR)
            .collect();

        let config = ReconcilerConfig::from_lookup(lookup(&pairs)).expect("config should load");
        assert_eq!(config.delivery_function_name, DELIVERY);
    }

    #[test]
    fn qualified_target_arn_drops_the_alias() {
        assert_eq!(
            function_name_from_arn("arn:aws:lambda:eu-west-1:1:function:sink:live"),
            Some("sink".to_string())
        );
        assert_eq!(
            function_name_from_arn("arn:aws:lambda:eu-west-1:1:function:"),
            None
        );
    }

    #[test]
    fn rejects_missing_delivery_function_for_non_function_target() {
        let mut pairs: Vec<_> = required_pairs()
            .into_iter()
            .filter(|(key, _)| *key != DELIVERY_FUNCTION_NAME_VAR)
            .collect();
        pairs[2] = (
            DELIVERY_TARGET_ARN_VAR,
            "arn:aws:kinesis:eu-west-1:123456789012:stream/log-events",
        );

        let error = ReconcilerConfig::from_lookup(lookup(&pairs)).expect_err("config should fail");
        assert_eq!(
            error.to_string(),
            "invalid configuration: DELIVERY_FUNCTION_NAME must be configured"
        );
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut pairs = required_pairs();
        pairs[0] = (TABLE_NAME_VAR, "   ");

        let error = ReconcilerConfig::from_lookup(lookup(&pairs)).expect_err("config should fail");
        assert!(error.to_string().contains(TABLE_NAME_VAR));
    }

    #[test]
    fn accepts_legacy_variable_names() {
        let config = ReconcilerConfig::from_lookup(lookup(&[
            ("table_name", "legacy-table"),
            ("filter_name", "legacy-filter"),
            ("lambda_arn", "arn:aws:lambda:us-east-1:1:function:sink"),
        ]))
        .expect("legacy config should load");

        assert_eq!(config.table_name, "legacy-table");
        assert_eq!(config.filter_name, "legacy-filter");
        assert_eq!(
            config.delivery_target_arn,
            "arn:aws:lambda:us-east-1:1:function:sink"
        );
        assert_eq!(config.delivery_function_name, "sink");
    }

    #[test]
    fn parses_poll_overrides_and_rejects_garbage() {
        let mut pairs = required_pairs();
        pairs.push((TABLE_POLL_INTERVAL_VAR, "2"));
        pairs.push((TABLE_POLL_MAX_ATTEMPTS_VAR, "30"));
        let config = ReconcilerConfig::from_lookup(lookup(&pairs)).expect("config should load");
        assert_eq!(config.table_poll.interval, Duration::from_secs(2));
        assert_eq!(config.table_poll.max_attempts, 30);

        let mut pairs = required_pairs();
        pairs.push((TABLE_POLL_MAX_ATTEMPTS_VAR, "ten"));
        let error = ReconcilerConfig::from_lookup(lookup(&pairs)).expect_err("config should fail");
        assert!(matches!(error, ReconcileError::Config(_)));
    }
}
