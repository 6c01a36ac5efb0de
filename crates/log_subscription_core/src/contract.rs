use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub const REPORT_SCHEMA_VERSION: &str = "v1";
pub const DEFAULT_LOG_GROUP_PREFIX: &str = "/aws/lambda/";
pub const DEFAULT_FILTER_PATTERN: &str = "REPORT";

/// Hash key attribute of the tracking table.
pub const FUNCTION_NAME_ATTRIBUTE: &str = "functionName";
pub const SUBSCRIPTION_ATTRIBUTE: &str = "subscription";

pub const TABLE_READ_CAPACITY_UNITS: i64 = 1;
pub const TABLE_WRITE_CAPACITY_UNITS: i64 = 1;

/// DynamoDB rejects `BatchWriteItem` calls carrying more requests than this.
pub const MAX_BATCH_WRITE_ITEMS: usize = 25;

pub type NameSet = BTreeSet<String>;

/// One row of the tracking table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct FunctionRecord {
    pub function_name: String,
    pub has_subscription: bool,
}

impl FunctionRecord {
    pub fn new(function_name: impl Into<String>, has_subscription: bool) -> Self {
        Self {
            function_name: function_name.into(),
            has_subscription,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRequest {
    Put(FunctionRecord),
    Delete(String),
}

impl WriteRequest {
    pub fn function_name(&self) -> &str {
        match self {
            WriteRequest::Put(record) => &record.function_name,
            WriteRequest::Delete(name) => name,
        }
    }
}

/// Result of a batched write. Items the store did not process are handed
/// back to the caller instead of being retried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchWriteOutcome {
    pub unprocessed: Vec<WriteRequest>,
}

impl BatchWriteOutcome {
    pub fn is_complete(&self) -> bool {
        self.unprocessed.is_empty()
    }

    pub fn merge(&mut self, other: BatchWriteOutcome) {
        self.unprocessed.extend(other.unprocessed);
    }

    pub fn unprocessed_names(&self) -> Vec<&str> {
        self.unprocessed
            .iter()
            .map(WriteRequest::function_name)
            .collect()
    }
}

/// Builds the store requests for one logical change set: upserts first,
/// then deletes.
pub fn build_write_requests(
    additions: &[FunctionRecord],
    removals: &[String],
) -> Vec<WriteRequest> {
    additions
        .iter()
        .cloned()
        .map(WriteRequest::Put)
        .chain(removals.iter().cloned().map(WriteRequest::Delete))
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionAction {
    Created,
    AlreadyPresent,
    DestinationMissing,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionOutcome {
    pub subscribed: bool,
    pub action: SubscriptionAction,
}

impl SubscriptionOutcome {
    pub fn created() -> Self {
        Self {
            subscribed: true,
            action: SubscriptionAction::Created,
        }
    }

    pub fn already_present() -> Self {
        Self {
            subscribed: true,
            action: SubscriptionAction::AlreadyPresent,
        }
    }

    pub fn destination_missing() -> Self {
        Self {
            subscribed: false,
            action: SubscriptionAction::DestinationMissing,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnsubscribeOutcome {
    Removed,
    FilterAbsent,
    DestinationMissing,
}

/// Full scan of the tracking table split on the subscription flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedState {
    pub subscribed: NameSet,
    pub pending: NameSet,
}

impl TrackedState {
    pub fn insert(&mut self, record: FunctionRecord) {
        if record.has_subscription {
            self.pending.remove(&record.function_name);
            self.subscribed.insert(record.function_name);
        } else if !self.subscribed.contains(&record.function_name) {
            self.pending.insert(record.function_name);
        }
    }

    pub fn len(&self) -> usize {
        self.subscribed.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribed.is_empty() && self.pending.is_empty()
    }
}

/// Log group that receives a function's output.
pub fn log_group_name(prefix: &str, function_name: &str) -> String {
    format!("{prefix}{function_name}")
}

/// Summary of a single reconciliation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconcileReport {
    pub schema_version: String,
    pub event_time: String,
    pub table_created: bool,
    pub inventory_count: usize,
    pub tracked_count: usize,
    pub subscribed: Vec<String>,
    pub pending: Vec<String>,
    pub unsubscribed: Vec<String>,
    pub purged: Vec<String>,
    pub unchanged_count: usize,
    pub unprocessed_writes: Vec<String>,
}

impl ReconcileReport {
    pub fn new(event_time: impl Into<String>) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            event_time: event_time.into(),
            ..Self::default()
        }
    }

    pub fn is_noop(&self) -> bool {
        self.subscribed.is_empty()
            && self.pending.is_empty()
            && self.unsubscribed.is_empty()
            && self.purged.is_empty()
    }
}
