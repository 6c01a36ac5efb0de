use log_subscription_core::config::ReconcilerConfig;
use log_subscription_core::contract::{
    build_write_requests, BatchWriteOutcome, FunctionRecord, NameSet, TrackedState,
    MAX_BATCH_WRITE_ITEMS,
};
use log_subscription_core::error::{ReconcileError, ServiceError};
use log_subscription_core::retry::{PollPolicy, RetryPolicy};
use tracing::{info, warn};

use crate::adapters::tracking_table::{TableSpec, TableStatus, TrackingTable};

const COMPONENT: &str = "state_store";

/// Upper bound on pages walked in one scan.
pub const MAX_SCAN_PAGES: usize = 10_000;

/// Tracking-table access for a reconciliation pass.
pub struct StateStore<'a> {
    table: &'a dyn TrackingTable,
    table_name: String,
    poll: PollPolicy,
    retry: RetryPolicy,
}

impl<'a> StateStore<'a> {
    pub fn new(
        table: &'a dyn TrackingTable,
        table_name: impl Into<String>,
        poll: PollPolicy,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            table,
            table_name: table_name.into(),
            poll,
            retry,
        }
    }

    pub fn from_config(table: &'a dyn TrackingTable, config: &ReconcilerConfig) -> Self {
        Self::new(
            table,
            config.table_name.clone(),
            config.table_poll,
            config.describe_retry,
        )
    }

    /// Makes sure the table exists and is active. Returns `true` when this
    /// call created it.
    pub async fn ensure_store_exists(&self) -> Result<bool, ReconcileError> {
        match self.describe_with_retry().await? {
            TableStatus::Active => Ok(false),
            TableStatus::Missing => {
                info!(
                    component = COMPONENT,
                    event = "table_missing",
                    table = %self.table_name,
                );
                let created = match self
                    .table
                    .create_table(&TableSpec::for_table(self.table_name.clone()))
                    .await
                {
                    Ok(_) => true,
                    // Someone else created it between describe and create.
                    Err(ServiceError::ResourceInUse(_)) => false,
                    Err(error) => return Err(ReconcileError::store("create_table", error)),
                };
                self.wait_until_active().await?;
                info!(
                    component = COMPONENT,
                    event = "table_created",
                    table = %self.table_name,
                    created,
                );
                Ok(created)
            }
            status => {
                info!(
                    component = COMPONENT,
                    event = "table_not_active",
                    table = %self.table_name,
                    status = ?status,
                );
                self.wait_until_active().await?;
                Ok(false)
            }
        }
    }

    /// Names whose record says a subscription exists.
    pub async fn list_tracked(&self) -> Result<NameSet, ReconcileError> {
        Ok(self.scan_tracked().await?.subscribed)
    }

    pub async fn scan_tracked(&self) -> Result<TrackedState, ReconcileError> {
        let mut state = TrackedState::default();
        let mut start_key = None;

        for pages in 1..=MAX_SCAN_PAGES {
            let page = self
                .table
                .scan_page(start_key.take())
                .await
                .map_err(|error| ReconcileError::store("scan", error))?;
            for record in page.records {
                state.insert(record);
            }

            match page.last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => {
                    info!(
                        component = COMPONENT,
                        event = "tracked_scanned",
                        subscribed_count = state.subscribed.len(),
                        pending_count = state.pending.len(),
                        pages,
                    );
                    return Ok(state);
                }
            }
        }

        Err(ReconcileError::store(
            "scan",
            ServiceError::Fatal(format!(
                "scan of {} did not finish within {MAX_SCAN_PAGES} pages",
                self.table_name
            )),
        ))
    }

    pub async fn is_tracked(&self, function_name: &str) -> Result<bool, ReconcileError> {
        self.table
            .get_record(function_name)
            .await
            .map(|record| record.is_some())
            .map_err(|error| ReconcileError::store("get_item", error))
    }

    /// Writes upserts and deletes as one logical batch, sent in chunks the
    /// table accepts. Unprocessed items are returned, not retried.
    pub async fn apply_changes(
        &self,
        additions: &[FunctionRecord],
        removals: &[String],
    ) -> Result<BatchWriteOutcome, ReconcileError> {
        let requests = build_write_requests(additions, removals);
        let mut outcome = BatchWriteOutcome::default();

        for chunk in requests.chunks(MAX_BATCH_WRITE_ITEMS) {
            let unprocessed = self
                .table
                .batch_write(chunk)
                .await
                .map_err(|error| ReconcileError::store("batch_write", error))?;
            outcome.merge(BatchWriteOutcome { unprocessed });
        }

        if outcome.is_complete() {
            info!(
                component = COMPONENT,
                event = "changes_applied",
                upserts = additions.len(),
                deletes = removals.len(),
            );
        } else {
            warn!(
                component = COMPONENT,
                event = "partial_write",
                upserts = additions.len(),
                deletes = removals.len(),
                unprocessed = ?outcome.unprocessed_names(),
                "tracking table left items unprocessed; the next pass will pick them up",
            );
        }
        Ok(outcome)
    }

    async fn describe_with_retry(&self) -> Result<TableStatus, ReconcileError> {
        let mut attempt = 0u32;
        loop {
            match self.table.describe_table().await {
                Ok(status) => return Ok(status),
                Err(error) if error.is_retryable() => {
                    if !self.retry.allows_retry_after(attempt) {
                        return Err(ReconcileError::StoreUnavailable {
                            table: self.table_name.clone(),
                            attempts: attempt + 1,
                            source: error,
                        });
                    }
                    let delay = self.retry.backoff.next(attempt);
                    warn!(
                        component = COMPONENT,
                        event = "describe_retry",
                        table = %self.table_name,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(ReconcileError::store("describe_table", error)),
            }
        }
    }

    async fn wait_until_active(&self) -> Result<(), ReconcileError> {
        let attempts = self.poll.max_attempts.max(1);
        for poll in 1..=attempts {
            if self.describe_with_retry().await? == TableStatus::Active {
                return Ok(());
            }
            if poll < attempts {
                tokio::time::sleep(self.poll.interval).await;
            }
        }

        Err(ReconcileError::StoreCreationTimeout {
            table: self.table_name.clone(),
            attempts,
        })
    }
}
