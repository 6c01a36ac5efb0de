use log_subscription_core::config::ReconcilerConfig;
use log_subscription_core::contract::{BatchWriteOutcome, FunctionRecord, ReconcileReport};
use log_subscription_core::error::ReconcileError;
use log_subscription_core::plan::{plan_reconciliation, ReconciliationPlan};
use tracing::{info, warn};

use crate::adapters::inventory::FunctionInventory;
use crate::adapters::log_service::LogService;
use crate::adapters::tracking_table::TrackingTable;
use crate::services::inventory_lister::InventoryLister;
use crate::services::state_store::StateStore;
use crate::services::subscription_manager::SubscriptionManager;

const COMPONENT: &str = "reconciler";

/// The external services one pass talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub inventory: &'a dyn FunctionInventory,
    pub table: &'a dyn TrackingTable,
    pub logs: &'a dyn LogService,
}

pub struct Reconciler<'a> {
    lister: InventoryLister<'a>,
    store: StateStore<'a>,
    subscriptions: SubscriptionManager<'a>,
    delivery_function_name: String,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &ReconcilerConfig, collaborators: Collaborators<'a>) -> Self {
        Self {
            lister: InventoryLister::new(collaborators.inventory),
            store: StateStore::from_config(collaborators.table, config),
            subscriptions: SubscriptionManager::from_config(collaborators.logs, config),
            delivery_function_name: config.delivery_function_name.clone(),
        }
    }

    /// Runs one full pass. Calls are issued one at a time; any collaborator
    /// error ends the pass and is left for the next scheduled run.
    pub async fn run(
        &self,
        event_time: impl Into<String>,
    ) -> Result<ReconcileReport, ReconcileError> {
        let mut report = ReconcileReport::new(event_time);
        report.table_created = self.store.ensure_store_exists().await?;

        let inventory = self.lister.list_all().await?;
        let tracked = self.store.scan_tracked().await?;
        report.inventory_count = inventory.len();
        report.tracked_count = tracked.subscribed.len();

        let plan = plan_reconciliation(&inventory, &tracked, &self.delivery_function_name);
        report.unchanged_count = plan.unchanged.len();
        info!(
            component = COMPONENT,
            event = "plan_computed",
            inventory_count = inventory.len(),
            tracked_count = tracked.subscribed.len(),
            to_add = plan.to_add.len(),
            to_remove = plan.to_remove.len(),
            purge = plan.purge.len(),
            unchanged = plan.unchanged.len(),
        );

        self.apply_additions(&plan, &mut report).await?;
        self.apply_removals(&plan, &mut report).await?;

        info!(
            component = COMPONENT,
            event = "pass_completed",
            subscribed = report.subscribed.len(),
            pending = report.pending.len(),
            unsubscribed = report.unsubscribed.len(),
            purged = report.purged.len(),
            unprocessed_writes = report.unprocessed_writes.len(),
        );
        Ok(report)
    }

    async fn apply_additions(
        &self,
        plan: &ReconciliationPlan,
        report: &mut ReconcileReport,
    ) -> Result<(), ReconcileError> {
        if plan.to_add.is_empty() {
            info!(component = COMPONENT, event = "no_new_functions");
            return Ok(());
        }

        let mut records = Vec::with_capacity(plan.to_add.len());
        for function_name in &plan.to_add {
            let outcome = self.subscriptions.ensure_subscribed(function_name).await?;
            if outcome.subscribed {
                report.subscribed.push(function_name.clone());
            } else {
                report.pending.push(function_name.clone());
            }
            let record = FunctionRecord::new(function_name.clone(), outcome.subscribed);
            records.push(record);
        }

        let outcome = self.store.apply_changes(&records, &[]).await?;
        self.record_unprocessed(&outcome, report).await;
        Ok(())
    }

    async fn apply_removals(
        &self,
        plan: &ReconciliationPlan,
        report: &mut ReconcileReport,
    ) -> Result<(), ReconcileError> {
        if plan.to_remove.is_empty() && plan.purge.is_empty() {
            info!(component = COMPONENT, event = "no_deleted_functions");
            return Ok(());
        }

        for function_name in &plan.to_remove {
            self.subscriptions.ensure_unsubscribed(function_name).await?;
            report.unsubscribed.push(function_name.clone());
        }
        report.purged.extend(plan.purge.iter().cloned());

        let removals: Vec<String> = plan
            .to_remove
            .iter()
            .chain(plan.purge.iter())
            .cloned()
            .collect();
        let outcome = self.store.apply_changes(&[], &removals).await?;
        self.record_unprocessed(&outcome, report).await;
        Ok(())
    }

    // Looks each unprocessed key up so the log shows what the table holds now.
    async fn record_unprocessed(&self, outcome: &BatchWriteOutcome, report: &mut ReconcileReport) {
        for function_name in outcome.unprocessed_names() {
            match self.store.is_tracked(function_name).await {
                Ok(tracked) => warn!(
                    component = COMPONENT,
                    event = "unprocessed_write",
                    function_name,
                    tracked,
                ),
                Err(error) => warn!(
                    component = COMPONENT,
                    event = "unprocessed_write",
                    function_name,
                    lookup_error = %error,
                ),
            }
            report.unprocessed_writes.push(function_name.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use log_subscription_core::error::ServiceError;
    use log_subscription_core::retry::{PollPolicy, RetryPolicy};

    use super::*;
    use crate::adapters::log_service::SubscriptionFilterSpec;
    use crate::test_helpers::{
        InMemoryInventory, InMemoryLogService, InMemoryTrackingTable, LogCall, TableCall,
    };

    const DELIVERY: &str = "LogsToElasticsearch_new-domain";
    const FILTER: &str = "report-forwarder";

    fn delivery_arn() -> String {
        format!("arn:aws:lambda:eu-west-1:123456789012:function:{DELIVERY}")
    }

    fn config() -> ReconcilerConfig {
        ReconcilerConfig {
            table_name: "lambda-subscriptions".to_string(),
            filter_name: FILTER.to_string(),
            delivery_target_arn: delivery_arn(),
            delivery_function_name: DELIVERY.to_string(),
            filter_pattern: "REPORT".to_string(),
            log_group_prefix: "/aws/lambda/".to_string(),
            table_poll: PollPolicy {
                interval: Duration::ZERO,
                max_attempts: 5,
            },
            describe_retry: RetryPolicy::immediate(3),
        }
    }

    fn subscribed_filter(function_name: &str) -> SubscriptionFilterSpec {
        SubscriptionFilterSpec {
            log_group_name: format!("/aws/lambda/{function_name}"),
            filter_name: FILTER.to_string(),
            filter_pattern: "REPORT".to_string(),
            destination_arn: delivery_arn(),
        }
    }

    async fn run(
        inventory: &InMemoryInventory,
        table: &InMemoryTrackingTable,
        logs: &InMemoryLogService,
    ) -> Result<ReconcileReport, ReconcileError> {
        let config = config();
        Reconciler::new(
            &config,
            Collaborators {
                inventory,
                table,
                logs,
            },
        )
        .run("2026-10-16T00:00:00Z")
        .await
    }

    async fn pass(
        inventory: &InMemoryInventory,
        table: &InMemoryTrackingTable,
        logs: &InMemoryLogService,
    ) -> ReconcileReport {
        run(inventory, table, logs)
            .await
            .expect("pass should succeed")
    }

    #[tokio::test]
    async fn adds_new_and_removes_deleted_functions() {
        let inventory = InMemoryInventory::with_functions(&["a", "b", "c"], 2);
        let table = InMemoryTrackingTable::active(&[("b", true), ("c", true), ("d", true)]);
        let logs = InMemoryLogService::with_log_groups(&[
            "/aws/lambda/a",
            "/aws/lambda/b",
            "/aws/lambda/c",
            "/aws/lambda/d",
        ]);
        logs.add_filter(subscribed_filter("d"));

        let report = pass(&inventory, &table, &logs).await;

        assert_eq!(report.subscribed, vec!["a"]);
        assert_eq!(report.unsubscribed, vec!["d"]);
        assert_eq!(report.unchanged_count, 2);
        assert_eq!(report.inventory_count, 3);
        assert_eq!(report.tracked_count, 3);
        assert_eq!(
            table.records().into_iter().collect::<Vec<_>>(),
            vec![
                ("a".to_string(), true),
                ("b".to_string(), true),
                ("c".to_string(), true),
            ]
        );
        assert_eq!(
            logs.filters_on("/aws/lambda/a"),
            vec![subscribed_filter("a")]
        );
        assert!(logs.filters_on("/aws/lambda/d").is_empty());
    }

    #[tokio::test]
    async fn first_run_creates_table_once_before_scanning() {
        let inventory = InMemoryInventory::with_functions(&["orders", "billing"], 10);
        let table = InMemoryTrackingTable::missing().creating_for(1);
        let logs = InMemoryLogService::with_log_groups(&["/aws/lambda/orders"]);

        let report = pass(&inventory, &table, &logs).await;

        assert!(report.table_created);
        let calls = table.calls();
        let creates: Vec<usize> = calls
            .iter()
            .enumerate()
            .filter(|(_, call)| matches!(call, TableCall::Create(_)))
            .map(|(index, _)| index)
            .collect();
        let first_scan = calls
            .iter()
            .position(|call| matches!(call, TableCall::Scan(_)))
            .expect("table should be scanned");
        assert_eq!(creates.len(), 1);
        assert!(creates[0] < first_scan);

        assert_eq!(report.subscribed, vec!["orders"]);
        assert_eq!(report.pending, vec!["billing"]);
        assert_eq!(table.records().get("billing"), Some(&false));
        assert_eq!(table.records().get("orders"), Some(&true));
    }

    #[tokio::test]
    async fn delivery_function_is_never_subscribed_or_persisted() {
        let inventory = InMemoryInventory::with_functions(&["orders", DELIVERY], 10);
        let table = InMemoryTrackingTable::active(&[]);
        let logs = InMemoryLogService::with_log_groups(&[
            "/aws/lambda/orders",
            "/aws/lambda/LogsToElasticsearch_new-domain",
        ]);

        pass(&inventory, &table, &logs).await;

        assert!(!table.records().contains_key(DELIVERY));
        assert!(logs
            .filters_on("/aws/lambda/LogsToElasticsearch_new-domain")
            .is_empty());
        assert!(!logs
            .calls()
            .contains(&LogCall::DescribeGroups(format!("/aws/lambda/{DELIVERY}"))));
    }

    #[tokio::test]
    async fn leftover_delivery_record_is_purged_without_unsubscribing() {
        let inventory = InMemoryInventory::with_functions(&["orders", DELIVERY], 10);
        let table = InMemoryTrackingTable::active(&[("orders", true), (DELIVERY, true)]);
        let logs = InMemoryLogService::with_log_groups(&["/aws/lambda/orders"]);

        let report = pass(&inventory, &table, &logs).await;

        assert_eq!(report.purged, vec![DELIVERY]);
        assert!(report.unsubscribed.is_empty());
        assert!(logs.calls().is_empty());
        assert!(!table.records().contains_key(DELIVERY));
    }

    #[tokio::test]
    async fn partial_write_is_reported_and_pass_completes() {
        let inventory = InMemoryInventory::with_functions(&["orders", "billing"], 10);
        let table = InMemoryTrackingTable::active(&[]);
        table.leave_unprocessed_once("billing");
        let logs = InMemoryLogService::with_log_groups(&["/aws/lambda/orders"]);
        logs.add_log_group("/aws/lambda/billing");

        let report = pass(&inventory, &table, &logs).await;

        assert_eq!(report.unprocessed_writes, vec!["billing"]);
        assert_eq!(table.records().len(), 1);
        let calls = table.calls();
        assert!(calls.contains(&TableCall::Get("billing".to_string())));

        // The next pass picks the missing record up again.
        let report = pass(&inventory, &table, &logs).await;
        assert_eq!(report.subscribed, vec!["billing"]);
        assert!(report.unprocessed_writes.is_empty());
        assert_eq!(logs.put_count(), 2);
    }

    #[tokio::test]
    async fn steady_state_writes_nothing() {
        let inventory = InMemoryInventory::with_functions(&["orders"], 10);
        let table = InMemoryTrackingTable::active(&[("orders", true)]);
        let logs = InMemoryLogService::with_log_groups(&["/aws/lambda/orders"]);

        let report = pass(&inventory, &table, &logs).await;

        assert!(report.is_noop());
        assert_eq!(table.batch_write_count(), 0);
        assert!(logs.calls().is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_stops_before_any_write() {
        let inventory = InMemoryInventory::with_functions(&["orders"], 10);
        let table = InMemoryTrackingTable::active(&[]);
        let logs = InMemoryLogService::with_log_groups(&["/aws/lambda/orders"]);
        let outage = ServiceError::Transient("ServiceUnavailableException".to_string());
        logs.fail_with(outage);

        let error = run(&inventory, &table, &logs)
            .await
            .expect_err("pass should fail");

        assert_eq!(error.as_label(), "upstream_unavailable");
        assert_eq!(table.batch_write_count(), 0);
    }
}
