use std::time::Duration;

use log_subscription_core::config::ReconcilerConfig;
use log_subscription_core::contract::ReconcileReport;
use log_subscription_core::retry::{PollPolicy, RetryPolicy};
use log_subscription_lambda::reconciler::{Collaborators, Reconciler};
use log_subscription_lambda::test_helpers::{
    InMemoryInventory, InMemoryLogService, InMemoryTrackingTable,
};

const DELIVERY: &str = "LogsToElasticsearch_new-domain";
const FILTER: &str = "report-forwarder";

fn delivery_arn() -> String {
    format!("arn:aws:lambda:eu-west-1:123456789012:function:{DELIVERY}")
}

struct World {
    inventory: InMemoryInventory,
    table: InMemoryTrackingTable,
    logs: InMemoryLogService,
    config: ReconcilerConfig,
}

impl World {
    fn first_run(functions: &[&str], log_groups: &[&str]) -> Self {
        Self {
            inventory: InMemoryInventory::with_functions(functions, 2),
            table: InMemoryTrackingTable::missing()
                .creating_for(2)
                .with_page_size(2),
            logs: InMemoryLogService::with_log_groups(log_groups),
            config: ReconcilerConfig {
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
            },
        }
    }

    async fn pass(&self) -> ReconcileReport {
        Reconciler::new(
            &self.config,
            Collaborators {
                inventory: &self.inventory,
                table: &self.table,
                logs: &self.logs,
            },
        )
        .run("2026-10-16T00:00:00Z")
        .await
        .expect("pass should succeed")
    }

    fn records(&self) -> Vec<(String, bool)> {
        self.table.records().into_iter().collect()
    }

    fn is_subscribed(&self, function_name: &str) -> bool {
        self.logs
            .filters_on(&format!("/aws/lambda/{function_name}"))
            .iter()
            .any(|filter| filter.filter_name == FILTER)
    }
}

fn row(name: &str, subscribed: bool) -> (String, bool) {
    (name.to_string(), subscribed)
}

#[tokio::test]
async fn converges_across_scheduled_passes() {
    let world = World::first_run(
        &["orders", "billing", "search", DELIVERY],
        &[
            "/aws/lambda/orders",
            "/aws/lambda/search",
            "/aws/lambda/LogsToElasticsearch_new-domain",
        ],
    );

    // First run: table is created, functions with log groups are subscribed.
    let report = world.pass().await;
    assert!(report.table_created);
    assert_eq!(report.subscribed, vec!["orders", "search"]);
    assert_eq!(report.pending, vec!["billing"]);
    assert_eq!(
        world.records(),
        vec![
            row("billing", false),
            row("orders", true),
            row("search", true),
        ]
    );
    assert!(!world.is_subscribed(DELIVERY));
    assert_eq!(world.table.create_count(), 1);

    // The pending function gets a log group after its first invocation.
    world.logs.add_log_group("/aws/lambda/billing");
    let report = world.pass().await;
    assert!(!report.table_created);
    assert_eq!(report.subscribed, vec!["billing"]);
    assert_eq!(report.unchanged_count, 2);
    assert!(world.is_subscribed("billing"));
    assert_eq!(world.records()[0], row("billing", true));

    // Nothing changed: nothing is written.
    let writes_before = world.table.batch_write_count();
    let report = world.pass().await;
    assert!(report.is_noop());
    assert_eq!(world.table.batch_write_count(), writes_before);

    // A deleted function loses its filter and its record.
    world
        .inventory
        .set_functions(&["billing", "search", DELIVERY], 2);
    let report = world.pass().await;
    assert_eq!(report.unsubscribed, vec!["orders"]);
    assert!(!world.is_subscribed("orders"));
    assert_eq!(
        world.records(),
        vec![row("billing", true), row("search", true)]
    );
    assert_eq!(world.logs.put_count(), 3);
}

#[tokio::test]
async fn pending_record_of_deleted_function_is_purged() {
    let world = World::first_run(&["orders", "nightly-export"], &["/aws/lambda/orders"]);

    world.pass().await;
    assert_eq!(
        world.records(),
        vec![row("nightly-export", false), row("orders", true)]
    );

    world.inventory.set_functions(&["orders"], 2);
    let report = world.pass().await;

    assert_eq!(report.purged, vec!["nightly-export"]);
    assert!(report.unsubscribed.is_empty());
    assert_eq!(world.records(), vec![row("orders", true)]);
    assert_eq!(world.logs.delete_count(), 0);
}

#[tokio::test]
async fn function_deleted_with_its_log_group_is_still_untracked() {
    let world = World::first_run(
        &["orders", "billing"],
        &["/aws/lambda/orders", "/aws/lambda/billing"],
    );
    world.pass().await;

    world.inventory.set_functions(&["orders"], 2);
    world.logs.remove_log_group("/aws/lambda/billing");
    let report = world.pass().await;

    assert_eq!(report.unsubscribed, vec!["billing"]);
    assert_eq!(world.records(), vec![row("orders", true)]);
}

#[tokio::test]
async fn large_inventory_is_paged_and_written_in_chunks() {
    let names: Vec<String> = (0..60).map(|index| format!("fn-{index:03}")).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let groups: Vec<String> = names
        .iter()
        .map(|name| format!("/aws/lambda/{name}"))
        .collect();
    let group_refs: Vec<&str> = groups.iter().map(String::as_str).collect();
    let world = World::first_run(&name_refs, &group_refs);

    let report = world.pass().await;

    assert_eq!(report.inventory_count, 60);
    assert_eq!(report.subscribed.len(), 60);
    assert_eq!(world.records().len(), 60);
    assert_eq!(world.inventory.markers_seen().len(), 30);

    let report = world.pass().await;
    assert!(report.is_noop());
    assert_eq!(report.tracked_count, 60);
}
