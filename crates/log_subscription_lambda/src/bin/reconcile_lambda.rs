use lambda_runtime::{service_fn, Error, LambdaEvent};
use log_subscription_core::config::ReconcilerConfig;
use log_subscription_lambda::aws::cloudwatch_logs::CloudWatchLogService;
use log_subscription_lambda::aws::dynamodb_table::DynamoTrackingTable;
use log_subscription_lambda::aws::lambda_inventory::LambdaFunctionInventory;
use log_subscription_lambda::handlers::scheduled::handle_scheduled_event;
use log_subscription_lambda::reconciler::Collaborators;
use log_subscription_lambda::telemetry::init_tracing;
use serde_json::Value;

struct RuntimeDependencies {
    inventory: LambdaFunctionInventory,
    table: DynamoTrackingTable,
    logs: CloudWatchLogService,
}

impl RuntimeDependencies {
    async fn load(config: &ReconcilerConfig) -> Self {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self {
            inventory: LambdaFunctionInventory::new(aws_sdk_lambda::Client::new(&aws_config)),
            table: DynamoTrackingTable::new(
                aws_sdk_dynamodb::Client::new(&aws_config),
                config.table_name.clone(),
            ),
            logs: CloudWatchLogService::new(aws_sdk_cloudwatchlogs::Client::new(&aws_config)),
        }
    }

    fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            inventory: &self.inventory,
            table: &self.table,
            logs: &self.logs,
        }
    }
}

async fn handle_request(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let config = ReconcilerConfig::from_env()?;
    let deps = RuntimeDependencies::load(&config).await;

    let report = handle_scheduled_event(&event.payload, &config, deps.collaborators()).await?;
    serde_json::to_value(report)
        .map_err(|error| Error::from(format!("failed to serialize reconcile report: {error}")))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();
    lambda_runtime::run(service_fn(handle_request)).await
}
