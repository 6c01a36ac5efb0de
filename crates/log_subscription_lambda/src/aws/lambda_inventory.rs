use async_trait::async_trait;
use log_subscription_core::error::ServiceError;

use super::classify_sdk_error;
use crate::adapters::inventory::{FunctionInventory, FunctionPage};

/// Lists functions with `ListFunctions`. The SDK's own retry layer absorbs
/// short throttling bursts before an error reaches this adapter.
#[derive(Clone)]
pub struct LambdaFunctionInventory {
    client: aws_sdk_lambda::Client,
}

impl LambdaFunctionInventory {
    pub fn new(client: aws_sdk_lambda::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FunctionInventory for LambdaFunctionInventory {
    async fn list_functions_page(
        &self,
        marker: Option<String>,
    ) -> Result<FunctionPage, ServiceError> {
        let output = self
            .client
            .list_functions()
            .set_marker(marker)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        Ok(FunctionPage {
            function_names: output
                .functions()
                .iter()
                .filter_map(|function| function.function_name())
                .map(str::to_string)
                .collect(),
            next_marker: output.next_marker().map(str::to_string),
        })
    }
}
