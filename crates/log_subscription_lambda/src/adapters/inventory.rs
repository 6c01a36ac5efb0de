use async_trait::async_trait;
use log_subscription_core::error::ServiceError;

/// One page of a function listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionPage {
    pub function_names: Vec<String>,
    pub next_marker: Option<String>,
}

#[async_trait]
pub trait FunctionInventory: Send + Sync {
    async fn list_functions_page(
        &self,
        marker: Option<String>,
    ) -> Result<FunctionPage, ServiceError>;
}
