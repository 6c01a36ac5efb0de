use async_trait::async_trait;
use log_subscription_core::contract::{
    FunctionRecord, WriteRequest, FUNCTION_NAME_ATTRIBUTE, TABLE_READ_CAPACITY_UNITS,
    TABLE_WRITE_CAPACITY_UNITS,
};
use log_subscription_core::error::ServiceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableStatus {
    Missing,
    Creating,
    Active,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub table_name: String,
    pub key_attribute: String,
    pub read_capacity_units: i64,
    pub write_capacity_units: i64,
}

impl TableSpec {
    pub fn for_table(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            key_attribute: FUNCTION_NAME_ATTRIBUTE.to_string(),
            read_capacity_units: TABLE_READ_CAPACITY_UNITS,
            write_capacity_units: TABLE_WRITE_CAPACITY_UNITS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    pub records: Vec<FunctionRecord>,
    /// Hash key of the last item read; `None` once the scan is complete.
    pub last_evaluated_key: Option<String>,
}

/// Request/response surface of the tracking table.
#[async_trait]
pub trait TrackingTable: Send + Sync {
    async fn describe_table(&self) -> Result<TableStatus, ServiceError>;

    async fn create_table(&self, spec: &TableSpec) -> Result<TableStatus, ServiceError>;

    async fn scan_page(
        &self,
        exclusive_start_key: Option<String>,
    ) -> Result<ScanPage, ServiceError>;

    async fn get_record(&self, function_name: &str) -> Result<Option<FunctionRecord>, ServiceError>;

    /// Sends one batch and returns the requests the table did not process.
    async fn batch_write(
        &self,
        requests: &[WriteRequest],
    ) -> Result<Vec<WriteRequest>, ServiceError>;
}
