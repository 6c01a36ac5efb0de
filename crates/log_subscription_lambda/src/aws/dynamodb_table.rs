use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, DeleteRequest, KeySchemaElement, KeyType,
    ProvisionedThroughput, PutRequest, ScalarAttributeType, Select,
    TableStatus as DynamoTableStatus, WriteRequest as DynamoWriteRequest,
};
use log_subscription_core::contract::{
    FunctionRecord, WriteRequest, FUNCTION_NAME_ATTRIBUTE, SUBSCRIPTION_ATTRIBUTE,
};
use log_subscription_core::error::ServiceError;
use tracing::warn;

use super::classify_sdk_error;
use crate::adapters::tracking_table::{ScanPage, TableSpec, TableStatus, TrackingTable};

const PROJECTION: &str = "#name, #subscription";

type Item = HashMap<String, AttributeValue>;

#[derive(Clone)]
pub struct DynamoTrackingTable {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
}

impl DynamoTrackingTable {
    pub fn new(client: aws_sdk_dynamodb::Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }
}

#[async_trait]
impl TrackingTable for DynamoTrackingTable {
    async fn describe_table(&self) -> Result<TableStatus, ServiceError> {
        match self
            .client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
        {
            Ok(output) => Ok(output
                .table()
                .and_then(|table| table.table_status())
                .map(table_status)
                .unwrap_or_else(|| TableStatus::Other("UNKNOWN".to_string()))),
            Err(error) => match classify_sdk_error(error) {
                ServiceError::NotFound(_) => Ok(TableStatus::Missing),
                other => Err(other),
            },
        }
    }

    async fn create_table(&self, spec: &TableSpec) -> Result<TableStatus, ServiceError> {
        let attribute = AttributeDefinition::builder()
            .attribute_name(&spec.key_attribute)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(build_error)?;
        let key = KeySchemaElement::builder()
            .attribute_name(&spec.key_attribute)
            .key_type(KeyType::Hash)
            .build()
            .map_err(build_error)?;
        let throughput = ProvisionedThroughput::builder()
            .read_capacity_units(spec.read_capacity_units)
            .write_capacity_units(spec.write_capacity_units)
            .build()
            .map_err(build_error)?;

        let output = self
            .client
            .create_table()
            .table_name(&spec.table_name)
            .attribute_definitions(attribute)
            .key_schema(key)
            .billing_mode(BillingMode::Provisioned)
            .provisioned_throughput(throughput)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        Ok(output
            .table_description()
            .and_then(|table| table.table_status())
            .map(table_status)
            .unwrap_or(TableStatus::Creating))
    }

    async fn scan_page(
        &self,
        exclusive_start_key: Option<String>,
    ) -> Result<ScanPage, ServiceError> {
        let output = self
            .client
            .scan()
            .table_name(&self.table_name)
            .select(Select::SpecificAttributes)
            .projection_expression(PROJECTION)
            .expression_attribute_names("#name", FUNCTION_NAME_ATTRIBUTE)
            .expression_attribute_names("#subscription", SUBSCRIPTION_ATTRIBUTE)
            .set_exclusive_start_key(exclusive_start_key.map(|name| key_for(&name)))
            .send()
            .await
            .map_err(classify_sdk_error)?;

        let mut records = Vec::with_capacity(output.items().len());
        for item in output.items() {
            match record_from_item(item) {
                Some(record) => records.push(record),
                None => warn!(
                    component = "dynamodb_table",
                    event = "malformed_item",
                    table = %self.table_name,
                ),
            }
        }

        Ok(ScanPage {
            records,
            last_evaluated_key: output
                .last_evaluated_key()
                .and_then(|key| key.get(FUNCTION_NAME_ATTRIBUTE))
                .and_then(|value| value.as_s().ok())
                .cloned(),
        })
    }

    async fn get_record(
        &self,
        function_name: &str,
    ) -> Result<Option<FunctionRecord>, ServiceError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key_for(function_name)))
            .projection_expression(PROJECTION)
            .expression_attribute_names("#name", FUNCTION_NAME_ATTRIBUTE)
            .expression_attribute_names("#subscription", SUBSCRIPTION_ATTRIBUTE)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        Ok(output.item().and_then(record_from_item))
    }

    async fn batch_write(
        &self,
        requests: &[WriteRequest],
    ) -> Result<Vec<WriteRequest>, ServiceError> {
        let mut items = Vec::with_capacity(requests.len());
        for request in requests {
            items.push(to_dynamo_request(request)?);
        }

        let output = self
            .client
            .batch_write_item()
            .request_items(&self.table_name, items)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        Ok(output
            .unprocessed_items()
            .and_then(|tables| tables.get(&self.table_name))
            .map(|pending| pending.iter().filter_map(from_dynamo_request).collect())
            .unwrap_or_default())
    }
}

fn table_status(status: &DynamoTableStatus) -> TableStatus {
    match status {
        DynamoTableStatus::Active => TableStatus::Active,
        DynamoTableStatus::Creating => TableStatus::Creating,
        other => TableStatus::Other(other.as_str().to_string()),
    }
}

fn key_for(function_name: &str) -> Item {
    HashMap::from([(
        FUNCTION_NAME_ATTRIBUTE.to_string(),
        AttributeValue::S(function_name.to_string()),
    )])
}

fn item_for(record: &FunctionRecord) -> Item {
    let mut item = key_for(&record.function_name);
    item.insert(
        SUBSCRIPTION_ATTRIBUTE.to_string(),
        AttributeValue::Bool(record.has_subscription),
    );
    item
}

// Items written before the flag existed read as pending.
fn record_from_item(item: &Item) -> Option<FunctionRecord> {
    let name = item.get(FUNCTION_NAME_ATTRIBUTE)?.as_s().ok()?;
    let subscribed = item
        .get(SUBSCRIPTION_ATTRIBUTE)
        .and_then(|value| value.as_bool().ok())
        .copied()
        .unwrap_or(false);
    Some(FunctionRecord::new(name.clone(), subscribed))
}

fn to_dynamo_request(request: &WriteRequest) -> Result<DynamoWriteRequest, ServiceError> {
    let builder = DynamoWriteRequest::builder();
    let builder = match request {
        WriteRequest::Put(record) => builder.put_request(
            PutRequest::builder()
                .set_item(Some(item_for(record)))
                .build()
                .map_err(build_error)?,
        ),
        WriteRequest::Delete(function_name) => builder.delete_request(
            DeleteRequest::builder()
                .set_key(Some(key_for(function_name)))
                .build()
                .map_err(build_error)?,
        ),
    };
    Ok(builder.build())
}

fn from_dynamo_request(request: &DynamoWriteRequest) -> Option<WriteRequest> {
    if let Some(put) = request.put_request() {
        return record_from_item(put.item()).map(WriteRequest::Put);
    }
    request
        .delete_request()
        .and_then(|delete| delete.key().get(FUNCTION_NAME_ATTRIBUTE))
        .and_then(|value| value.as_s().ok())
        .map(|name| WriteRequest::Delete(name.clone()))
}

fn build_error(error: aws_sdk_dynamodb::error::BuildError) -> ServiceError {
    ServiceError::Fatal(format!("invalid dynamodb request: {error}"))
}
