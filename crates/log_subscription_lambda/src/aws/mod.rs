//! AWS SDK implementations of the collaborator traits.

pub mod cloudwatch_logs;
pub mod dynamodb_table;
pub mod lambda_inventory;

use aws_sdk_dynamodb::config::http::HttpResponse;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use log_subscription_core::error::ServiceError;

const NOT_FOUND_CODES: &[&str] = &["ResourceNotFoundException"];
const IN_USE_CODES: &[&str] = &["ResourceInUseException"];
const TRANSIENT_CODES: &[&str] = &[
    "ThrottlingException",
    "Throttling",
    "TooManyRequestsException",
    "ProvisionedThroughputExceededException",
    "RequestLimitExceeded",
    "ServiceUnavailableException",
    "ServiceUnavailable",
    "InternalServerError",
    "InternalFailure",
    "ServiceException",
    "OperationAbortedException",
];

/// Maps any SDK failure onto the collaborator error taxonomy.
pub(crate) fn classify_sdk_error<E>(error: SdkError<E, HttpResponse>) -> ServiceError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&error).to_string();
    match &error {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            ServiceError::Transient(message)
        }
        SdkError::ServiceError(context) => classify_service_code(
            context.err().code(),
            context.raw().status().is_server_error(),
            message,
        ),
        _ => ServiceError::Fatal(message),
    }
}

pub(crate) fn classify_service_code(
    code: Option<&str>,
    server_error: bool,
    message: String,
) -> ServiceError {
    match code {
        Some(code) if NOT_FOUND_CODES.contains(&code) => ServiceError::NotFound(message),
        Some(code) if IN_USE_CODES.contains(&code) => ServiceError::ResourceInUse(message),
        Some(code) if TRANSIENT_CODES.contains(&code) => ServiceError::Transient(message),
        _ if server_error => ServiceError::Transient(message),
        _ => ServiceError::Fatal(message),
    }
}
