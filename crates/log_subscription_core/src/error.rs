//! Error types for collaborator calls and reconciliation passes.
//!
//! - [`ServiceError`]: a single failed request to the inventory service, the
//!   tracking table or the log service, already classified by the adapter.
//! - [`ReconcileError`]: why an invocation failed as a whole.
//!
//! Missing tables and unprocessed batch items are not errors; they surface
//! as `TableStatus::Missing` and `BatchWriteOutcome` values.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Throttling, 5xx, timeouts and connection failures.
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("resource in use: {0}")]
    ResourceInUse(String),

    #[error("request failed: {0}")]
    Fatal(String),
}

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound(_))
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Transient(_) => "transient",
            ServiceError::ResourceInUse(_) => "resource_in_use",
            ServiceError::Fatal(_) => "fatal",
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("{service} unavailable: {source}")]
    UpstreamUnavailable {
        service: &'static str,
        #[source]
        source: ServiceError,
    },

    #[error("table {table} not active after {attempts} polls")]
    StoreCreationTimeout { table: String, attempts: u32 },

    #[error("describe of table {table} failed after {attempts} attempts: {source}")]
    StoreUnavailable {
        table: String,
        attempts: u32,
        #[source]
        source: ServiceError,
    },

    #[error("tracking table {operation} failed: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: ServiceError,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ReconcileError {
    pub fn upstream(service: &'static str, source: ServiceError) -> Self {
        ReconcileError::UpstreamUnavailable { service, source }
    }

    pub fn store(operation: &'static str, source: ServiceError) -> Self {
        ReconcileError::Store { operation, source }
    }

    /// Stable snake_case label for log fields.
    pub fn as_label(&self) -> &'static str {
        match self {
            ReconcileError::UpstreamUnavailable { .. } => "upstream_unavailable",
            ReconcileError::StoreCreationTimeout { .. } => "store_creation_timeout",
            ReconcileError::StoreUnavailable { .. } => "store_unavailable",
            ReconcileError::Store { .. } => "store_error",
            ReconcileError::Config(_) => "config_error",
        }
    }
}
