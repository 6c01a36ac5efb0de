//! In-memory collaborators for exercising reconciliation passes without AWS.
//!
//! Each fake records the calls it receives behind a `Mutex` so tests can
//! assert on ordering and counts after a pass. Compiled for unit tests and
//! behind the `test-helpers` feature, which only dev-dependencies enable.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::ops::Bound;
use std::sync::Mutex;

use async_trait::async_trait;
use log_subscription_core::contract::{FunctionRecord, WriteRequest, MAX_BATCH_WRITE_ITEMS};
use log_subscription_core::error::ServiceError;

use crate::adapters::inventory::{FunctionInventory, FunctionPage};
use crate::adapters::log_service::{LogService, SubscriptionFilterSpec};
use crate::adapters::tracking_table::{ScanPage, TableSpec, TableStatus, TrackingTable};

// ── inventory ──────────────────────────────────────────────────────

#[derive(Default)]
struct InventoryState {
    pages: Vec<FunctionPage>,
    markers_seen: Vec<Option<String>>,
    failure: Option<ServiceError>,
}

#[derive(Default)]
pub struct InMemoryInventory {
    state: Mutex<InventoryState>,
}

impl InMemoryInventory {
    /// Serves `pages` in order; each page's `next_marker` selects the next.
    pub fn from_pages(pages: Vec<FunctionPage>) -> Self {
        Self {
            state: Mutex::new(InventoryState {
                pages,
                ..InventoryState::default()
            }),
        }
    }

    pub fn with_functions(names: &[&str], page_size: usize) -> Self {
        let inventory = Self::default();
        inventory.set_functions(names, page_size);
        inventory
    }

    pub fn set_functions(&self, names: &[&str], page_size: usize) {
        let chunks: Vec<&[&str]> = names.chunks(page_size.max(1)).collect();
        let page_count = chunks.len();
        let pages = chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| FunctionPage {
                function_names: chunk.iter().map(|name| name.to_string()).collect(),
                next_marker: (index + 1 < page_count).then(|| format!("marker-{}", index + 1)),
            })
            .collect();
        self.lock().pages = pages;
    }

    pub fn fail_with(&self, error: ServiceError) {
        self.lock().failure = Some(error);
    }

    pub fn markers_seen(&self) -> Vec<Option<String>> {
        self.lock().markers_seen.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InventoryState> {
        self.state.lock().expect("poisoned mutex")
    }
}

#[async_trait]
impl FunctionInventory for InMemoryInventory {
    async fn list_functions_page(
        &self,
        marker: Option<String>,
    ) -> Result<FunctionPage, ServiceError> {
        let mut state = self.lock();
        state.markers_seen.push(marker.clone());
        if let Some(error) = state.failure.clone() {
            return Err(error);
        }

        let index = match &marker {
            None => 0,
            Some(marker) => state
                .pages
                .iter()
                .position(|page| page.next_marker.as_ref() == Some(marker))
                .map(|previous| previous + 1)
                .ok_or_else(|| ServiceError::Fatal(format!("unknown marker {marker}")))?,
        };

        Ok(state.pages.get(index).cloned().unwrap_or_default())
    }
}

// ── tracking table ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableCall {
    Describe,
    Create(TableSpec),
    Scan(Option<String>),
    Get(String),
    BatchWrite(Vec<WriteRequest>),
}

struct TableState {
    exists: bool,
    created_concurrently: bool,
    creating_polls_remaining: u32,
    creating_polls_after_create: u32,
    rows: BTreeMap<String, bool>,
    page_size: usize,
    describe_failures: VecDeque<ServiceError>,
    unprocessed_once: BTreeSet<String>,
    calls: Vec<TableCall>,
}

pub struct InMemoryTrackingTable {
    state: Mutex<TableState>,
}

impl InMemoryTrackingTable {
    /// A table that does not exist yet.
    pub fn missing() -> Self {
        Self {
            state: Mutex::new(TableState {
                exists: false,
                created_concurrently: false,
                creating_polls_remaining: 0,
                creating_polls_after_create: 0,
                rows: BTreeMap::new(),
                page_size: 100,
                describe_failures: VecDeque::new(),
                unprocessed_once: BTreeSet::new(),
                calls: Vec::new(),
            }),
        }
    }

    pub fn active(records: &[(&str, bool)]) -> Self {
        let table = Self::missing();
        {
            let mut state = table.lock();
            state.exists = true;
            state.rows = records
                .iter()
                .map(|(name, subscribed)| (name.to_string(), *subscribed))
                .collect();
        }
        table
    }

    /// An empty table still `CREATING` for the next `polls` describes.
    pub fn creating(polls: u32) -> Self {
        let table = Self::missing();
        {
            let mut state = table.lock();
            state.exists = true;
            state.creating_polls_remaining = polls;
        }
        table
    }

    /// Create answers `ResourceInUse` as if another pass created the table
    /// first; the table then exists and honours `creating_for`.
    pub fn created_concurrently(self) -> Self {
        self.lock().created_concurrently = true;
        self
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        self.lock().page_size = page_size.max(1);
        self
    }

    /// Number of describes answering `CREATING` after a create call.
    pub fn creating_for(self, polls: u32) -> Self {
        self.lock().creating_polls_after_create = polls;
        self
    }

    pub fn fail_describe(&self, errors: impl IntoIterator<Item = ServiceError>) {
        self.lock().describe_failures.extend(errors);
    }

    /// The next write touching `function_name` comes back unprocessed.
    pub fn leave_unprocessed_once(&self, function_name: &str) {
        self.lock()
            .unprocessed_once
            .insert(function_name.to_string());
    }

    pub fn records(&self) -> BTreeMap<String, bool> {
        self.lock().rows.clone()
    }

    pub fn calls(&self) -> Vec<TableCall> {
        self.lock().calls.clone()
    }

    pub fn count_calls(&self, predicate: impl Fn(&TableCall) -> bool) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| predicate(call))
            .count()
    }

    pub fn describe_count(&self) -> usize {
        self.count_calls(|call| *call == TableCall::Describe)
    }

    pub fn create_count(&self) -> usize {
        self.count_calls(|call| matches!(call, TableCall::Create(_)))
    }

    pub fn batch_write_count(&self) -> usize {
        self.count_calls(|call| matches!(call, TableCall::BatchWrite(_)))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TableState> {
        self.state.lock().expect("poisoned mutex")
    }
}

#[async_trait]
impl TrackingTable for InMemoryTrackingTable {
    async fn describe_table(&self) -> Result<TableStatus, ServiceError> {
        let mut state = self.lock();
        state.calls.push(TableCall::Describe);
        if let Some(error) = state.describe_failures.pop_front() {
            return Err(error);
        }
        if !state.exists {
            return Ok(TableStatus::Missing);
        }
        if state.creating_polls_remaining > 0 {
            state.creating_polls_remaining -= 1;
            return Ok(TableStatus::Creating);
        }
        Ok(TableStatus::Active)
    }

    async fn create_table(&self, spec: &TableSpec) -> Result<TableStatus, ServiceError> {
        let mut state = self.lock();
        state.calls.push(TableCall::Create(spec.clone()));
        if state.exists {
            return Err(ServiceError::ResourceInUse(spec.table_name.clone()));
        }
        state.exists = true;
        state.creating_polls_remaining = state.creating_polls_after_create;
        if state.created_concurrently {
            return Err(ServiceError::ResourceInUse(spec.table_name.clone()));
        }
        Ok(TableStatus::Creating)
    }

    async fn scan_page(
        &self,
        exclusive_start_key: Option<String>,
    ) -> Result<ScanPage, ServiceError> {
        let mut state = self.lock();
        state
            .calls
            .push(TableCall::Scan(exclusive_start_key.clone()));
        if !state.exists {
            return Err(ServiceError::NotFound("table".to_string()));
        }

        let lower = match &exclusive_start_key {
            Some(key) => Bound::Excluded(key.clone()),
            None => Bound::Unbounded,
        };
        let remaining: Vec<(String, bool)> = state
            .rows
            .range((lower, Bound::Unbounded))
            .map(|(name, subscribed)| (name.clone(), *subscribed))
            .collect();
        let page: Vec<(String, bool)> = remaining.iter().take(state.page_size).cloned().collect();
        let last_evaluated_key = if remaining.len() > page.len() {
            page.last().map(|(name, _)| name.clone())
        } else {
            None
        };

        Ok(ScanPage {
            records: page
                .into_iter()
                .map(|(name, subscribed)| FunctionRecord::new(name, subscribed))
                .collect(),
            last_evaluated_key,
        })
    }

    async fn get_record(
        &self,
        function_name: &str,
    ) -> Result<Option<FunctionRecord>, ServiceError> {
        let mut state = self.lock();
        state.calls.push(TableCall::Get(function_name.to_string()));
        if !state.exists {
            return Err(ServiceError::NotFound("table".to_string()));
        }
        Ok(state
            .rows
            .get(function_name)
            .map(|subscribed| FunctionRecord::new(function_name, *subscribed)))
    }

    async fn batch_write(
        &self,
        requests: &[WriteRequest],
    ) -> Result<Vec<WriteRequest>, ServiceError> {
        let mut state = self.lock();
        state.calls.push(TableCall::BatchWrite(requests.to_vec()));
        if !state.exists {
            return Err(ServiceError::NotFound("table".to_string()));
        }
        if requests.len() > MAX_BATCH_WRITE_ITEMS {
            return Err(ServiceError::Fatal(format!(
                "batch of {} exceeds {MAX_BATCH_WRITE_ITEMS} requests",
                requests.len()
            )));
        }

        let mut unprocessed = Vec::new();
        for request in requests {
            if state.unprocessed_once.remove(request.function_name()) {
                unprocessed.push(request.clone());
                continue;
            }
            match request {
                WriteRequest::Put(record) => {
                    state
                        .rows
                        .insert(record.function_name.clone(), record.has_subscription);
                }
                WriteRequest::Delete(name) => {
                    state.rows.remove(name);
                }
            }
        }
        Ok(unprocessed)
    }
}

// ── log service ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogCall {
    DescribeGroups(String),
    DescribeFilters(String),
    Put(SubscriptionFilterSpec),
    Delete(String, String),
}

/// Log-service operations that can be made to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOperation {
    DescribeFilters,
    Put,
    Delete,
}

#[derive(Default)]
struct LogState {
    filters: BTreeMap<String, BTreeMap<String, SubscriptionFilterSpec>>,
    calls: Vec<LogCall>,
    failure: Option<ServiceError>,
    fail_once: Vec<(LogOperation, ServiceError)>,
}

impl LogState {
    fn take_failure(&mut self, operation: LogOperation) -> Option<ServiceError> {
        let index = self
            .fail_once
            .iter()
            .position(|(pending, _)| *pending == operation)?;
        Some(self.fail_once.remove(index).1)
    }
}

#[derive(Default)]
pub struct InMemoryLogService {
    state: Mutex<LogState>,
}

impl InMemoryLogService {
    pub fn with_log_groups(groups: &[&str]) -> Self {
        let service = Self::default();
        for group in groups {
            service.add_log_group(group);
        }
        service
    }

    pub fn add_log_group(&self, group: &str) {
        self.lock().filters.entry(group.to_string()).or_default();
    }

    pub fn remove_log_group(&self, group: &str) {
        self.lock().filters.remove(group);
    }

    pub fn add_filter(&self, spec: SubscriptionFilterSpec) {
        self.lock()
            .filters
            .entry(spec.log_group_name.clone())
            .or_default()
            .insert(spec.filter_name.clone(), spec);
    }

    pub fn filters_on(&self, group: &str) -> Vec<SubscriptionFilterSpec> {
        self.lock()
            .filters
            .get(group)
            .map(|filters| filters.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn fail_with(&self, error: ServiceError) {
        self.lock().failure = Some(error);
    }

    /// The next call of `operation` returns `error`; later calls behave normally.
    pub fn fail_once(&self, operation: LogOperation, error: ServiceError) {
        self.lock().fail_once.push((operation, error));
    }

    pub fn calls(&self) -> Vec<LogCall> {
        self.lock().calls.clone()
    }

    pub fn put_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, LogCall::Put(_)))
            .count()
    }

    pub fn delete_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, LogCall::Delete(..)))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogState> {
        self.state.lock().expect("poisoned mutex")
    }
}

#[async_trait]
impl LogService for InMemoryLogService {
    async fn describe_log_groups(&self, prefix: &str) -> Result<Vec<String>, ServiceError> {
        let mut state = self.lock();
        state
            .calls
            .push(LogCall::DescribeGroups(prefix.to_string()));
        if let Some(error) = state.failure.clone() {
            return Err(error);
        }
        Ok(state
            .filters
            .keys()
            .filter(|group| group.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn describe_subscription_filters(
        &self,
        log_group_name: &str,
        filter_name_prefix: &str,
    ) -> Result<Vec<String>, ServiceError> {
        let mut state = self.lock();
        state
            .calls
            .push(LogCall::DescribeFilters(log_group_name.to_string()));
        if let Some(error) = state.take_failure(LogOperation::DescribeFilters) {
            return Err(error);
        }
        let filters = state
            .filters
            .get(log_group_name)
            .ok_or_else(|| ServiceError::NotFound(log_group_name.to_string()))?;
        Ok(filters
            .keys()
            .filter(|name| name.starts_with(filter_name_prefix))
            .cloned()
            .collect())
    }

    async fn put_subscription_filter(
        &self,
        spec: &SubscriptionFilterSpec,
    ) -> Result<(), ServiceError> {
        let mut state = self.lock();
        state.calls.push(LogCall::Put(spec.clone()));
        if let Some(error) = state.take_failure(LogOperation::Put) {
            return Err(error);
        }
        let filters = state
            .filters
            .get_mut(&spec.log_group_name)
            .ok_or_else(|| ServiceError::NotFound(spec.log_group_name.clone()))?;
        filters.insert(spec.filter_name.clone(), spec.clone());
        Ok(())
    }

    async fn delete_subscription_filter(
        &self,
        log_group_name: &str,
        filter_name: &str,
    ) -> Result<(), ServiceError> {
        let mut state = self.lock();
        state.calls.push(LogCall::Delete(
            log_group_name.to_string(),
            filter_name.to_string(),
        ));
        if let Some(error) = state.take_failure(LogOperation::Delete) {
            return Err(error);
        }
        state
            .filters
            .get_mut(log_group_name)
            .and_then(|filters| filters.remove(filter_name))
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound(format!("{log_group_name}:{filter_name}")))
    }
}
