use log_subscription_core::contract::NameSet;
use log_subscription_core::error::{ReconcileError, ServiceError};
use tracing::info;

use crate::adapters::inventory::FunctionInventory;

const COMPONENT: &str = "inventory_lister";
pub const INVENTORY_SERVICE: &str = "lambda";

/// Upper bound on pages walked in one listing.
pub const MAX_INVENTORY_PAGES: usize = 10_000;

pub struct InventoryLister<'a> {
    inventory: &'a dyn FunctionInventory,
}

impl<'a> InventoryLister<'a> {
    pub fn new(inventory: &'a dyn FunctionInventory) -> Self {
        Self { inventory }
    }

    /// Every deployed function name, across all pages.
    pub async fn list_all(&self) -> Result<NameSet, ReconcileError> {
        let mut names = NameSet::new();
        let mut marker = None;

        for page_number in 1..=MAX_INVENTORY_PAGES {
            let page = self
                .inventory
                .list_functions_page(marker.take())
                .await
                .map_err(|error| ReconcileError::upstream(INVENTORY_SERVICE, error))?;
            names.extend(page.function_names);

            match page.next_marker {
                Some(next) if !next.is_empty() => marker = Some(next),
                _ => {
                    info!(
                        component = COMPONENT,
                        event = "inventory_listed",
                        function_count = names.len(),
                        pages = page_number,
                    );
                    return Ok(names);
                }
            }
        }

        Err(ReconcileError::upstream(
            INVENTORY_SERVICE,
            ServiceError::Fatal(format!(
                "function listing did not finish within {MAX_INVENTORY_PAGES} pages"
            )),
        ))
    }
}
