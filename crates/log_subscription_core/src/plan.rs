use crate::contract::{NameSet, TrackedState};

/// What a reconciliation pass has to do, derived from the live inventory and
/// the tracking table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Live functions without a subscribed record, pending ones included.
    pub to_add: NameSet,
    /// Subscribed records whose function is gone.
    pub to_remove: NameSet,
    /// Live functions already subscribed.
    pub unchanged: NameSet,
    /// Records deleted from the store without touching the log service.
    pub purge: NameSet,
}

impl ReconciliationPlan {
    pub fn is_noop(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty() && self.purge.is_empty()
    }
}

/// Computes the diff between inventory and tracked state.
///
/// The delivery function is dropped from both sides before diffing: a
/// subscription on its own log group would re-trigger it on every delivery.
/// A record of it left in the store is purged instead of unsubscribed.
pub fn plan_reconciliation(
    inventory: &NameSet,
    tracked: &TrackedState,
    delivery_function: &str,
) -> ReconciliationPlan {
    let live = without(inventory, delivery_function);
    let subscribed = without(&tracked.subscribed, delivery_function);

    let to_add: NameSet = live.difference(&subscribed).cloned().collect();
    let to_remove: NameSet = subscribed.difference(&live).cloned().collect();
    let unchanged: NameSet = live.intersection(&subscribed).cloned().collect();

    let mut purge: NameSet = without(&tracked.pending, delivery_function)
        .difference(&live)
        .cloned()
        .collect();
    if tracked.subscribed.contains(delivery_function)
        || tracked.pending.contains(delivery_function)
    {
        purge.insert(delivery_function.to_string());
    }

    ReconciliationPlan {
        to_add,
        to_remove,
        unchanged,
        purge,
    }
}

fn without(names: &NameSet, excluded: &str) -> NameSet {
    names
        .iter()
        .filter(|name| name.as_str() != excluded)
        .cloned()
        .collect()
}
