//! Match Engine
//!
//! Linear scan over the Item Store in insertion order; the first compatible
//! item wins. The result is only a candidate: `relay::pair` re-validates
//! both sessions before anything is committed.

use crate::item::{Item, ItemStatus};
use crate::registry::ConnectionRegistry;
use crate::store::ItemStore;

/// First stored item that can be paired with `new_item`
pub fn find_match<'a>(
    store: &'a ItemStore,
    registry: &ConnectionRegistry,
    new_item: &Item,
) -> Option<&'a Item> {
    store
        .all_items()
        .iter()
        .find(|candidate| is_compatible(candidate, new_item) && registry.is_available(candidate.reporter))
}

/// Field-level compatibility, ignoring session liveness
pub fn is_compatible(candidate: &Item, new_item: &Item) -> bool {
    candidate.id != new_item.id
        && !candidate.is_matched()
        && candidate.reporter != new_item.reporter
        && candidate.name.to_lowercase() == new_item.name.to_lowercase()
        && candidate.color.to_lowercase() == new_item.color.to_lowercase()
        && candidate.location == new_item.location
        && opposite(candidate.status, new_item.status)
}

fn opposite(a: ItemStatus, b: ItemStatus) -> bool {
    matches!(
        (a, b),
        (ItemStatus::Lost, ItemStatus::Found) | (ItemStatus::Found, ItemStatus::Lost)
    )
}
