//! Item Store
//!
//! Holds every item report in insertion order together with the allowed
//! location set. Each mutation is followed by a synchronous save; a failed
//! save is logged and the in-memory collection stays authoritative.

use tracing::{info, warn};

use crate::error::{PersistenceError, StoreError, ValidationError};
use crate::item::{Item, ItemReport, ItemStatus, ReportKind};
use crate::persistence::Persistence;
use crate::types::{ItemId, SessionId};

pub struct ItemStore {
    items: Vec<Item>,
    locations: Vec<String>,
    persistence: Box<dyn Persistence>,
}

impl std::fmt::Debug for ItemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemStore")
            .field("items", &self.items.len())
            .field("locations", &self.locations)
            .finish()
    }
}

impl ItemStore {
    /// Create an empty store
    pub fn new(locations: Vec<String>, persistence: Box<dyn Persistence>) -> Self {
        Self {
            items: Vec::new(),
            locations,
            persistence,
        }
    }

    /// Create a store from whatever the backend holds
    ///
    /// An unreadable collection is logged and replaced by an empty one; the
    /// next save overwrites it.
    pub fn load(locations: Vec<String>, persistence: Box<dyn Persistence>) -> Self {
        let items = match persistence.load() {
            Ok(items) => {
                info!("Loaded {} items", items.len());
                items
            }
            Err(e) => {
                warn!("Could not load items, starting with an empty list: {}", e);
                Vec::new()
            }
        };
        Self {
            items,
            locations,
            persistence,
        }
    }

    /// Validate and append a new report, returning the stored item
    pub fn add_item(
        &mut self,
        reporter: SessionId,
        kind: ReportKind,
        report: ItemReport,
    ) -> Result<Item, ValidationError> {
        let new = report.validate(&self.locations)?;
        let item = Item::new(kind, new, reporter);
        self.items.push(item.clone());
        self.persist_logged();
        Ok(item)
    }

    /// Items reported by `session`, in insertion order
    pub fn items_of(&self, session: SessionId) -> Vec<Item> {
        self.items
            .iter()
            .filter(|item| item.reporter == session)
            .cloned()
            .collect()
    }

    /// Full collection in insertion order
    pub fn all_items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Mark two items as matched with each other
    ///
    /// Idempotent when the two are already matched to each other.
    pub fn mark_matched(&mut self, a: ItemId, b: ItemId) -> Result<(), StoreError> {
        if a == b {
            return Err(StoreError::SelfMatch(a));
        }
        let idx_a = self.index_of(a)?;
        let idx_b = self.index_of(b)?;

        if self.items[idx_a].matched_with == Some(b) && self.items[idx_b].matched_with == Some(a) {
            return Ok(());
        }
        if self.items[idx_a].is_matched() {
            return Err(StoreError::AlreadyMatched(a));
        }
        if self.items[idx_b].is_matched() {
            return Err(StoreError::AlreadyMatched(b));
        }

        for (idx, other) in [(idx_a, b), (idx_b, a)] {
            let item = &mut self.items[idx];
            item.status = ItemStatus::Matched;
            item.matched_with = Some(other);
        }
        self.persist_logged();
        Ok(())
    }

    /// Save the current collection
    pub fn persist(&self) -> Result<(), PersistenceError> {
        self.persistence.save(&self.items)
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn index_of(&self, id: ItemId) -> Result<usize, StoreError> {
        self.items
            .iter()
            .position(|item| item.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    fn persist_logged(&self) {
        if let Err(e) = self.persist() {
            warn!("Error saving {} items: {}", self.items.len(), e);
        }
    }
}
