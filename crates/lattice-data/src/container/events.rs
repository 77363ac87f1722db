//! Change notifications emitted by containers.

use super::id::{ItemId, PropertyId};
use super::value::Value;

slotmap::new_key_type! {
    /// Identifies a registered listener; pass it back to the matching
    /// `remove_*_listener` call to unregister.
    ///
    /// Ids are unique across every listener kind of a container, and a
    /// removal call only accepts ids registered through its own kind (and,
    /// for cell listeners, the same cell).
    pub struct ListenerId;
}

/// The visible item set changed.
///
/// Indexes refer to the visible (filtered) sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemSetChange {
    /// A single item became visible at `index`.
    ItemAdded {
        /// Visible index of the new item.
        index: usize,
        /// The new item.
        item_id: ItemId,
    },
    /// A visible item was removed.
    ItemRemoved {
        /// Visible index the item had before removal.
        index: usize,
        /// The removed item.
        item_id: ItemId,
    },
    /// A contiguous run of visible items was removed.
    ItemsRemoved {
        /// Visible index of the first removed item.
        first_index: usize,
        /// Id of the first removed item.
        first_item_id: ItemId,
        /// Number of removed visible items.
        count: usize,
    },
    /// The visible set or its order changed in a way not described by the
    /// other variants (filtering, sorting, positioned inserts while filtered).
    Changed,
}

impl ItemSetChange {
    /// Visible index of the added item, if this event describes an addition.
    pub fn added_item_index(&self) -> Option<usize> {
        match self {
            ItemSetChange::ItemAdded { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// The schema gained or lost a property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertySetChange {
    /// A property was registered.
    Added(PropertyId),
    /// A property was removed.
    Removed(PropertyId),
}

impl PropertySetChange {
    /// The property concerned.
    pub fn property_id(&self) -> &PropertyId {
        match self {
            PropertySetChange::Added(id) | PropertySetChange::Removed(id) => id,
        }
    }
}

/// A cell value was written.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChange {
    /// Item owning the cell.
    pub item_id: ItemId,
    /// Property of the cell.
    pub property_id: PropertyId,
    /// The new value; `None` when the cell was cleared.
    pub value: Option<Value>,
}
