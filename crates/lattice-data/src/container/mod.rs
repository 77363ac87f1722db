//! Indexed property container.
//!
//! This module provides [`IndexedContainer`], an in-memory store of items
//! (rows) over a shared schema of typed properties (columns), intended as the
//! data source behind tables, lists and selection widgets.
//!
//! # Architecture
//!
//! - **Schema**: ordered property ids with a declared [`ValueType`] and an
//!   optional default value
//! - **Items**: records of [`Value`]s keyed by [`ItemId`]
//! - **Visible sequence**: the items passing every registered [`Filter`], in
//!   stored order
//! - **Sorting**: stable multi-key reordering through an [`ItemSorter`]
//! - **Notifications**: item-set, property-set, value and per-cell listeners
//!
//! # Example
//!
//! ```
//! use lattice_data::container::{IndexedContainer, ValueType};
//!
//! let people = IndexedContainer::new();
//! people.add_property("name", ValueType::Text, None).unwrap();
//! people.add_property("age", ValueType::Int, Some(0.into())).unwrap();
//!
//! for (name, age) in [("Ada", 36), ("Alan", 41), ("Grace", 85)] {
//!     let id = people.add_item().unwrap();
//!     let item = people.item(&id).unwrap();
//!     item.set_value(&"name".into(), Some(name.into())).unwrap();
//!     item.set_value(&"age".into(), Some(age.into())).unwrap();
//! }
//!
//! people.add_string_filter("name", "a", true, true);
//! assert_eq!(people.len(), 2);
//!
//! people.sort(&["age".into()], &[false]).unwrap();
//! let first = people.first_item_id().unwrap();
//! assert_eq!(people.value(&first, &"name".into()), Some("Alan".into()));
//! ```

mod events;
mod filter;
mod id;
mod indexed;
mod proxy;
mod schema;
mod sorter;
mod value;

pub use events::{ItemSetChange, ListenerId, PropertySetChange, ValueChange};
pub use filter::{
    And, Between, Compare, CompareOp, Filter, FilterId, IsNull, ItemValues, Like, Not, Or,
    PredicateFilter, PredicateFn, SimpleStringFilter,
};
pub use id::{ItemId, PropertyId};
pub use indexed::IndexedContainer;
pub use proxy::{Item, Property};
pub use sorter::{DefaultItemSorter, ItemSorter, SortKey, natural_order};
pub use value::{Value, ValueType};
