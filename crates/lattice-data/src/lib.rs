//! Lattice Data - indexed in-memory property containers for data-bound views.
//!
//! This is the main crate; it re-exports the core signal and logging APIs
//! from `lattice-data-core`.
//!
//! # Example
//!
//! ```
//! use lattice_data::{ContainerConfig, IndexedContainer};
//! use lattice_data::container::ValueType;
//!
//! let container = IndexedContainer::with_config(ContainerConfig::default());
//! container.add_property("title", ValueType::Text, None).unwrap();
//!
//! let id = container.add_item().unwrap();
//! container.set_value(&id, &"title".into(), Some("Dune".into())).unwrap();
//! assert_eq!(container.item(&id).unwrap().to_string(), "Dune");
//! ```

pub use lattice_data_core::*;

pub mod config;
pub mod container;
pub mod error;

pub use config::{ContainerConfig, NullOrdering};
pub use container::IndexedContainer;
pub use error::{ConfigError, ContainerError, Result};
