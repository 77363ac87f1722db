//! Identifiers for items and properties.
//!
//! Both identifier types are opaque to the container: it only hashes and
//! compares them. Item ids are either integers (the form used for
//! auto-generated ids) or text keys chosen by the caller.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identifies an item (row) in a container.
///
/// # Example
///
/// ```
/// use lattice_data::container::ItemId;
///
/// let generated = ItemId::from(7);
/// let keyed = ItemId::from("customer-42");
/// assert_ne!(generated, keyed);
/// assert_eq!(generated.as_int(), Some(7));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    /// Integer id. Auto-generated ids always use this form.
    Int(i64),
    /// Caller-chosen text key.
    Text(Arc<str>),
}

impl ItemId {
    /// Returns the integer value if this is an integer id.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ItemId::Int(n) => Some(*n),
            ItemId::Text(_) => None,
        }
    }

    /// Returns the key if this is a text id.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ItemId::Int(_) => None,
            ItemId::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Int(n) => write!(f, "{n}"),
            ItemId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ItemId {
    fn from(n: i64) -> Self {
        ItemId::Int(n)
    }
}

impl From<i32> for ItemId {
    fn from(n: i32) -> Self {
        ItemId::Int(i64::from(n))
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId::Text(Arc::from(s))
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId::Text(Arc::from(s))
    }
}

impl From<&ItemId> for ItemId {
    fn from(id: &ItemId) -> Self {
        id.clone()
    }
}

/// Identifies a property (column) in a container's schema.
///
/// Cloning is cheap; the name is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(Arc<str>);

impl PropertyId {
    /// Creates a property id from a name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Returns the property name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PropertyId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PropertyId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<&PropertyId> for PropertyId {
    fn from(id: &PropertyId) -> Self {
        id.clone()
    }
}

impl AsRef<str> for PropertyId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
