//! Item and property handles.
//!
//! [`Item`] and [`Property`] hold no data of their own: every read or write
//! resolves through the owning container. Two handles are equal when they
//! point at the same container instance and carry equal ids.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr;

use super::events::{ListenerId, ValueChange};
use super::id::{ItemId, PropertyId};
use super::indexed::IndexedContainer;
use super::value::{Value, ValueType};
use crate::error::{ContainerError, Result};

/// Handle to one item of an [`IndexedContainer`].
#[derive(Clone)]
pub struct Item<'a> {
    container: &'a IndexedContainer,
    id: ItemId,
}

impl<'a> Item<'a> {
    pub(crate) fn new(container: &'a IndexedContainer, id: ItemId) -> Self {
        Self { container, id }
    }

    /// The item's id.
    pub fn id(&self) -> &ItemId {
        &self.id
    }

    /// The container this item belongs to.
    pub fn container(&self) -> &'a IndexedContainer {
        self.container
    }

    /// Handle to one of the item's properties, `None` if the property is not
    /// registered.
    pub fn property(&self, property_id: impl Into<PropertyId>) -> Option<Property<'a>> {
        let property_id = property_id.into();
        self.container
            .property_type(&property_id)
            .map(|_| Property::new(self.container, self.id.clone(), property_id))
    }

    /// Registered property ids, in schema order.
    pub fn property_ids(&self) -> Vec<PropertyId> {
        self.container.property_ids()
    }

    /// Reads a value of this item.
    pub fn value(&self, property_id: &PropertyId) -> Option<Value> {
        self.container.value(&self.id, property_id)
    }

    /// Writes a value of this item. See [`IndexedContainer::set_value`].
    pub fn set_value(&self, property_id: &PropertyId, value: Option<Value>) -> Result<()> {
        self.container.set_value(&self.id, property_id, value)
    }

    /// Items share the container schema; per-item properties are not
    /// supported.
    pub fn add_item_property(
        &self,
        _property_id: impl Into<PropertyId>,
        _value_type: ValueType,
    ) -> Result<bool> {
        Err(ContainerError::UnsupportedOperation(
            "items of an indexed container cannot add properties",
        ))
    }

    /// Items share the container schema; per-item properties are not
    /// supported.
    pub fn remove_item_property(&self, _property_id: &PropertyId) -> Result<bool> {
        Err(ContainerError::UnsupportedOperation(
            "items of an indexed container cannot remove properties",
        ))
    }
}

impl PartialEq for Item<'_> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.container, other.container) && self.id == other.id
    }
}

impl Eq for Item<'_> {}

impl Hash for Item<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Item<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Values in schema order, separated by a single space. Null prints as `null`.
impl fmt::Display for Item<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, property_id) in self.container.property_ids().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match self.container.value(&self.id, property_id) {
                Some(value) => write!(f, "{value}")?,
                None => f.write_str("null")?,
            }
        }
        Ok(())
    }
}

/// Handle to one cell: an (item, property) pair of an [`IndexedContainer`].
#[derive(Clone)]
pub struct Property<'a> {
    container: &'a IndexedContainer,
    item_id: ItemId,
    property_id: PropertyId,
}

impl<'a> Property<'a> {
    pub(crate) fn new(
        container: &'a IndexedContainer,
        item_id: ItemId,
        property_id: PropertyId,
    ) -> Self {
        Self {
            container,
            item_id,
            property_id,
        }
    }

    pub fn item_id(&self) -> &ItemId {
        &self.item_id
    }

    pub fn property_id(&self) -> &PropertyId {
        &self.property_id
    }

    /// Declared type, `None` once the property has been removed.
    pub fn value_type(&self) -> Option<ValueType> {
        self.container.property_type(&self.property_id)
    }

    pub fn value(&self) -> Option<Value> {
        self.container.value(&self.item_id, &self.property_id)
    }

    /// Writes the cell. See [`IndexedContainer::set_value`].
    pub fn set_value(&self, value: Option<Value>) -> Result<()> {
        self.container.set_value(&self.item_id, &self.property_id, value)
    }

    pub fn is_read_only(&self) -> bool {
        self.container.is_read_only(&self.item_id, &self.property_id)
    }

    /// Flags the cell read-only. With read-only enforcement enabled in the
    /// container config, writes to a flagged cell fail with
    /// [`ContainerError::ReadOnly`].
    pub fn set_read_only(&self, read_only: bool) {
        self.container.set_read_only(&self.item_id, &self.property_id, read_only);
    }

    /// Registers a listener for writes to this cell only.
    pub fn add_value_change_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ValueChange) + Send + Sync + 'static,
    {
        self.container
            .add_cell_listener(&self.item_id, &self.property_id, listener)
    }

    /// Unregisters a listener added with
    /// [`add_value_change_listener`](Self::add_value_change_listener).
    pub fn remove_value_change_listener(&self, id: ListenerId) -> bool {
        self.container
            .remove_cell_listener(&self.item_id, &self.property_id, id)
    }
}

impl PartialEq for Property<'_> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.container, other.container)
            && self.item_id == other.item_id
            && self.property_id == other.property_id
    }
}

impl Eq for Property<'_> {}

impl Hash for Property<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.item_id.hash(state);
        self.property_id.hash(state);
    }
}

impl fmt::Debug for Property<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("item_id", &self.item_id)
            .field("property_id", &self.property_id)
            .finish_non_exhaustive()
    }
}

/// The cell value, or an empty string when null.
impl fmt::Display for Property<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(value) => write!(f, "{value}"),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn container() -> IndexedContainer {
        let container = IndexedContainer::new();
        container.add_property("first", ValueType::Text, None).unwrap();
        container.add_property("last", ValueType::Text, None).unwrap();
        container
    }

    #[test]
    fn test_item_equality_needs_same_container() {
        let a = container();
        let b = container();
        a.add_item_with_id("x");
        b.add_item_with_id("x");

        let ax1 = a.item(&"x".into()).unwrap();
        let ax2 = a.item(&"x".into()).unwrap();
        let bx = b.item(&"x".into()).unwrap();
        assert_eq!(ax1, ax2);
        assert_ne!(ax1, bx);

        let set: HashSet<_> = [ax1, ax2].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_item_display() {
        let c = container();
        let item = c.add_item_with_id("x").unwrap();
        item.set_value(&"first".into(), Some("Ada".into())).unwrap();
        assert_eq!(item.to_string(), "Ada null");
    }

    #[test]
    fn test_item_property_mutation_unsupported() {
        let c = container();
        let item = c.add_item_with_id("x").unwrap();
        assert!(matches!(
            item.add_item_property("extra", ValueType::Any),
            Err(ContainerError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            item.remove_item_property(&"first".into()),
            Err(ContainerError::UnsupportedOperation(_))
        ));
        assert_eq!(c.property_ids().len(), 2);
    }

    #[test]
    fn test_property_handle_reads_through() {
        let c = container();
        let item = c.add_item_with_id("x").unwrap();
        let cell = item.property("first").unwrap();
        assert!(item.property("missing").is_none());

        assert_eq!(cell.value(), None);
        assert_eq!(cell.to_string(), "");
        c.set_value(&"x".into(), &"first".into(), Some("Grace".into())).unwrap();
        assert_eq!(cell.value(), Some(Value::from("Grace")));
        assert_eq!(cell.value_type(), Some(ValueType::Text));

        c.remove_property(&"first".into());
        assert_eq!(cell.value_type(), None);
        assert_eq!(cell.value(), None);
    }

    #[test]
    fn test_property_equality() {
        let c = container();
        c.add_item_with_id("x");
        let p1 = c.container_property(&"x".into(), &"first".into()).unwrap();
        let p2 = c.item(&"x".into()).unwrap().property("first").unwrap();
        let p3 = c.item(&"x".into()).unwrap().property("last").unwrap();
        assert_eq!(p1, p2);
        assert_ne!(p1, p3);
    }
}
