//! Property registry shared by every item of a container.

use std::collections::HashMap;

use super::id::PropertyId;
use super::value::{Value, ValueType};

/// Values of one item, keyed by property. Absent keys read as null.
pub(crate) type Record = HashMap<PropertyId, Value>;

/// Ordered set of registered properties with their types and defaults.
#[derive(Debug, Default, Clone)]
pub(crate) struct Schema {
    ids: Vec<PropertyId>,
    types: HashMap<PropertyId, ValueType>,
    defaults: HashMap<PropertyId, Value>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &PropertyId) -> bool {
        self.types.contains_key(id)
    }

    /// Registers a property. Returns `false` if the id is already taken.
    ///
    /// The caller validates `default` against `value_type`.
    pub fn add(&mut self, id: PropertyId, value_type: ValueType, default: Option<Value>) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.ids.push(id.clone());
        if let Some(default) = default {
            self.defaults.insert(id.clone(), default);
        }
        self.types.insert(id, value_type);
        true
    }

    pub fn remove(&mut self, id: &PropertyId) -> bool {
        if self.types.remove(id).is_none() {
            return false;
        }
        self.defaults.remove(id);
        self.ids.retain(|p| p != id);
        true
    }

    pub fn value_type(&self, id: &PropertyId) -> Option<ValueType> {
        self.types.get(id).copied()
    }

    pub fn default_value(&self, id: &PropertyId) -> Option<&Value> {
        self.defaults.get(id)
    }

    pub fn ids(&self) -> &[PropertyId] {
        &self.ids
    }

    /// A fresh record holding every stored default.
    pub fn default_record(&self) -> Record {
        self.defaults.clone()
    }
}
