//! The indexed container.
//!
//! `IndexedContainer` keeps a full ordered sequence of item ids plus, while
//! filters are registered, the visible subsequence of items that pass them.
//! All access goes through `&self`; state lives behind a `parking_lot`
//! `RwLock` and listeners are notified only after the lock is released, so a
//! listener may freely read or mutate the container it observes.

use std::collections::{HashMap, HashSet};
use std::fmt;

use lattice_data_core::logging::{span_names, targets};
use lattice_data_core::{ConnectionId, PerfSpan, Signal};
use parking_lot::{Mutex, RwLock};
use slotmap::SlotMap;

use super::events::{ItemSetChange, ListenerId, PropertySetChange, ValueChange};
use super::filter::{Filter, FilterId, ItemValues, SimpleStringFilter};
use super::id::{ItemId, PropertyId};
use super::proxy::{Item, Property};
use super::schema::{Record, Schema};
use super::sorter::{DefaultItemSorter, ItemSorter, SortKey};
use super::value::{Value, ValueType};
use crate::config::ContainerConfig;
use crate::error::{ContainerError, Result};

/// Scoped value listeners: property → item → signal.
type CellListeners = HashMap<PropertyId, HashMap<ItemId, Signal<ValueChange>>>;

/// Where a [`ListenerId`] is connected.
enum Registration {
    ItemSet(ConnectionId),
    PropertySet(ConnectionId),
    Value(ConnectionId),
    Cell {
        item_id: ItemId,
        property_id: PropertyId,
        connection: ConnectionId,
    },
}

struct ContainerState {
    schema: Schema,
    records: HashMap<ItemId, Record>,
    /// Full sequence, in stored order.
    all_ids: Vec<ItemId>,
    /// Visible sequence. `None` while no filter is registered, in which case
    /// it equals `all_ids`.
    visible: Option<Vec<ItemId>>,
    filters: SlotMap<FilterId, Box<dyn Filter>>,
    read_only: HashSet<(ItemId, PropertyId)>,
    /// `None` once the integer id range is used up.
    next_generated_id: Option<i64>,
    sorter: Box<dyn ItemSorter>,
}

impl ContainerState {
    fn new(config: &ContainerConfig) -> Self {
        Self {
            schema: Schema::new(),
            records: HashMap::new(),
            all_ids: Vec::new(),
            visible: None,
            filters: SlotMap::with_key(),
            read_only: HashSet::new(),
            next_generated_id: Some(config.first_generated_id),
            sorter: Box::new(DefaultItemSorter::new(config.null_ordering)),
        }
    }

    fn visible_ids(&self) -> &[ItemId] {
        self.visible.as_deref().unwrap_or(&self.all_ids)
    }

    fn contains_visible(&self, id: &ItemId) -> bool {
        match &self.visible {
            None => self.records.contains_key(id),
            Some(visible) => visible.contains(id),
        }
    }

    fn visible_index_of(&self, id: &ItemId) -> Option<usize> {
        if self.visible.is_none() && !self.records.contains_key(id) {
            return None;
        }
        self.visible_ids().iter().position(|v| v == id)
    }

    fn passes_filters(&self, id: &ItemId) -> bool {
        self.records.get(id).is_some_and(|record| {
            let view = ItemValues::new(id, record);
            self.filters.values().all(|f| f.passes(&view))
        })
    }

    fn is_property_filtered(&self, property_id: &PropertyId) -> bool {
        self.filters.values().any(|f| f.applies_to_property(property_id))
    }

    /// Recomputes the visible sequence. Returns `true` if it changed.
    fn refilter(&mut self) -> bool {
        if self.filters.is_empty() {
            return self
                .visible
                .take()
                .is_some_and(|visible| visible.len() != self.all_ids.len());
        }

        let _span = PerfSpan::new(span_names::FILTER);
        let visible: Vec<ItemId> = self
            .all_ids
            .iter()
            .filter(|id| self.passes_filters(id))
            .cloned()
            .collect();
        let changed = visible.as_slice() != self.visible_ids();
        tracing::debug!(
            target: targets::FILTER,
            visible = visible.len(),
            total = self.all_ids.len(),
            changed,
            "recomputed visible items"
        );
        self.visible = Some(visible);
        changed
    }

    /// Next unused integer id, or `None` once `i64::MAX` has been handed
    /// out. The counter never moves backwards.
    fn generate_id(&mut self) -> Option<ItemId> {
        loop {
            let next = self.next_generated_id?;
            self.next_generated_id = next.checked_add(1);
            let id = ItemId::Int(next);
            if !self.records.contains_key(&id) {
                return Some(id);
            }
        }
    }

    /// Full-sequence position right after `previous`; `None` for the front.
    fn position_after(&self, previous: Option<&ItemId>) -> Option<usize> {
        match previous {
            None => Some(0),
            Some(previous) if self.contains_visible(previous) => {
                self.all_ids.iter().position(|id| id == previous).map(|i| i + 1)
            }
            Some(_) => None,
        }
    }

    /// Appends a new item. The caller has checked that `id` is unused.
    fn append(&mut self, id: ItemId) -> Option<ItemSetChange> {
        self.records.insert(id.clone(), self.schema.default_record());
        self.all_ids.push(id.clone());

        if self.visible.is_none() {
            return Some(ItemSetChange::ItemAdded {
                index: self.all_ids.len() - 1,
                item_id: id,
            });
        }
        if !self.passes_filters(&id) {
            return None;
        }
        let visible = self.visible.get_or_insert_with(Vec::new);
        visible.push(id.clone());
        Some(ItemSetChange::ItemAdded {
            index: visible.len() - 1,
            item_id: id,
        })
    }

    /// Inserts a new item at `position` of the full sequence. The caller has
    /// checked that `id` is unused and `position` is in bounds.
    fn insert_at(&mut self, position: usize, id: ItemId) -> Option<ItemSetChange> {
        self.records.insert(id.clone(), self.schema.default_record());
        self.all_ids.insert(position, id.clone());

        if self.visible.is_none() {
            return Some(ItemSetChange::ItemAdded {
                index: position,
                item_id: id,
            });
        }
        self.refilter().then_some(ItemSetChange::Changed)
    }
}

/// An ordered, filterable, sortable, observable in-memory item store.
///
/// Items are rows identified by an [`ItemId`]; properties are typed columns
/// shared by every item. Positional queries (`len`, `index_of_id`,
/// `next_item_id`, ...) operate on the visible sequence, which excludes items
/// rejected by a registered [`Filter`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use parking_lot::Mutex;
/// use lattice_data::container::{IndexedContainer, ItemSetChange, ValueType};
///
/// let container = IndexedContainer::new();
/// container.add_property("name", ValueType::Text, None).unwrap();
///
/// let events = Arc::new(Mutex::new(Vec::new()));
/// let sink = events.clone();
/// container.add_item_set_change_listener(move |event| sink.lock().push(event.clone()));
///
/// let id = container.add_item().unwrap();
/// container.set_value(&id, &"name".into(), Some("Ada".into())).unwrap();
///
/// assert_eq!(container.len(), 1);
/// assert_eq!(events.lock().len(), 1);
/// assert!(matches!(events.lock()[0], ItemSetChange::ItemAdded { index: 0, .. }));
/// ```
pub struct IndexedContainer {
    state: RwLock<ContainerState>,
    config: ContainerConfig,
    item_set_changed: Signal<ItemSetChange>,
    property_set_changed: Signal<PropertySetChange>,
    value_changed: Signal<ValueChange>,
    cell_listeners: Mutex<CellListeners>,
    /// Locked before `cell_listeners` when both are needed.
    registrations: Mutex<SlotMap<ListenerId, Registration>>,
}

static_assertions::assert_impl_all!(IndexedContainer: Send, Sync);

impl Default for IndexedContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexedContainer {
    /// Creates an empty container with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    /// Creates an empty container.
    pub fn with_config(config: ContainerConfig) -> Self {
        Self {
            state: RwLock::new(ContainerState::new(&config)),
            config,
            item_set_changed: Signal::new(),
            property_set_changed: Signal::new(),
            value_changed: Signal::new(),
            cell_listeners: Mutex::new(HashMap::new()),
            registrations: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Creates a container holding the given items, in order. Duplicate ids
    /// are skipped.
    pub fn with_item_ids<I>(ids: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ItemId>,
    {
        let mut container = Self::new();
        let state = container.state.get_mut();
        for id in ids {
            let id = id.into();
            if !state.records.contains_key(&id) {
                state.append(id);
            }
        }
        container
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    // =========================================================================
    // Schema
    // =========================================================================

    /// Registers a property.
    ///
    /// Returns `Ok(false)` without changes if the id is already registered,
    /// whatever `value_type` and `default` are.
    /// A `default` is written into every existing item and seeds items added
    /// later; it must be accepted by `value_type`.
    pub fn add_property(
        &self,
        property_id: impl Into<PropertyId>,
        value_type: ValueType,
        default: Option<Value>,
    ) -> Result<bool> {
        let property_id = property_id.into();
        let mut state = self.state.write();
        if state.schema.contains(&property_id) {
            return Ok(false);
        }
        if let Some(default) = &default
            && !value_type.accepts(default)
        {
            return Err(ContainerError::type_mismatch(
                property_id,
                value_type,
                default.value_type(),
            ));
        }

        let mut value_events = Vec::new();
        if let Some(default) = &default {
            let ContainerState { all_ids, records, .. } = &mut *state;
            for item_id in all_ids.iter() {
                if let Some(record) = records.get_mut(item_id) {
                    record.insert(property_id.clone(), default.clone());
                    value_events.push(ValueChange {
                        item_id: item_id.clone(),
                        property_id: property_id.clone(),
                        value: Some(default.clone()),
                    });
                }
            }
        }
        let has_default = default.is_some();
        state.schema.add(property_id.clone(), value_type, default);
        let changed = has_default && state.is_property_filtered(&property_id) && state.refilter();
        drop(state);

        tracing::debug!(
            target: targets::CONTAINER,
            property = %property_id,
            %value_type,
            "property added"
        );
        if changed {
            self.fire_item_set_change(ItemSetChange::Changed);
        }
        for event in value_events {
            self.fire_value_change(event);
        }
        self.property_set_changed.emit(PropertySetChange::Added(property_id));
        Ok(true)
    }

    /// Removes a property from the schema and from every item.
    ///
    /// Returns `false` if the property was not registered.
    pub fn remove_property(&self, property_id: &PropertyId) -> bool {
        let mut state = self.state.write();
        if !state.schema.remove(property_id) {
            return false;
        }
        for record in state.records.values_mut() {
            record.remove(property_id);
        }
        state.read_only.retain(|(_, p)| p != property_id);
        let changed = state.is_property_filtered(property_id) && state.refilter();
        drop(state);

        tracing::debug!(target: targets::CONTAINER, property = %property_id, "property removed");
        if changed {
            self.fire_item_set_change(ItemSetChange::Changed);
        }
        self.property_set_changed
            .emit(PropertySetChange::Removed(property_id.clone()));
        true
    }

    pub fn property_type(&self, property_id: &PropertyId) -> Option<ValueType> {
        self.state.read().schema.value_type(property_id)
    }

    /// Registered property ids, in registration order.
    pub fn property_ids(&self) -> Vec<PropertyId> {
        self.state.read().schema.ids().to_vec()
    }

    pub fn default_value(&self, property_id: &PropertyId) -> Option<Value> {
        self.state.read().schema.default_value(property_id).cloned()
    }

    /// Properties accepted by [`sort`](Self::sort): every registered property.
    pub fn sortable_property_ids(&self) -> Vec<PropertyId> {
        self.property_ids()
    }

    // =========================================================================
    // Item lifecycle
    // =========================================================================

    /// Appends an item with a generated id and returns the id.
    ///
    /// Returns `None` without changes once the generated id range is
    /// exhausted.
    pub fn add_item(&self) -> Option<ItemId> {
        let mut state = self.state.write();
        let Some(item_id) = state.generate_id() else {
            tracing::warn!(target: targets::CONTAINER, "generated item ids exhausted");
            return None;
        };
        let event = state.append(item_id.clone());
        drop(state);

        tracing::debug!(target: targets::CONTAINER, item = %item_id, "item added");
        self.notify_item_set(event);
        Some(item_id)
    }

    /// Appends an item with the given id.
    ///
    /// Returns `None` without changes if the id is already in use.
    pub fn add_item_with_id(&self, item_id: impl Into<ItemId>) -> Option<Item<'_>> {
        let item_id = item_id.into();
        let mut state = self.state.write();
        if state.records.contains_key(&item_id) {
            return None;
        }
        let event = state.append(item_id.clone());
        drop(state);

        tracing::debug!(target: targets::CONTAINER, item = %item_id, "item added");
        self.notify_item_set(event);
        Some(Item::new(self, item_id))
    }

    /// Inserts an item directly after `previous`, or at the front for `None`.
    ///
    /// Fails if `previous` is not a visible item or `item_id` is in use.
    pub fn add_item_after(
        &self,
        previous: Option<&ItemId>,
        item_id: impl Into<ItemId>,
    ) -> Option<Item<'_>> {
        let item_id = item_id.into();
        let mut state = self.state.write();
        if state.records.contains_key(&item_id) {
            return None;
        }
        let position = state.position_after(previous)?;
        let event = state.insert_at(position, item_id.clone());
        drop(state);

        tracing::debug!(target: targets::CONTAINER, item = %item_id, position, "item inserted");
        self.notify_item_set(event);
        Some(Item::new(self, item_id))
    }

    /// Inserts an item at `index` of the full sequence.
    ///
    /// Fails if `index` is past the end or `item_id` is in use.
    pub fn add_item_at(&self, index: usize, item_id: impl Into<ItemId>) -> Option<Item<'_>> {
        let item_id = item_id.into();
        let mut state = self.state.write();
        if index > state.all_ids.len() || state.records.contains_key(&item_id) {
            return None;
        }
        let event = state.insert_at(index, item_id.clone());
        drop(state);

        tracing::debug!(
            target: targets::CONTAINER,
            item = %item_id,
            position = index,
            "item inserted"
        );
        self.notify_item_set(event);
        Some(Item::new(self, item_id))
    }

    /// [`add_item_after`](Self::add_item_after) with a generated id. Also
    /// returns `None` once the generated id range is exhausted.
    pub fn add_generated_item_after(&self, previous: Option<&ItemId>) -> Option<ItemId> {
        let mut state = self.state.write();
        let position = state.position_after(previous)?;
        let item_id = state.generate_id()?;
        let event = state.insert_at(position, item_id.clone());
        drop(state);

        tracing::debug!(target: targets::CONTAINER, item = %item_id, position, "item inserted");
        self.notify_item_set(event);
        Some(item_id)
    }

    /// [`add_item_at`](Self::add_item_at) with a generated id. Also returns
    /// `None` once the generated id range is exhausted.
    pub fn add_generated_item_at(&self, index: usize) -> Option<ItemId> {
        let mut state = self.state.write();
        if index > state.all_ids.len() {
            return None;
        }
        let item_id = state.generate_id()?;
        let event = state.insert_at(index, item_id.clone());
        drop(state);

        tracing::debug!(
            target: targets::CONTAINER,
            item = %item_id,
            position = index,
            "item inserted"
        );
        self.notify_item_set(event);
        Some(item_id)
    }

    /// Removes an item. Returns `false` if it does not exist.
    ///
    /// An [`ItemSetChange::ItemRemoved`] event fires only if the item was
    /// visible.
    pub fn remove_item(&self, item_id: &ItemId) -> bool {
        let mut state = self.state.write();
        let visible_index = state.visible_index_of(item_id);
        if state.records.remove(item_id).is_none() {
            return false;
        }
        state.all_ids.retain(|id| id != item_id);
        if let Some(visible) = state.visible.as_mut() {
            visible.retain(|id| id != item_id);
        }
        state.read_only.retain(|(item, _)| item != item_id);
        drop(state);

        tracing::debug!(
            target: targets::CONTAINER,
            item = %item_id,
            ?visible_index,
            "item removed"
        );
        if let Some(index) = visible_index {
            self.fire_item_set_change(ItemSetChange::ItemRemoved {
                index,
                item_id: item_id.clone(),
            });
        }
        true
    }

    /// Removes every item. Fires a single [`ItemSetChange::ItemsRemoved`]
    /// covering the visible items, if there were any.
    pub fn remove_all_items(&self) -> bool {
        let mut state = self.state.write();
        let count = state.visible_ids().len();
        let first_item_id = state.visible_ids().first().cloned();
        state.all_ids.clear();
        state.records.clear();
        state.read_only.clear();
        if let Some(visible) = state.visible.as_mut() {
            visible.clear();
        }
        drop(state);

        tracing::debug!(target: targets::CONTAINER, count, "all items removed");
        if let Some(first_item_id) = first_item_id {
            self.fire_item_set_change(ItemSetChange::ItemsRemoved {
                first_index: 0,
                first_item_id,
                count,
            });
        }
        true
    }

    // =========================================================================
    // Visible sequence
    // =========================================================================

    /// Number of visible items.
    pub fn len(&self) -> usize {
        self.state.read().visible_ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visible item ids, in order.
    pub fn item_ids(&self) -> Vec<ItemId> {
        self.state.read().visible_ids().to_vec()
    }

    /// Up to `count` visible ids starting at `start`.
    pub fn item_ids_range(&self, start: usize, count: usize) -> Vec<ItemId> {
        self.state
            .read()
            .visible_ids()
            .iter()
            .skip(start)
            .take(count)
            .cloned()
            .collect()
    }

    /// Returns `true` if the item exists and is visible.
    pub fn contains_id(&self, item_id: &ItemId) -> bool {
        self.state.read().contains_visible(item_id)
    }

    pub fn index_of_id(&self, item_id: &ItemId) -> Option<usize> {
        self.state.read().visible_index_of(item_id)
    }

    pub fn id_by_index(&self, index: usize) -> Option<ItemId> {
        self.state.read().visible_ids().get(index).cloned()
    }

    pub fn first_item_id(&self) -> Option<ItemId> {
        self.state.read().visible_ids().first().cloned()
    }

    pub fn last_item_id(&self) -> Option<ItemId> {
        self.state.read().visible_ids().last().cloned()
    }

    pub fn next_item_id(&self, item_id: &ItemId) -> Option<ItemId> {
        let state = self.state.read();
        let index = state.visible_index_of(item_id)?;
        state.visible_ids().get(index + 1).cloned()
    }

    pub fn prev_item_id(&self, item_id: &ItemId) -> Option<ItemId> {
        let state = self.state.read();
        let index = state.visible_index_of(item_id)?;
        state.visible_ids().get(index.checked_sub(1)?).cloned()
    }

    pub fn is_first_id(&self, item_id: &ItemId) -> bool {
        self.state.read().visible_ids().first() == Some(item_id)
    }

    pub fn is_last_id(&self, item_id: &ItemId) -> bool {
        self.state.read().visible_ids().last() == Some(item_id)
    }

    /// Handle to a visible item.
    pub fn item(&self, item_id: &ItemId) -> Option<Item<'_>> {
        self.contains_id(item_id)
            .then(|| Item::new(self, item_id.clone()))
    }

    // =========================================================================
    // Full sequence
    // =========================================================================

    /// Every item id regardless of filters, in stored order.
    pub fn all_item_ids(&self) -> Vec<ItemId> {
        self.state.read().all_ids.clone()
    }

    pub fn contains_unfiltered_id(&self, item_id: &ItemId) -> bool {
        self.state.read().records.contains_key(item_id)
    }

    /// Handle to an item whether or not it is visible.
    pub fn unfiltered_item(&self, item_id: &ItemId) -> Option<Item<'_>> {
        self.contains_unfiltered_id(item_id)
            .then(|| Item::new(self, item_id.clone()))
    }

    pub fn unfiltered_len(&self) -> usize {
        self.state.read().all_ids.len()
    }

    // =========================================================================
    // Values
    // =========================================================================

    /// Handle to one cell of a visible item.
    pub fn container_property(
        &self,
        item_id: &ItemId,
        property_id: &PropertyId,
    ) -> Option<Property<'_>> {
        let state = self.state.read();
        (state.contains_visible(item_id) && state.schema.contains(property_id))
            .then(|| Property::new(self, item_id.clone(), property_id.clone()))
    }

    /// The stored value of a cell, `None` if null or if the item or property
    /// does not exist.
    pub fn value(&self, item_id: &ItemId, property_id: &PropertyId) -> Option<Value> {
        self.state.read().records.get(item_id)?.get(property_id).cloned()
    }

    /// Writes a cell. `None` clears it.
    ///
    /// The value's kind must be accepted by the property's declared type;
    /// on any error the previous value is kept. If a registered filter depends
    /// on the property the visible sequence is recomputed, then global value
    /// listeners fire followed by the listeners scoped to this cell.
    pub fn set_value(
        &self,
        item_id: &ItemId,
        property_id: &PropertyId,
        value: Option<Value>,
    ) -> Result<()> {
        let mut state = self.state.write();
        let Some(value_type) = state.schema.value_type(property_id) else {
            return Err(ContainerError::PropertyNotFound(property_id.clone()));
        };
        if !state.records.contains_key(item_id) {
            return Err(ContainerError::ItemNotFound(item_id.clone()));
        }
        if self.config.enforce_read_only
            && state.read_only.contains(&(item_id.clone(), property_id.clone()))
        {
            tracing::warn!(
                target: targets::CONTAINER,
                item = %item_id,
                property = %property_id,
                "write to read-only cell rejected"
            );
            return Err(ContainerError::ReadOnly {
                item: item_id.clone(),
                property: property_id.clone(),
            });
        }
        if let Some(value) = &value
            && !value_type.accepts(value)
        {
            tracing::warn!(
                target: targets::CONTAINER,
                item = %item_id,
                property = %property_id,
                expected = %value_type,
                found = %value.value_type(),
                "write with mismatched type rejected"
            );
            return Err(ContainerError::type_mismatch(property_id, value_type, value.value_type()));
        }

        if let Some(record) = state.records.get_mut(item_id) {
            match &value {
                Some(value) => {
                    record.insert(property_id.clone(), value.clone());
                }
                None => {
                    record.remove(property_id);
                }
            }
        }
        let changed = state.is_property_filtered(property_id) && state.refilter();
        drop(state);

        if changed {
            self.fire_item_set_change(ItemSetChange::Changed);
        }
        self.fire_value_change(ValueChange {
            item_id: item_id.clone(),
            property_id: property_id.clone(),
            value,
        });
        Ok(())
    }

    pub(crate) fn is_read_only(&self, item_id: &ItemId, property_id: &PropertyId) -> bool {
        self.state
            .read()
            .read_only
            .contains(&(item_id.clone(), property_id.clone()))
    }

    /// Flags or unflags a cell. Flags for missing items or properties are
    /// ignored.
    pub(crate) fn set_read_only(
        &self,
        item_id: &ItemId,
        property_id: &PropertyId,
        read_only: bool,
    ) {
        let mut state = self.state.write();
        let key = (item_id.clone(), property_id.clone());
        if !read_only {
            state.read_only.remove(&key);
        } else if state.records.contains_key(item_id) && state.schema.contains(property_id) {
            state.read_only.insert(key);
        }
    }

    // =========================================================================
    // Filtering
    // =========================================================================

    /// Registers a filter and recomputes the visible sequence.
    ///
    /// Fails with [`ContainerError::UnsupportedFilter`] if the filter cannot
    /// be evaluated.
    pub fn add_filter(&self, filter: impl Filter + 'static) -> Result<FilterId> {
        if let Err(e) = filter.check_supported() {
            tracing::warn!(target: targets::FILTER, error = %e, "filter rejected");
            return Err(e);
        }
        Ok(self.install_filter(Box::new(filter)))
    }

    /// Registers a [`SimpleStringFilter`].
    pub fn add_string_filter(
        &self,
        property_id: impl Into<PropertyId>,
        needle: impl Into<String>,
        ignore_case: bool,
        only_prefix: bool,
    ) -> FilterId {
        self.install_filter(Box::new(SimpleStringFilter::new(
            property_id,
            needle,
            ignore_case,
            only_prefix,
        )))
    }

    fn install_filter(&self, filter: Box<dyn Filter>) -> FilterId {
        let mut state = self.state.write();
        let id = state.filters.insert(filter);
        let changed = state.refilter();
        drop(state);

        tracing::debug!(target: targets::FILTER, ?id, "filter added");
        if changed {
            self.fire_item_set_change(ItemSetChange::Changed);
        }
        id
    }

    /// Unregisters a filter. Returns `false` if the id is unknown.
    pub fn remove_filter(&self, id: FilterId) -> bool {
        let mut state = self.state.write();
        if state.filters.remove(id).is_none() {
            return false;
        }
        let changed = state.refilter();
        drop(state);

        tracing::debug!(target: targets::FILTER, ?id, "filter removed");
        if changed {
            self.fire_item_set_change(ItemSetChange::Changed);
        }
        true
    }

    /// Unregisters every filter that depends on `property_id`. Returns the
    /// number of filters removed.
    pub fn remove_filters_for(&self, property_id: &PropertyId) -> usize {
        let mut state = self.state.write();
        let before = state.filters.len();
        state.filters.retain(|_, f| !f.applies_to_property(property_id));
        let removed = before - state.filters.len();
        let changed = removed > 0 && state.refilter();
        drop(state);

        tracing::debug!(
            target: targets::FILTER,
            property = %property_id,
            removed,
            "filters removed"
        );
        if changed {
            self.fire_item_set_change(ItemSetChange::Changed);
        }
        removed
    }

    pub fn remove_all_filters(&self) {
        let mut state = self.state.write();
        if state.filters.is_empty() {
            return;
        }
        state.filters.clear();
        let changed = state.refilter();
        drop(state);

        tracing::debug!(target: targets::FILTER, "all filters removed");
        if changed {
            self.fire_item_set_change(ItemSetChange::Changed);
        }
    }

    pub fn has_filters(&self) -> bool {
        !self.state.read().filters.is_empty()
    }

    pub fn filter_count(&self) -> usize {
        self.state.read().filters.len()
    }

    /// Returns `true` if a registered filter depends on `property_id`.
    pub fn is_property_filtered(&self, property_id: &PropertyId) -> bool {
        self.state.read().is_property_filtered(property_id)
    }

    // =========================================================================
    // Sorting
    // =========================================================================

    /// Stable multi-key sort of the full sequence.
    ///
    /// `ascending[i]` gives the direction of `property_ids[i]`; ids that are
    /// not registered are skipped. The visible sequence is recomputed and an
    /// [`ItemSetChange::Changed`] event fires.
    pub fn sort(&self, property_ids: &[PropertyId], ascending: &[bool]) -> Result<()> {
        if property_ids.len() != ascending.len() {
            return Err(ContainerError::SortLengthMismatch {
                properties: property_ids.len(),
                directions: ascending.len(),
            });
        }

        let _span = PerfSpan::new(span_names::SORT);
        let mut state = self.state.write();
        let keys: Vec<SortKey> = property_ids
            .iter()
            .zip(ascending)
            .filter(|(id, _)| state.schema.contains(id))
            .map(|(id, &ascending)| SortKey {
                property_id: id.clone(),
                ascending,
            })
            .collect();

        let ContainerState {
            all_ids,
            records,
            sorter,
            ..
        } = &mut *state;
        all_ids.sort_by(|a, b| match (records.get(a), records.get(b)) {
            (Some(ra), Some(rb)) => {
                sorter.compare(&keys, &ItemValues::new(a, ra), &ItemValues::new(b, rb))
            }
            _ => std::cmp::Ordering::Equal,
        });
        state.refilter();
        let items = state.all_ids.len();
        drop(state);

        tracing::debug!(target: targets::SORT, keys = keys.len(), items, "items sorted");
        self.fire_item_set_change(ItemSetChange::Changed);
        Ok(())
    }

    /// Replaces the comparator used by [`sort`](Self::sort).
    pub fn set_item_sorter(&self, sorter: impl ItemSorter + 'static) {
        self.state.write().sorter = Box::new(sorter);
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    pub fn add_item_set_change_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ItemSetChange) + Send + Sync + 'static,
    {
        let connection = self.item_set_changed.connect(listener);
        self.registrations.lock().insert(Registration::ItemSet(connection))
    }

    pub fn remove_item_set_change_listener(&self, id: ListenerId) -> bool {
        let mut registrations = self.registrations.lock();
        match registrations.get(id) {
            Some(&Registration::ItemSet(connection)) => {
                registrations.remove(id);
                self.item_set_changed.disconnect(connection)
            }
            _ => false,
        }
    }

    pub fn item_set_change_listener_count(&self) -> usize {
        self.item_set_changed.connection_count()
    }

    pub fn add_property_set_change_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&PropertySetChange) + Send + Sync + 'static,
    {
        let connection = self.property_set_changed.connect(listener);
        self.registrations.lock().insert(Registration::PropertySet(connection))
    }

    pub fn remove_property_set_change_listener(&self, id: ListenerId) -> bool {
        let mut registrations = self.registrations.lock();
        match registrations.get(id) {
            Some(&Registration::PropertySet(connection)) => {
                registrations.remove(id);
                self.property_set_changed.disconnect(connection)
            }
            _ => false,
        }
    }

    pub fn property_set_change_listener_count(&self) -> usize {
        self.property_set_changed.connection_count()
    }

    /// Registers a listener for writes to any cell. Listeners scoped to a
    /// single cell are registered through [`Property`].
    pub fn add_value_change_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ValueChange) + Send + Sync + 'static,
    {
        let connection = self.value_changed.connect(listener);
        self.registrations.lock().insert(Registration::Value(connection))
    }

    /// Unregisters a listener added with
    /// [`add_value_change_listener`](Self::add_value_change_listener).
    /// Cell-scoped ids are rejected.
    pub fn remove_value_change_listener(&self, id: ListenerId) -> bool {
        let mut registrations = self.registrations.lock();
        match registrations.get(id) {
            Some(&Registration::Value(connection)) => {
                registrations.remove(id);
                self.value_changed.disconnect(connection)
            }
            _ => false,
        }
    }

    pub fn value_change_listener_count(&self) -> usize {
        self.value_changed.connection_count()
    }

    /// Number of listeners scoped to one cell.
    pub fn cell_listener_count(&self, item_id: &ItemId, property_id: &PropertyId) -> usize {
        self.cell_listeners
            .lock()
            .get(property_id)
            .and_then(|by_item| by_item.get(item_id))
            .map_or(0, Signal::connection_count)
    }

    pub(crate) fn add_cell_listener<F>(
        &self,
        item_id: &ItemId,
        property_id: &PropertyId,
        listener: F,
    ) -> ListenerId
    where
        F: Fn(&ValueChange) + Send + Sync + 'static,
    {
        let mut registrations = self.registrations.lock();
        let connection = self
            .cell_listeners
            .lock()
            .entry(property_id.clone())
            .or_default()
            .entry(item_id.clone())
            .or_default()
            .connect(listener);
        registrations.insert(Registration::Cell {
            item_id: item_id.clone(),
            property_id: property_id.clone(),
            connection,
        })
    }

    /// Disconnects a scoped listener, pruning buckets left empty.
    ///
    /// Returns `false` without changes unless `id` was registered on this
    /// exact cell.
    pub(crate) fn remove_cell_listener(
        &self,
        item_id: &ItemId,
        property_id: &PropertyId,
        id: ListenerId,
    ) -> bool {
        let mut registrations = self.registrations.lock();
        let connection = match registrations.get(id) {
            Some(Registration::Cell { item_id: owner, property_id: owner_property, connection })
                if owner == item_id && owner_property == property_id =>
            {
                *connection
            }
            _ => return false,
        };
        registrations.remove(id);

        let mut cells = self.cell_listeners.lock();
        let Some(by_item) = cells.get_mut(property_id) else {
            return false;
        };
        let Some(signal) = by_item.get(item_id) else {
            return false;
        };
        let removed = signal.disconnect(connection);
        if signal.connection_count() == 0 {
            by_item.remove(item_id);
        }
        if by_item.is_empty() {
            cells.remove(property_id);
        }
        removed
    }

    /// (property buckets, cell buckets) currently allocated for scoped
    /// listeners.
    #[cfg(test)]
    pub(crate) fn cell_bucket_counts(&self) -> (usize, usize) {
        let cells = self.cell_listeners.lock();
        (cells.len(), cells.values().map(HashMap::len).sum())
    }

    fn notify_item_set(&self, event: Option<ItemSetChange>) {
        if let Some(event) = event {
            self.fire_item_set_change(event);
        }
    }

    fn fire_item_set_change(&self, event: ItemSetChange) {
        tracing::trace!(target: targets::CONTAINER, ?event, "item set changed");
        self.item_set_changed.emit(event);
    }

    /// Both listener lists are captured before either is invoked.
    fn fire_value_change(&self, event: ValueChange) {
        let global = self.value_changed.snapshot();
        let scoped = self
            .cell_listeners
            .lock()
            .get(&event.property_id)
            .and_then(|by_item| by_item.get(&event.item_id))
            .map(Signal::snapshot);

        tracing::trace!(
            target: targets::CONTAINER,
            item = %event.item_id,
            property = %event.property_id,
            "value changed"
        );
        global.emit(&event);
        if let Some(scoped) = scoped {
            scoped.emit(&event);
        }
    }
}

impl fmt::Debug for IndexedContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("IndexedContainer")
            .field("properties", &state.schema.ids())
            .field("items", &state.all_ids.len())
            .field("visible", &state.visible_ids().len())
            .field("filters", &state.filters.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::container::Compare;

    fn collect_item_set(container: &IndexedContainer) -> Arc<Mutex<Vec<ItemSetChange>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        container.add_item_set_change_listener(move |e| sink.lock().push(e.clone()));
        events
    }

    fn ids(names: &[&str]) -> Vec<ItemId> {
        names.iter().map(|&name| ItemId::from(name)).collect()
    }

    fn numbered(values: &[i64]) -> IndexedContainer {
        let container = IndexedContainer::new();
        container.add_property("n", ValueType::Int, None).unwrap();
        for &n in values {
            let id = container.add_item().unwrap();
            container.set_value(&id, &"n".into(), Some(n.into())).unwrap();
        }
        container
    }

    #[test]
    fn test_generated_ids_skip_existing() {
        let container = IndexedContainer::new();
        container.add_item_with_id(2);
        assert_eq!(container.add_item(), Some(ItemId::from(1)));
        assert_eq!(container.add_item(), Some(ItemId::from(3)));
    }

    #[test]
    fn test_first_generated_id_from_config() {
        let config = ContainerConfig {
            first_generated_id: 100,
            ..ContainerConfig::default()
        };
        let container = IndexedContainer::with_config(config);
        assert_eq!(container.add_item(), Some(ItemId::from(100)));
    }

    #[test]
    fn test_with_item_ids_skips_duplicates() {
        let container = IndexedContainer::with_item_ids(["a", "b", "a", "c"]);
        assert_eq!(container.item_ids(), ids(&["a", "b", "c"]));
    }

    #[test]
    fn test_add_item_fires_at_last_visible_index() {
        let container = numbered(&[1, 2]);
        let events = collect_item_set(&container);
        container.add_item_with_id("x");
        assert_eq!(
            events.lock().as_slice(),
            &[ItemSetChange::ItemAdded {
                index: 2,
                item_id: "x".into()
            }]
        );
    }

    #[test]
    fn test_add_item_hidden_by_filter_fires_nothing() {
        let container = numbered(&[1]);
        container.add_filter(Compare::greater("n", 0)).unwrap();
        let events = collect_item_set(&container);

        container.add_item_with_id("x");
        assert!(events.lock().is_empty());
        assert_eq!(container.len(), 1);
        assert_eq!(container.unfiltered_len(), 2);
    }

    #[test]
    fn test_add_item_after_and_at() {
        let container = IndexedContainer::with_item_ids(["a", "c"]);
        let events = collect_item_set(&container);

        assert!(container.add_item_after(Some(&"a".into()), "b").is_some());
        assert!(container.add_item_after(None, "start").is_some());
        assert!(container.add_item_at(4, "end").is_some());
        assert!(container.add_item_at(9, "far").is_none());
        assert!(container.add_item_after(Some(&"missing".into()), "z").is_none());
        assert!(container.add_item_at(0, "a").is_none());

        assert_eq!(container.item_ids(), ids(&["start", "a", "b", "c", "end"]));
        let indexes: Vec<_> = events
            .lock()
            .iter()
            .filter_map(ItemSetChange::added_item_index)
            .collect();
        assert_eq!(indexes, vec![1, 0, 4]);
    }

    #[test]
    fn test_positioned_add_while_filtered_fires_changed() {
        let container = numbered(&[1, 2]);
        container.add_filter(Compare::greater_or_equal("n", 1)).unwrap();
        let events = collect_item_set(&container);

        // New items have a null `n` and are filtered out, so nothing changes.
        let id = container.add_generated_item_at(0).unwrap();
        assert!(events.lock().is_empty());
        assert!(!container.contains_id(&id));
        assert!(container.contains_unfiltered_id(&id));

        container.remove_all_filters();
        assert_eq!(events.lock().as_slice(), &[ItemSetChange::Changed]);
        assert_eq!(container.first_item_id(), Some(id));
    }

    #[test]
    fn test_add_after_requires_visible_previous() {
        let container = numbered(&[1, 2]);
        container.add_filter(Compare::equal("n", 2)).unwrap();
        assert!(container.add_generated_item_after(Some(&ItemId::from(1))).is_none());
        assert!(container.add_generated_item_after(Some(&ItemId::from(2))).is_some());
    }

    #[test]
    fn test_remove_item_reports_visible_index() {
        let container = IndexedContainer::with_item_ids(["a", "b", "c"]);
        let events = collect_item_set(&container);
        assert!(container.remove_item(&"b".into()));
        assert!(!container.remove_item(&"b".into()));
        assert_eq!(
            events.lock().as_slice(),
            &[ItemSetChange::ItemRemoved {
                index: 1,
                item_id: "b".into()
            }]
        );
    }

    #[test]
    fn test_remove_all_items() {
        let container = IndexedContainer::with_item_ids(["a", "b"]);
        let events = collect_item_set(&container);
        assert!(container.remove_all_items());
        assert!(container.remove_all_items());
        assert!(container.is_empty());
        assert_eq!(
            events.lock().as_slice(),
            &[ItemSetChange::ItemsRemoved {
                first_index: 0,
                first_item_id: "a".into(),
                count: 2
            }]
        );
    }

    #[test]
    fn test_navigation() {
        let container = IndexedContainer::with_item_ids(["a", "b", "c"]);
        let b = ItemId::from("b");
        assert_eq!(container.next_item_id(&b), Some("c".into()));
        assert_eq!(container.prev_item_id(&b), Some("a".into()));
        assert_eq!(container.prev_item_id(&"a".into()), None);
        assert_eq!(container.next_item_id(&"c".into()), None);
        assert!(container.is_first_id(&"a".into()));
        assert!(container.is_last_id(&"c".into()));
        assert_eq!(container.id_by_index(1), Some(b));
        assert_eq!(container.item_ids_range(1, 5), ids(&["b", "c"]));
    }

    #[test]
    fn test_default_is_written_to_existing_items() {
        let container = IndexedContainer::with_item_ids(["a", "b"]);
        let values = Arc::new(Mutex::new(Vec::new()));
        let sink = values.clone();
        container.add_value_change_listener(move |e| sink.lock().push(e.item_id.clone()));

        assert!(container.add_property("flag", ValueType::Bool, Some(true.into())).unwrap());
        assert_eq!(*values.lock(), ids(&["a", "b"]));

        let c = container.add_item_with_id("c").unwrap();
        assert_eq!(c.value(&"flag".into()), Some(Value::from(true)));
    }

    #[test]
    fn test_default_must_match_type() {
        let container = IndexedContainer::new();
        let result = container.add_property("n", ValueType::Int, Some("one".into()));
        assert!(matches!(result, Err(ContainerError::TypeMismatch { .. })));
        assert!(container.property_ids().is_empty());
    }

    #[test]
    fn test_set_value_refilters() {
        let container = numbered(&[1, 5]);
        container.add_filter(Compare::greater("n", 3)).unwrap();
        assert_eq!(container.item_ids(), vec![ItemId::from(2)]);

        let events = collect_item_set(&container);
        container
            .set_value(&ItemId::from(1), &"n".into(), Some(10.into()))
            .unwrap();
        assert_eq!(container.item_ids(), vec![ItemId::from(1), ItemId::from(2)]);
        assert_eq!(events.lock().as_slice(), &[ItemSetChange::Changed]);
    }

    #[test]
    fn test_set_value_unknown_targets() {
        let container = numbered(&[1]);
        assert!(matches!(
            container.set_value(&"nope".into(), &"n".into(), None),
            Err(ContainerError::ItemNotFound(_))
        ));
        assert!(matches!(
            container.set_value(&ItemId::from(1), &"nope".into(), None),
            Err(ContainerError::PropertyNotFound(_))
        ));
    }

    #[test]
    fn test_read_only_flags_are_purged() {
        let container = numbered(&[1]);
        let id = ItemId::from(1);
        let cell = container.container_property(&id, &"n".into()).unwrap();
        cell.set_read_only(true);
        assert!(cell.is_read_only());

        container.remove_property(&"n".into());
        container.add_property("n", ValueType::Int, None).unwrap();
        assert!(!container.is_read_only(&id, &"n".into()));
        assert!(container.set_value(&id, &"n".into(), Some(2.into())).is_ok());
    }

    #[test]
    fn test_cell_listener_buckets_are_pruned() {
        let container = numbered(&[1, 2]);
        let p1 = container.container_property(&ItemId::from(1), &"n".into()).unwrap();
        let p2 = container.container_property(&ItemId::from(2), &"n".into()).unwrap();

        let a = p1.add_value_change_listener(|_| {});
        let b = p1.add_value_change_listener(|_| {});
        let c = p2.add_value_change_listener(|_| {});
        assert_eq!(container.cell_bucket_counts(), (1, 2));
        assert_eq!(container.cell_listener_count(&ItemId::from(1), &"n".into()), 2);

        assert!(p1.remove_value_change_listener(a));
        assert_eq!(container.cell_bucket_counts(), (1, 2));
        assert!(p1.remove_value_change_listener(b));
        assert_eq!(container.cell_bucket_counts(), (1, 1));
        assert!(p2.remove_value_change_listener(c));
        assert_eq!(container.cell_bucket_counts(), (0, 0));
        assert!(!p2.remove_value_change_listener(c));
    }

    #[test]
    fn test_remove_filters_for_property() {
        let container = numbered(&[1, 2, 3]);
        container.add_property("s", ValueType::Text, None).unwrap();
        container.add_filter(Compare::greater("n", 1)).unwrap();
        container.add_string_filter("s", "", false, false);
        assert_eq!(container.filter_count(), 2);
        assert!(container.is_empty());

        assert_eq!(container.remove_filters_for(&"s".into()), 1);
        assert_eq!(container.len(), 2);
        assert!(container.is_property_filtered(&"n".into()));
        assert!(!container.is_property_filtered(&"s".into()));
    }

    #[test]
    fn test_sort_ignores_unknown_properties() {
        let container = numbered(&[3, 1, 2]);
        container
            .sort(&["unknown".into(), "n".into()], &[true, false])
            .unwrap();
        assert_eq!(
            container.item_ids(),
            vec![ItemId::from(1), ItemId::from(3), ItemId::from(2)]
        );
    }

    #[test]
    fn test_custom_sorter() {
        struct ById;
        impl ItemSorter for ById {
            fn compare(
                &self,
                _keys: &[SortKey],
                a: &ItemValues<'_>,
                b: &ItemValues<'_>,
            ) -> std::cmp::Ordering {
                b.id().cmp(a.id())
            }
        }

        let container = IndexedContainer::with_item_ids([1, 2, 3]);
        container.set_item_sorter(ById);
        container.sort(&[], &[]).unwrap();
        assert_eq!(container.first_item_id(), Some(ItemId::from(3)));
    }
}
