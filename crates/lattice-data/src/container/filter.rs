//! Item filters.
//!
//! A container's visible sequence holds the items that pass every registered
//! [`Filter`]. Filters see an item through [`ItemValues`], a read-only view of
//! its stored values, and report which properties they depend on so the
//! container knows when a value write requires re-filtering.
//!
//! # Example
//!
//! ```
//! use lattice_data::container::{Compare, IndexedContainer, ValueType};
//!
//! let container = IndexedContainer::new();
//! container.add_property("age", ValueType::Int, None).unwrap();
//! for age in [15, 30, 45] {
//!     let id = container.add_item().unwrap();
//!     container.set_value(&id, &"age".into(), Some(age.into())).unwrap();
//! }
//!
//! container.add_filter(Compare::greater_or_equal("age", 18)).unwrap();
//! assert_eq!(container.len(), 2);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use super::id::{ItemId, PropertyId};
use super::schema::Record;
use super::sorter::natural_order;
use super::value::Value;
use crate::error::{ContainerError, Result};

slotmap::new_key_type! {
    /// Handle for a registered filter.
    pub struct FilterId;
}

/// Read-only view of one item's stored values.
#[derive(Debug, Clone, Copy)]
pub struct ItemValues<'a> {
    id: &'a ItemId,
    record: &'a Record,
}

impl<'a> ItemValues<'a> {
    pub(crate) fn new(id: &'a ItemId, record: &'a Record) -> Self {
        Self { id, record }
    }

    /// The item's id.
    pub fn id(&self) -> &'a ItemId {
        self.id
    }

    /// The stored value of `property_id`, `None` if null.
    pub fn value(&self, property_id: &PropertyId) -> Option<&'a Value> {
        self.record.get(property_id)
    }
}

/// Predicate deciding whether an item is visible.
///
/// Filters run while the container is locked and must not call back into it.
pub trait Filter: Send + Sync {
    /// Returns `true` if the item should be visible.
    fn passes(&self, item: &ItemValues<'_>) -> bool;

    /// Returns `true` if the outcome of [`passes`](Self::passes) may depend on
    /// `property_id`.
    fn applies_to_property(&self, property_id: &PropertyId) -> bool;

    /// Verifies that the filter can be evaluated. Registration fails with the
    /// returned error.
    fn check_supported(&self) -> Result<()> {
        Ok(())
    }
}

impl<F: Filter + ?Sized> Filter for Box<F> {
    fn passes(&self, item: &ItemValues<'_>) -> bool {
        (**self).passes(item)
    }

    fn applies_to_property(&self, property_id: &PropertyId) -> bool {
        (**self).applies_to_property(property_id)
    }

    fn check_supported(&self) -> Result<()> {
        (**self).check_supported()
    }
}

/// Text match on the string form of a property value.
///
/// Null values never pass.
#[derive(Debug, Clone)]
pub struct SimpleStringFilter {
    property_id: PropertyId,
    needle: String,
    ignore_case: bool,
    only_prefix: bool,
}

impl SimpleStringFilter {
    /// Matches values containing `needle`, or starting with it when
    /// `only_prefix` is set.
    pub fn new(
        property_id: impl Into<PropertyId>,
        needle: impl Into<String>,
        ignore_case: bool,
        only_prefix: bool,
    ) -> Self {
        let needle = needle.into();
        Self {
            property_id: property_id.into(),
            needle: if ignore_case { needle.to_lowercase() } else { needle },
            ignore_case,
            only_prefix,
        }
    }

    pub fn property_id(&self) -> &PropertyId {
        &self.property_id
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    pub fn only_prefix(&self) -> bool {
        self.only_prefix
    }
}

impl Filter for SimpleStringFilter {
    fn passes(&self, item: &ItemValues<'_>) -> bool {
        let Some(value) = item.value(&self.property_id) else {
            return false;
        };
        let mut text = value.to_string();
        if self.ignore_case {
            text = text.to_lowercase();
        }
        if self.only_prefix {
            text.starts_with(&self.needle)
        } else {
            text.contains(&self.needle)
        }
    }

    fn applies_to_property(&self, property_id: &PropertyId) -> bool {
        self.property_id == *property_id
    }
}

/// Comparison operator used by [`Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
}

/// Compares a property value against a fixed operand.
///
/// Null sorts below every value: a null cell equals only a null operand and
/// is less than any present one. Values of incomparable kinds never pass.
#[derive(Debug, Clone)]
pub struct Compare {
    property_id: PropertyId,
    op: CompareOp,
    operand: Option<Value>,
}

impl Compare {
    pub fn new(op: CompareOp, property_id: impl Into<PropertyId>, operand: Option<Value>) -> Self {
        Self {
            property_id: property_id.into(),
            op,
            operand,
        }
    }

    pub fn equal(property_id: impl Into<PropertyId>, operand: impl Into<Value>) -> Self {
        Self::new(CompareOp::Equal, property_id, Some(operand.into()))
    }

    pub fn greater(property_id: impl Into<PropertyId>, operand: impl Into<Value>) -> Self {
        Self::new(CompareOp::Greater, property_id, Some(operand.into()))
    }

    pub fn less(property_id: impl Into<PropertyId>, operand: impl Into<Value>) -> Self {
        Self::new(CompareOp::Less, property_id, Some(operand.into()))
    }

    pub fn greater_or_equal(property_id: impl Into<PropertyId>, operand: impl Into<Value>) -> Self {
        Self::new(CompareOp::GreaterOrEqual, property_id, Some(operand.into()))
    }

    pub fn less_or_equal(property_id: impl Into<PropertyId>, operand: impl Into<Value>) -> Self {
        Self::new(CompareOp::LessOrEqual, property_id, Some(operand.into()))
    }

    pub fn op(&self) -> CompareOp {
        self.op
    }

    pub fn operand(&self) -> Option<&Value> {
        self.operand.as_ref()
    }
}

impl Filter for Compare {
    fn passes(&self, item: &ItemValues<'_>) -> bool {
        let ord = match (item.value(&self.property_id), self.operand.as_ref()) {
            (None, None) => Some(Ordering::Equal),
            (None, Some(_)) => Some(Ordering::Less),
            (Some(_), None) => Some(Ordering::Greater),
            (Some(cell), Some(operand)) => natural_order(cell, operand),
        };
        let Some(ord) = ord else {
            return false;
        };
        match self.op {
            CompareOp::Equal => ord == Ordering::Equal,
            CompareOp::Greater => ord == Ordering::Greater,
            CompareOp::Less => ord == Ordering::Less,
            CompareOp::GreaterOrEqual => ord != Ordering::Less,
            CompareOp::LessOrEqual => ord != Ordering::Greater,
        }
    }

    fn applies_to_property(&self, property_id: &PropertyId) -> bool {
        self.property_id == *property_id
    }
}

/// Passes items whose property value is null.
#[derive(Debug, Clone)]
pub struct IsNull {
    property_id: PropertyId,
}

impl IsNull {
    pub fn new(property_id: impl Into<PropertyId>) -> Self {
        Self {
            property_id: property_id.into(),
        }
    }
}

impl Filter for IsNull {
    fn passes(&self, item: &ItemValues<'_>) -> bool {
        item.value(&self.property_id).is_none()
    }

    fn applies_to_property(&self, property_id: &PropertyId) -> bool {
        self.property_id == *property_id
    }
}

/// Passes values within an inclusive range.
#[derive(Debug, Clone)]
pub struct Between {
    property_id: PropertyId,
    start: Value,
    end: Value,
}

impl Between {
    pub fn new(
        property_id: impl Into<PropertyId>,
        start: impl Into<Value>,
        end: impl Into<Value>,
    ) -> Self {
        Self {
            property_id: property_id.into(),
            start: start.into(),
            end: end.into(),
        }
    }
}

impl Filter for Between {
    fn passes(&self, item: &ItemValues<'_>) -> bool {
        let Some(value) = item.value(&self.property_id) else {
            return false;
        };
        matches!(natural_order(value, &self.start), Some(Ordering::Greater | Ordering::Equal))
            && matches!(natural_order(value, &self.end), Some(Ordering::Less | Ordering::Equal))
    }

    fn applies_to_property(&self, property_id: &PropertyId) -> bool {
        self.property_id == *property_id
    }
}

/// SQL `LIKE` match on text values: `%` matches any run of characters and
/// `_` exactly one.
#[derive(Debug, Clone)]
pub struct Like {
    property_id: PropertyId,
    pattern: String,
    regex: std::result::Result<Regex, regex::Error>,
}

impl Like {
    pub fn new(
        property_id: impl Into<PropertyId>,
        pattern: impl Into<String>,
        case_sensitive: bool,
    ) -> Self {
        let pattern = pattern.into();
        let regex = RegexBuilder::new(&like_to_regex(&pattern))
            .case_insensitive(!case_sensitive)
            .dot_matches_new_line(true)
            .build();
        Self {
            property_id: property_id.into(),
            pattern,
            regex,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 2);
    out.push('^');
    let mut buf = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            c => out.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }
    out.push('$');
    out
}

impl Filter for Like {
    fn passes(&self, item: &ItemValues<'_>) -> bool {
        let (Ok(regex), Some(Value::Text(text))) = (&self.regex, item.value(&self.property_id))
        else {
            return false;
        };
        regex.is_match(text)
    }

    fn applies_to_property(&self, property_id: &PropertyId) -> bool {
        self.property_id == *property_id
    }

    fn check_supported(&self) -> Result<()> {
        match &self.regex {
            Ok(_) => Ok(()),
            Err(e) => Err(ContainerError::unsupported_filter(format!(
                "LIKE pattern '{}' cannot be compiled: {e}",
                self.pattern
            ))),
        }
    }
}

/// Passes items accepted by every inner filter. Empty `And` passes all.
pub struct And {
    filters: Vec<Box<dyn Filter>>,
}

impl And {
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        Self { filters }
    }
}

impl Filter for And {
    fn passes(&self, item: &ItemValues<'_>) -> bool {
        self.filters.iter().all(|f| f.passes(item))
    }

    fn applies_to_property(&self, property_id: &PropertyId) -> bool {
        self.filters.iter().any(|f| f.applies_to_property(property_id))
    }

    fn check_supported(&self) -> Result<()> {
        self.filters.iter().try_for_each(|f| f.check_supported())
    }
}

/// Passes items accepted by at least one inner filter. Empty `Or` passes none.
pub struct Or {
    filters: Vec<Box<dyn Filter>>,
}

impl Or {
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        Self { filters }
    }
}

impl Filter for Or {
    fn passes(&self, item: &ItemValues<'_>) -> bool {
        self.filters.iter().any(|f| f.passes(item))
    }

    fn applies_to_property(&self, property_id: &PropertyId) -> bool {
        self.filters.iter().any(|f| f.applies_to_property(property_id))
    }

    fn check_supported(&self) -> Result<()> {
        self.filters.iter().try_for_each(|f| f.check_supported())
    }
}

/// Inverts an inner filter.
pub struct Not {
    filter: Box<dyn Filter>,
}

impl Not {
    pub fn new(filter: impl Filter + 'static) -> Self {
        Self {
            filter: Box::new(filter),
        }
    }
}

impl Filter for Not {
    fn passes(&self, item: &ItemValues<'_>) -> bool {
        !self.filter.passes(item)
    }

    fn applies_to_property(&self, property_id: &PropertyId) -> bool {
        self.filter.applies_to_property(property_id)
    }

    fn check_supported(&self) -> Result<()> {
        self.filter.check_supported()
    }
}

/// Type alias for the closure wrapped by [`PredicateFilter`].
pub type PredicateFn = Arc<dyn Fn(Option<&Value>) -> bool + Send + Sync>;

/// Filter defined by a closure over one property's value.
#[derive(Clone)]
pub struct PredicateFilter {
    property_id: PropertyId,
    predicate: PredicateFn,
}

impl PredicateFilter {
    pub fn new<F>(property_id: impl Into<PropertyId>, predicate: F) -> Self
    where
        F: Fn(Option<&Value>) -> bool + Send + Sync + 'static,
    {
        Self {
            property_id: property_id.into(),
            predicate: Arc::new(predicate),
        }
    }
}

impl fmt::Debug for PredicateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateFilter")
            .field("property_id", &self.property_id)
            .finish_non_exhaustive()
    }
}

impl Filter for PredicateFilter {
    fn passes(&self, item: &ItemValues<'_>) -> bool {
        (self.predicate)(item.value(&self.property_id))
    }

    fn applies_to_property(&self, property_id: &PropertyId) -> bool {
        self.property_id == *property_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs.iter().map(|(k, v)| (PropertyId::from(*k), v.clone())).collect()
    }

    fn check(filter: &dyn Filter, record: &Record) -> bool {
        let id = ItemId::from(1);
        filter.passes(&ItemValues::new(&id, record))
    }

    #[test]
    fn test_string_filter_prefix_and_case() {
        let r = record(&[("name", Value::from("FooBar"))]);
        assert!(check(&SimpleStringFilter::new("name", "foo", true, true), &r));
        assert!(!check(&SimpleStringFilter::new("name", "foo", false, true), &r));
        assert!(!check(&SimpleStringFilter::new("name", "bar", true, true), &r));
        assert!(check(&SimpleStringFilter::new("name", "bar", true, false), &r));
    }

    #[test]
    fn test_string_filter_stringifies_and_rejects_null() {
        let r = record(&[("n", Value::from(1234))]);
        assert!(check(&SimpleStringFilter::new("n", "23", false, false), &r));
        assert!(!check(&SimpleStringFilter::new("missing", "", false, false), &r));
    }

    #[test]
    fn test_compare_null_semantics() {
        let empty = Record::new();
        assert!(!check(&Compare::equal("a", 1), &empty));
        assert!(check(&Compare::less("a", 1), &empty));
        assert!(check(&Compare::new(CompareOp::Equal, "a", None), &empty));

        let r = record(&[("a", Value::from(5))]);
        assert!(check(&Compare::greater("a", 4.5), &r));
        assert!(check(&Compare::less_or_equal("a", 5), &r));
        assert!(!check(&Compare::equal("a", "5"), &r));
    }

    #[test]
    fn test_between_is_inclusive() {
        let filter = Between::new("a", 1, 3);
        assert!(check(&filter, &record(&[("a", Value::from(1))])));
        assert!(check(&filter, &record(&[("a", Value::from(3))])));
        assert!(!check(&filter, &record(&[("a", Value::from(4))])));
        assert!(!check(&filter, &Record::new()));
    }

    #[test]
    fn test_like_wildcards() {
        let r = record(&[("name", Value::from("Hello.World"))]);
        assert!(check(&Like::new("name", "Hello%", true), &r));
        assert!(check(&Like::new("name", "hello_world", false), &r));
        assert!(!check(&Like::new("name", "hello%", true), &r));
        assert!(!check(&Like::new("name", "Hello", true), &r));
        assert!(Like::new("name", "a.b", true).check_supported().is_ok());
    }

    #[test]
    fn test_composites() {
        let r = record(&[("a", Value::from(2)), ("b", Value::from("x"))]);
        let both = And::new(vec![Box::new(Compare::equal("a", 2)), Box::new(IsNull::new("c"))]);
        assert!(check(&both, &r));
        assert!(both.applies_to_property(&"c".into()));

        let either = Or::new(vec![
            Box::new(Compare::equal("a", 3)),
            Box::new(Compare::equal("b", "x")),
        ]);
        assert!(check(&either, &r));
        assert!(!check(&Or::new(Vec::new()), &r));
        assert!(!check(&Not::new(IsNull::new("c")), &r));
    }

    #[test]
    fn test_predicate_filter() {
        let even =
            PredicateFilter::new("a", |v| v.and_then(Value::as_int).is_some_and(|n| n % 2 == 0));
        assert!(check(&even, &record(&[("a", Value::from(4))])));
        assert!(!check(&even, &record(&[("a", Value::from(3))])));
        assert!(!even.applies_to_property(&"b".into()));
    }
}
