//! Item ordering used by [`IndexedContainer::sort`](super::IndexedContainer::sort).

use std::cmp::Ordering;

use super::filter::ItemValues;
use super::id::PropertyId;
use super::value::Value;
use crate::config::NullOrdering;

/// One sort criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Property whose values are compared.
    pub property_id: PropertyId,
    /// `true` for ascending order.
    pub ascending: bool,
}

impl SortKey {
    /// Creates an ascending key.
    pub fn ascending(property_id: impl Into<PropertyId>) -> Self {
        Self {
            property_id: property_id.into(),
            ascending: true,
        }
    }

    /// Creates a descending key.
    pub fn descending(property_id: impl Into<PropertyId>) -> Self {
        Self {
            property_id: property_id.into(),
            ascending: false,
        }
    }
}

/// Compares two items under a list of sort keys.
///
/// The container sorts with a stable algorithm, so returning
/// [`Ordering::Equal`] keeps the items in their current relative order.
/// Implementations run while the container is locked and must not call back
/// into it.
pub trait ItemSorter: Send + Sync {
    /// Orders `a` relative to `b`. `keys` only contains registered properties.
    fn compare(&self, keys: &[SortKey], a: &ItemValues<'_>, b: &ItemValues<'_>) -> Ordering;
}

/// Sorter used when none is installed.
///
/// Keys are applied in order; the first non-equal comparison wins. Values of
/// the same kind compare naturally, `Int` and `Float` compare numerically and
/// other mixed pairs fall back to a fixed kind rank. Null placement follows
/// [`NullOrdering`] and flips with descending keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultItemSorter {
    null_ordering: NullOrdering,
}

impl DefaultItemSorter {
    /// Creates a sorter with the given null placement.
    pub fn new(null_ordering: NullOrdering) -> Self {
        Self { null_ordering }
    }

    /// Compares two cells, either of which may be null.
    pub fn compare_values(&self, a: Option<&Value>, b: Option<&Value>) -> Ordering {
        let nulls_first = self.null_ordering == NullOrdering::First;
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) if nulls_first => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) if nulls_first => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => {
                natural_order(a, b).unwrap_or_else(|| kind_rank(a).cmp(&kind_rank(b)))
            }
        }
    }
}

impl ItemSorter for DefaultItemSorter {
    fn compare(&self, keys: &[SortKey], a: &ItemValues<'_>, b: &ItemValues<'_>) -> Ordering {
        for key in keys {
            let ord = self.compare_values(a.value(&key.property_id), b.value(&key.property_id));
            let ord = if key.ascending { ord } else { ord.reverse() };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// Natural ordering of two values, or `None` if their kinds are not
/// comparable. Floats use IEEE total ordering.
pub fn natural_order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => Some(a.total_cmp(b)),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
            let (a, b) = (a.as_number()?, b.as_number()?);
            Some(a.total_cmp(&b))
        }
        _ => None,
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => 0,
        Value::Int(_) | Value::Float(_) => 1,
        Value::Text(_) => 2,
        Value::Timestamp(_) => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nulls_first_by_default() {
        let sorter = DefaultItemSorter::default();
        let v = Value::from(1);
        assert_eq!(sorter.compare_values(None, Some(&v)), Ordering::Less);
        assert_eq!(sorter.compare_values(Some(&v), None), Ordering::Greater);
        assert_eq!(sorter.compare_values(None, None), Ordering::Equal);
    }

    #[test]
    fn test_nulls_last() {
        let sorter = DefaultItemSorter::new(NullOrdering::Last);
        let v = Value::from("x");
        assert_eq!(sorter.compare_values(None, Some(&v)), Ordering::Greater);
    }

    #[test]
    fn test_mixed_numeric_kinds() {
        assert_eq!(natural_order(&Value::from(2), &Value::from(2.5)), Some(Ordering::Less));
        assert_eq!(natural_order(&Value::from(3.0), &Value::from(3)), Some(Ordering::Equal));
        assert_eq!(natural_order(&Value::from(1), &Value::from("1")), None);
    }

    #[test]
    fn test_mixed_kinds_use_rank() {
        let sorter = DefaultItemSorter::default();
        let ord = sorter.compare_values(Some(&Value::from("a")), Some(&Value::from(10)));
        assert_eq!(ord, Ordering::Greater);
    }
}
