//! Typed values for search terms and the comparator table.

use super::Operator;
use crate::model::{EntryType, EpicsValue, Severity, Status, TagSet};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// A value on either side of a search comparison.
///
/// Entry fields are reported as `SearchValue`s by [`crate::Entry::field`],
/// and search targets are written with the `From` conversions:
///
/// ```
/// use superscore_store::SearchValue;
///
/// assert_eq!(SearchValue::from(2), SearchValue::Int(2));
/// assert_eq!(SearchValue::from("SXR"), SearchValue::Str("SXR".into()));
/// assert_eq!(SearchValue::from(None::<f64>), SearchValue::Null);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SearchValue {
    /// An unset optional field.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Tags(TagSet),
    EntryType(EntryType),
    List(Vec<SearchValue>),
}

impl SearchValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Uuid(_) => "uuid",
            Self::DateTime(_) => "datetime",
            Self::Tags(_) => "tags",
            Self::EntryType(_) => "entry type",
            Self::List(_) => "list",
        }
    }

    /// Returns the value as a string for pattern matching.
    ///
    /// Only strings and UUIDs are string-coercible.
    pub fn coerce_str(&self) -> Option<String> {
        match self {
            Self::Str(s) => Some(s.clone()),
            Self::Uuid(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for SearchValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => write!(f, "{:?}", s),
            Self::Uuid(id) => write!(f, "{}", id),
            Self::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Self::Tags(tags) => write!(f, "{:?}", tags),
            Self::EntryType(t) => write!(f, "{}", t),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for SearchValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for SearchValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for SearchValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for SearchValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for SearchValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for SearchValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Uuid> for SearchValue {
    fn from(id: Uuid) -> Self {
        Self::Uuid(id)
    }
}

impl From<DateTime<Utc>> for SearchValue {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }
}

impl From<TagSet> for SearchValue {
    fn from(tags: TagSet) -> Self {
        Self::Tags(tags)
    }
}

impl From<EntryType> for SearchValue {
    fn from(t: EntryType) -> Self {
        Self::EntryType(t)
    }
}

impl From<EpicsValue> for SearchValue {
    fn from(v: EpicsValue) -> Self {
        match v {
            EpicsValue::Bool(b) => Self::Bool(b),
            EpicsValue::Int(i) => Self::Int(i),
            EpicsValue::Float(f) => Self::Float(f),
            EpicsValue::Str(s) => Self::Str(s),
        }
    }
}

impl From<Status> for SearchValue {
    fn from(s: Status) -> Self {
        Self::Str(s.as_str().to_string())
    }
}

impl From<Severity> for SearchValue {
    fn from(s: Severity) -> Self {
        Self::Str(s.as_str().to_string())
    }
}

impl<T: Into<SearchValue>> From<Option<T>> for SearchValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

impl<T: Into<SearchValue>> From<Vec<T>> for SearchValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

/// Applies `op` to a stored field value and a search target.
///
/// `lt` and `gt` are inclusive. `like` needs the compiled pattern; calling
/// it with `pattern` unset is a malformed query. An unset stored value is
/// neither orderable nor string-coercible, so only `eq` and list `in` accept it.
pub fn compare(
    op: Operator,
    stored: &SearchValue,
    target: &SearchValue,
    pattern: Option<&Regex>,
) -> Result<bool> {
    match op {
        Operator::Eq => Ok(values_eq(stored, target)),
        Operator::Lt => less_or_equal(stored, target),
        Operator::Gt => less_or_equal(target, stored),
        Operator::In => contained_in(stored, target),
        Operator::Like => {
            let pattern = pattern
                .ok_or_else(|| Error::malformed("\"like\" requires a string pattern"))?;
            let text = stored.coerce_str().ok_or_else(|| {
                Error::malformed(format!("cannot match a pattern against a {}", stored.type_name()))
            })?;
            Ok(pattern.is_match(&text))
        }
    }
}

/// Equality with int/float coercion.
fn values_eq(a: &SearchValue, b: &SearchValue) -> bool {
    match (a, b) {
        (SearchValue::Int(x), SearchValue::Float(y)) | (SearchValue::Float(y), SearchValue::Int(x)) => {
            (*x as f64) == *y
        }
        (SearchValue::List(xs), SearchValue::List(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_eq(x, y))
        }
        _ => a == b,
    }
}

fn less_or_equal(a: &SearchValue, b: &SearchValue) -> Result<bool> {
    if let (SearchValue::Tags(a), SearchValue::Tags(b)) = (a, b) {
        return Ok(tags_subset(a, b));
    }

    let ordering = match (a, b) {
        (SearchValue::Int(x), SearchValue::Int(y)) => Some(x.cmp(y)),
        (SearchValue::Int(x), SearchValue::Float(y)) => (*x as f64).partial_cmp(y),
        (SearchValue::Float(x), SearchValue::Int(y)) => x.partial_cmp(&(*y as f64)),
        (SearchValue::Float(x), SearchValue::Float(y)) => x.partial_cmp(y),
        (SearchValue::Bool(x), SearchValue::Bool(y)) => Some(x.cmp(y)),
        (SearchValue::Str(x), SearchValue::Str(y)) => Some(x.cmp(y)),
        (SearchValue::Uuid(x), SearchValue::Uuid(y)) => Some(x.cmp(y)),
        (SearchValue::DateTime(x), SearchValue::DateTime(y)) => Some(x.cmp(y)),
        _ => {
            return Err(Error::malformed(format!(
                "cannot order a {} against a {}",
                a.type_name(),
                b.type_name()
            )))
        }
    };

    Ok(matches!(ordering, Some(Ordering::Less | Ordering::Equal)))
}

/// Every group's tags in `a` are a subset of the same group in `b`.
///
/// Groups missing on either side count as empty.
fn tags_subset(a: &TagSet, b: &TagSet) -> bool {
    let empty = BTreeSet::new();
    a.keys().chain(b.keys()).all(|group| {
        let left = a.get(group).unwrap_or(&empty);
        let right = b.get(group).unwrap_or(&empty);
        left.is_subset(right)
    })
}

fn contained_in(stored: &SearchValue, target: &SearchValue) -> Result<bool> {
    match (stored, target) {
        (_, SearchValue::List(items)) => Ok(items.iter().any(|item| values_eq(stored, item))),
        (SearchValue::Str(needle), SearchValue::Str(haystack)) => Ok(haystack.contains(needle.as_str())),
        _ => Err(Error::malformed(format!(
            "cannot test membership of a {} in a {}",
            stored.type_name(),
            target.type_name()
        ))),
    }
}
