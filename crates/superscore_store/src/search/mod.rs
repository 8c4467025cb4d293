//! Search terms and the query engine shared by every backend.
//!
//! A search is a list of `(attribute, operator, value)` terms. A record
//! matches when it satisfies all of them. Attributes are entry fields
//! looked up through [`crate::Entry::field`], plus two pseudo-attributes:
//!
//! - `entry_type`: the record's type is the target type (`eq`) or one of
//!   the listed types (`in`).
//! - `ancestor`: the record is reachable through `children` links from the
//!   target UUID, including the target itself.
//!
//! # Examples
//!
//! ```
//! use superscore_store::{Backend, Collection, MemoryBackend, Parameter, SearchTerm};
//!
//! # fn main() -> Result<(), superscore_store::Error> {
//! let backend = MemoryBackend::new();
//! let col = Collection::new("GUNB").with_child(Parameter::new("LASR:GUNB:TEST1"));
//! let col_id = col.uuid;
//! backend.save_entry(&col.into())?;
//!
//! let search = backend.search(&[
//!     SearchTerm::eq("ancestor", col_id),
//!     SearchTerm::like("pv_name", "GUNB"),
//! ])?;
//! assert_eq!(search.entries()?.len(), 1);
//! # Ok(())
//! # }
//! ```

mod query;
mod value;

pub use query::{Query, RecordSource, Search, SearchIter};
pub use value::{compare, SearchValue};

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A comparison operator.
///
/// `Lt` and `Gt` are inclusive: they test `<=` and `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Lt,
    Gt,
    In,
    Like,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Lt => "lt",
            Self::Gt => "gt",
            Self::In => "in",
            Self::Like => "like",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "eq" => Ok(Self::Eq),
            "lt" => Ok(Self::Lt),
            "gt" => Ok(Self::Gt),
            "in" => Ok(Self::In),
            "like" => Ok(Self::Like),
            other => Err(Error::malformed(format!(
                "search terms do not support operator \"{}\"",
                other
            ))),
        }
    }
}

/// One `(attribute, operator, value)` predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchTerm {
    pub attr: String,
    pub op: Operator,
    pub value: SearchValue,
}

impl SearchTerm {
    pub fn new(attr: impl Into<String>, op: Operator, value: impl Into<SearchValue>) -> Self {
        Self {
            attr: attr.into(),
            op,
            value: value.into(),
        }
    }

    /// Builds a term from an operator name, as read from user input.
    ///
    /// ```
    /// use superscore_store::{Error, SearchTerm};
    ///
    /// assert!(SearchTerm::parse("data", "lt", 5).is_ok());
    /// assert!(matches!(
    ///     SearchTerm::parse("data", "ne", 5),
    ///     Err(Error::MalformedQuery(_))
    /// ));
    /// ```
    pub fn parse(attr: impl Into<String>, op: &str, value: impl Into<SearchValue>) -> Result<Self> {
        Ok(Self::new(attr, op.parse()?, value))
    }

    pub fn eq(attr: impl Into<String>, value: impl Into<SearchValue>) -> Self {
        Self::new(attr, Operator::Eq, value)
    }

    /// Stored value `<=` target.
    pub fn lt(attr: impl Into<String>, value: impl Into<SearchValue>) -> Self {
        Self::new(attr, Operator::Lt, value)
    }

    /// Stored value `>=` target.
    pub fn gt(attr: impl Into<String>, value: impl Into<SearchValue>) -> Self {
        Self::new(attr, Operator::Gt, value)
    }

    /// Stored value is a member of the target list, or a substring of the
    /// target string.
    pub fn one_of(attr: impl Into<String>, value: impl Into<SearchValue>) -> Self {
        Self::new(attr, Operator::In, value)
    }

    /// Stored value contains a match for the regex `pattern`.
    pub fn like(attr: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(attr, Operator::Like, SearchValue::Str(pattern.into()))
    }
}

/// Expands a tolerance check into an inclusive `gt`/`lt` pair.
///
/// The window is `target ± (|target| * rel_tol + abs_tol)`.
///
/// ```
/// use superscore_store::search::{isclose, SearchValue};
///
/// let [lower, upper] = isclose("data", 10.0, 0.1, 0.5);
/// assert_eq!(lower.value, SearchValue::Float(8.5));
/// assert_eq!(upper.value, SearchValue::Float(11.5));
/// ```
pub fn isclose(attr: &str, target: f64, rel_tol: f64, abs_tol: f64) -> [SearchTerm; 2] {
    let margin = target.abs() * rel_tol + abs_tol;
    [
        SearchTerm::gt(attr, target - margin),
        SearchTerm::lt(attr, target + margin),
    ]
}
