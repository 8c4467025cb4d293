//! Compiled queries and the restartable search handle.

use super::value::compare;
use super::{Operator, SearchTerm, SearchValue};
use crate::model::{Entry, EntryType};
use crate::{Error, Result};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// A record source a [`Search`] can scan.
///
/// Backends implement this to expose their stored records, flattened, and
/// a point lookup used to walk `ancestor` links.
pub trait RecordSource {
    /// Returns every stored record, flattened.
    fn scan(&self) -> Result<Box<dyn Iterator<Item = Result<Entry>> + '_>>;

    /// Returns the record with `id`, or [`Error::NotFound`].
    fn lookup(&self, id: Uuid) -> Result<Entry>;
}

#[derive(Debug)]
enum Predicate {
    EntryType(Vec<EntryType>),
    Ancestor(Uuid),
    Field {
        attr: String,
        op: Operator,
        target: SearchValue,
        pattern: Option<Regex>,
    },
}

/// A set of search terms checked and compiled once.
///
/// Building a query validates the pseudo-attribute targets and compiles
/// `like` patterns, so a malformed query fails before any record is read.
#[derive(Debug)]
pub struct Query {
    predicates: Vec<Predicate>,
}

impl Query {
    pub fn new(terms: &[SearchTerm]) -> Result<Self> {
        let predicates = terms.iter().map(compile).collect::<Result<Vec<_>>>()?;
        Ok(Self { predicates })
    }

    /// Returns `true` if no terms were given, so every record matches.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    fn matches(&self, entry: &Entry, reach: &mut Reachability<'_>) -> Result<bool> {
        for predicate in &self.predicates {
            let matched = match predicate {
                Predicate::EntryType(types) => types.iter().any(|t| t.matches(entry)),
                Predicate::Ancestor(ancestor) => reach.contains(*ancestor, entry.uuid())?,
                Predicate::Field {
                    attr,
                    op,
                    target,
                    pattern,
                } => match entry.field(attr) {
                    Some(stored) => compare(*op, &stored, target, pattern.as_ref())?,
                    None => false,
                },
            };
            if !matched {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn compile(term: &SearchTerm) -> Result<Predicate> {
    match term.attr.as_str() {
        "entry_type" => {
            if !matches!(term.op, Operator::Eq | Operator::In) {
                return Err(Error::malformed(format!(
                    "entry_type does not support \"{}\"",
                    term.op
                )));
            }
            let types = match &term.value {
                SearchValue::EntryType(t) => vec![*t],
                SearchValue::Str(name) => vec![name.parse()?],
                SearchValue::List(items) => items
                    .iter()
                    .map(entry_type_of)
                    .collect::<Result<Vec<_>>>()?,
                other => {
                    return Err(Error::malformed(format!(
                        "entry_type target must name a type, got {}",
                        other
                    )))
                }
            };
            Ok(Predicate::EntryType(types))
        }
        "ancestor" => match (&term.op, &term.value) {
            (Operator::Eq, SearchValue::Uuid(id)) => Ok(Predicate::Ancestor(*id)),
            (Operator::Eq, SearchValue::Str(s)) => Uuid::parse_str(s)
                .map(Predicate::Ancestor)
                .map_err(|e| Error::malformed(format!("ancestor target: {}", e))),
            _ => Err(Error::malformed(
                "ancestor only supports \"eq\" against a UUID",
            )),
        },
        attr => {
            let pattern = match (&term.op, &term.value) {
                (Operator::Like, SearchValue::Str(p)) => Some(Regex::new(p)?),
                (Operator::Like, other) => {
                    return Err(Error::malformed(format!(
                        "\"like\" requires a string pattern, got {}",
                        other
                    )))
                }
                _ => None,
            };
            Ok(Predicate::Field {
                attr: attr.to_string(),
                op: term.op,
                target: term.value.clone(),
                pattern,
            })
        }
    }
}

fn entry_type_of(value: &SearchValue) -> Result<EntryType> {
    match value {
        SearchValue::EntryType(t) => Ok(*t),
        SearchValue::Str(name) => name.parse(),
        other => Err(Error::malformed(format!(
            "entry_type target must name a type, got {}",
            other
        ))),
    }
}

/// Memoized `ancestor` reachability for one pass over the records.
struct Reachability<'a> {
    source: &'a dyn RecordSource,
    cache: HashMap<Uuid, HashSet<Uuid>>,
}

impl<'a> Reachability<'a> {
    fn new(source: &'a dyn RecordSource) -> Self {
        Self {
            source,
            cache: HashMap::new(),
        }
    }

    fn contains(&mut self, ancestor: Uuid, id: Uuid) -> Result<bool> {
        if !self.cache.contains_key(&ancestor) {
            let reachable = self.gather(ancestor)?;
            self.cache.insert(ancestor, reachable);
        }
        Ok(self
            .cache
            .get(&ancestor)
            .is_some_and(|reachable| reachable.contains(&id)))
    }

    /// Walks `children` links from `ancestor`, inclusive.
    ///
    /// A missing ancestor reaches nothing. Children that cannot be
    /// resolved are counted as reachable but not expanded.
    fn gather(&self, ancestor: Uuid) -> Result<HashSet<Uuid>> {
        let mut reachable = HashSet::new();
        let start = match self.source.lookup(ancestor) {
            Ok(entry) => entry,
            Err(e) if e.is_not_found() => {
                log::debug!("ancestor {} not found, nothing is reachable", ancestor);
                return Ok(reachable);
            }
            Err(e) => return Err(e),
        };

        reachable.insert(ancestor);
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            let Some(children) = current.children() else {
                continue;
            };
            for child in children {
                let id = child.uuid();
                if !reachable.insert(id) {
                    continue;
                }
                match child.as_entry() {
                    Some(entry) => stack.push(entry.clone()),
                    None => match self.source.lookup(id) {
                        Ok(entry) => stack.push(entry),
                        Err(e) if e.is_not_found() => {}
                        Err(e) => return Err(e),
                    },
                }
            }
        }
        Ok(reachable)
    }
}

/// The lazily evaluated result of a backend search.
///
/// Each call to [`Search::iter`] re-scans the backend with a fresh
/// ancestor cache, so a `Search` can be iterated any number of times and
/// reflects the records as they are at the time of the scan.
pub struct Search<'a> {
    source: &'a dyn RecordSource,
    query: Query,
}

impl<'a> Search<'a> {
    pub fn new(source: &'a dyn RecordSource, terms: &[SearchTerm]) -> Result<Self> {
        Ok(Self {
            source,
            query: Query::new(terms)?,
        })
    }

    /// Starts a new scan.
    pub fn iter(&self) -> Result<SearchIter<'_>> {
        Ok(SearchIter {
            records: self.source.scan()?,
            query: &self.query,
            reach: Reachability::new(self.source),
        })
    }

    /// Runs a scan to completion and collects the matches.
    pub fn entries(&self) -> Result<Vec<Entry>> {
        self.iter()?.collect()
    }
}

/// One pass over the records of a [`Search`].
pub struct SearchIter<'s> {
    records: Box<dyn Iterator<Item = Result<Entry>> + 's>,
    query: &'s Query,
    reach: Reachability<'s>,
}

impl Iterator for SearchIter<'_> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        for record in self.records.by_ref() {
            let entry = match record {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e)),
            };
            match self.query.matches(&entry, &mut self.reach) {
                Ok(true) => return Some(Ok(entry)),
                Ok(false) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}
