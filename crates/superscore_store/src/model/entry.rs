//! Persistable record types.
//!
//! Every record carries a `uuid`, a free-text `description` and a
//! `creation_time`. Identity is the UUID; `PartialEq` compares every field.

use super::root::deserialize_tag_set;
use super::{EntryRef, EpicsValue, Severity, Status, TagSet};
use crate::search::SearchValue;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Describes a PV address without a recorded value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub uuid: Uuid,
    #[serde(default)]
    pub description: String,
    #[serde(default = "Utc::now")]
    pub creation_time: DateTime<Utc>,
    #[serde(default)]
    pub pv_name: String,
    #[serde(default)]
    pub abs_tolerance: Option<f64>,
    #[serde(default)]
    pub rel_tolerance: Option<f64>,
    /// The read-only channel paired with this PV.
    #[serde(default)]
    pub readback: Option<EntryRef>,
    #[serde(default)]
    pub read_only: bool,
}

impl Parameter {
    pub fn new(pv_name: impl Into<String>) -> Self {
        Self {
            pv_name: pv_name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_readback(mut self, readback: impl Into<EntryRef>) -> Self {
        self.readback = Some(readback.into());
        self
    }
}

impl Default for Parameter {
    fn default() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            description: String::new(),
            creation_time: Utc::now(),
            pv_name: String::new(),
            abs_tolerance: None,
            rel_tolerance: None,
            readback: None,
            read_only: false,
        }
    }
}

/// A writable captured value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setpoint {
    pub uuid: Uuid,
    #[serde(default)]
    pub description: String,
    #[serde(default = "Utc::now")]
    pub creation_time: DateTime<Utc>,
    #[serde(default)]
    pub pv_name: String,
    /// `None` when the PV could not be read.
    #[serde(default)]
    pub data: Option<EpicsValue>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub readback: Option<EntryRef>,
}

impl Setpoint {
    pub fn new(pv_name: impl Into<String>, data: impl Into<EpicsValue>) -> Self {
        Self {
            pv_name: pv_name.into(),
            data: Some(data.into()),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_readback(mut self, readback: impl Into<EntryRef>) -> Self {
        self.readback = Some(readback.into());
        self
    }
}

impl Default for Setpoint {
    fn default() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            description: String::new(),
            creation_time: Utc::now(),
            pv_name: String::new(),
            data: None,
            status: Status::default(),
            severity: Severity::default(),
            readback: None,
        }
    }
}

/// A read-only captured value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Readback {
    pub uuid: Uuid,
    #[serde(default)]
    pub description: String,
    #[serde(default = "Utc::now")]
    pub creation_time: DateTime<Utc>,
    #[serde(default)]
    pub pv_name: String,
    #[serde(default)]
    pub data: Option<EpicsValue>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub abs_tolerance: Option<f64>,
    #[serde(default)]
    pub rel_tolerance: Option<f64>,
    /// Settle time in seconds before the value is trusted.
    #[serde(default)]
    pub delay: f64,
}

impl Readback {
    pub fn new(pv_name: impl Into<String>, data: impl Into<EpicsValue>) -> Self {
        Self {
            pv_name: pv_name.into(),
            data: Some(data.into()),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl Default for Readback {
    fn default() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            description: String::new(),
            creation_time: Utc::now(),
            pv_name: String::new(),
            data: None,
            status: Status::default(),
            severity: Severity::default(),
            abs_tolerance: None,
            rel_tolerance: None,
            delay: 0.0,
        }
    }
}

/// A named, nestable group of Parameters and sub-Collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub uuid: Uuid,
    #[serde(default)]
    pub description: String,
    #[serde(default = "Utc::now")]
    pub creation_time: DateTime<Utc>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub children: Vec<EntryRef>,
    #[serde(default, deserialize_with = "deserialize_tag_set")]
    pub tags: TagSet,
}

impl Collection {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends a child, returning the collection for chaining.
    pub fn with_child(mut self, child: impl Into<EntryRef>) -> Self {
        self.children.push(child.into());
        self
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            description: String::new(),
            creation_time: Utc::now(),
            title: String::new(),
            children: Vec::new(),
            tags: TagSet::new(),
        }
    }
}

/// The data-filled counterpart of a Collection, taken at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub uuid: Uuid,
    #[serde(default)]
    pub description: String,
    #[serde(default = "Utc::now")]
    pub creation_time: DateTime<Utc>,
    #[serde(default)]
    pub title: String,
    /// The Collection this snapshot was taken from.
    #[serde(default)]
    pub origin_collection: Option<Uuid>,
    #[serde(default)]
    pub children: Vec<EntryRef>,
    #[serde(default, deserialize_with = "deserialize_tag_set")]
    pub tags: TagSet,
    /// Auxiliary values captured with the snapshot; stored inline.
    #[serde(default)]
    pub meta_pvs: Vec<Readback>,
}

impl Snapshot {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_child(mut self, child: impl Into<EntryRef>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_origin(mut self, collection: Uuid) -> Self {
        self.origin_collection = Some(collection);
        self
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            description: String::new(),
            creation_time: Utc::now(),
            title: String::new(),
            origin_collection: None,
            children: Vec::new(),
            tags: TagSet::new(),
            meta_pvs: Vec::new(),
        }
    }
}

/// Any persistable record.
///
/// Serialized with an internal `entry_type` tag:
///
/// ```
/// use superscore_store::{Entry, Parameter};
///
/// let entry = Entry::from(Parameter::new("LASR:GUNB:TEST1"));
/// let json = serde_json::to_value(&entry).unwrap();
/// assert_eq!(json["entry_type"], "Parameter");
/// assert_eq!(json["pv_name"], "LASR:GUNB:TEST1");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry_type")]
pub enum Entry {
    Parameter(Parameter),
    Setpoint(Setpoint),
    Readback(Readback),
    Collection(Collection),
    Snapshot(Snapshot),
}

impl Entry {
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::Parameter(e) => e.uuid,
            Self::Setpoint(e) => e.uuid,
            Self::Readback(e) => e.uuid,
            Self::Collection(e) => e.uuid,
            Self::Snapshot(e) => e.uuid,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Parameter(e) => &e.description,
            Self::Setpoint(e) => &e.description,
            Self::Readback(e) => &e.description,
            Self::Collection(e) => &e.description,
            Self::Snapshot(e) => &e.description,
        }
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        let description = description.into();
        match self {
            Self::Parameter(e) => e.description = description,
            Self::Setpoint(e) => e.description = description,
            Self::Readback(e) => e.description = description,
            Self::Collection(e) => e.description = description,
            Self::Snapshot(e) => e.description = description,
        }
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        match self {
            Self::Parameter(e) => e.creation_time,
            Self::Setpoint(e) => e.creation_time,
            Self::Readback(e) => e.creation_time,
            Self::Collection(e) => e.creation_time,
            Self::Snapshot(e) => e.creation_time,
        }
    }

    pub fn entry_type(&self) -> EntryType {
        match self {
            Self::Parameter(_) => EntryType::Parameter,
            Self::Setpoint(_) => EntryType::Setpoint,
            Self::Readback(_) => EntryType::Readback,
            Self::Collection(_) => EntryType::Collection,
            Self::Snapshot(_) => EntryType::Snapshot,
        }
    }

    /// Returns the PV name for Parameters and captured values.
    pub fn pv_name(&self) -> Option<&str> {
        match self {
            Self::Parameter(e) => Some(&e.pv_name),
            Self::Setpoint(e) => Some(&e.pv_name),
            Self::Readback(e) => Some(&e.pv_name),
            Self::Collection(_) | Self::Snapshot(_) => None,
        }
    }

    /// Returns `true` for Collections and Snapshots.
    pub fn is_nestable(&self) -> bool {
        matches!(self, Self::Collection(_) | Self::Snapshot(_))
    }

    /// Returns the ordered children of a nestable entry.
    pub fn children(&self) -> Option<&[EntryRef]> {
        match self {
            Self::Collection(c) => Some(&c.children),
            Self::Snapshot(s) => Some(&s.children),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<EntryRef>> {
        match self {
            Self::Collection(c) => Some(&mut c.children),
            Self::Snapshot(s) => Some(&mut s.children),
            _ => None,
        }
    }

    /// Returns the tag set of a nestable entry.
    pub fn tags(&self) -> Option<&TagSet> {
        match self {
            Self::Collection(c) => Some(&c.tags),
            Self::Snapshot(s) => Some(&s.tags),
            _ => None,
        }
    }

    pub fn tags_mut(&mut self) -> Option<&mut TagSet> {
        match self {
            Self::Collection(c) => Some(&mut c.tags),
            Self::Snapshot(s) => Some(&mut s.tags),
            _ => None,
        }
    }

    /// Looks up a searchable field by name.
    ///
    /// Returns `None` when this record type has no such field. Unset
    /// optional fields are reported as [`SearchValue::Null`].
    pub fn field(&self, name: &str) -> Option<SearchValue> {
        match name {
            "uuid" => return Some(SearchValue::Uuid(self.uuid())),
            "description" => return Some(SearchValue::Str(self.description().to_string())),
            "creation_time" => return Some(SearchValue::DateTime(self.creation_time())),
            _ => {}
        }

        match self {
            Self::Parameter(p) => match name {
                "pv_name" => Some(SearchValue::Str(p.pv_name.clone())),
                "abs_tolerance" => Some(p.abs_tolerance.into()),
                "rel_tolerance" => Some(p.rel_tolerance.into()),
                "readback" => Some(reference_field(p.readback.as_ref())),
                "read_only" => Some(SearchValue::Bool(p.read_only)),
                _ => None,
            },
            Self::Setpoint(s) => match name {
                "pv_name" => Some(SearchValue::Str(s.pv_name.clone())),
                "data" => Some(s.data.clone().into()),
                "status" => Some(s.status.into()),
                "severity" => Some(s.severity.into()),
                "readback" => Some(reference_field(s.readback.as_ref())),
                _ => None,
            },
            Self::Readback(r) => match name {
                "pv_name" => Some(SearchValue::Str(r.pv_name.clone())),
                "data" => Some(r.data.clone().into()),
                "status" => Some(r.status.into()),
                "severity" => Some(r.severity.into()),
                "abs_tolerance" => Some(r.abs_tolerance.into()),
                "rel_tolerance" => Some(r.rel_tolerance.into()),
                "delay" => Some(SearchValue::Float(r.delay)),
                _ => None,
            },
            Self::Collection(c) => match name {
                "title" => Some(SearchValue::Str(c.title.clone())),
                "children" => Some(children_field(&c.children)),
                "tags" => Some(SearchValue::Tags(c.tags.clone())),
                _ => None,
            },
            Self::Snapshot(s) => match name {
                "title" => Some(SearchValue::Str(s.title.clone())),
                "origin_collection" => Some(s.origin_collection.into()),
                "children" => Some(children_field(&s.children)),
                "tags" => Some(SearchValue::Tags(s.tags.clone())),
                _ => None,
            },
        }
    }
}

fn reference_field(slot: Option<&EntryRef>) -> SearchValue {
    slot.map(|r| SearchValue::Uuid(r.uuid()))
        .unwrap_or(SearchValue::Null)
}

fn children_field(children: &[EntryRef]) -> SearchValue {
    SearchValue::List(children.iter().map(|c| SearchValue::Uuid(c.uuid())).collect())
}

macro_rules! impl_from_record {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Entry {
                fn from(record: $variant) -> Self {
                    Self::$variant(record)
                }
            }
        )*
    };
}

impl_from_record!(Parameter, Setpoint, Readback, Collection, Snapshot);

/// The runtime type of an entry, used by the `entry_type` search attribute.
///
/// `Value` and `Nestable` are abstract groupings that match more than one
/// concrete record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    Parameter,
    Setpoint,
    Readback,
    Collection,
    Snapshot,
    /// Setpoint or Readback.
    Value,
    /// Collection or Snapshot.
    Nestable,
}

impl EntryType {
    /// Returns `true` if `entry` is of this type.
    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            Self::Value => matches!(entry, Entry::Setpoint(_) | Entry::Readback(_)),
            Self::Nestable => entry.is_nestable(),
            concrete => entry.entry_type() == *concrete,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parameter => "Parameter",
            Self::Setpoint => "Setpoint",
            Self::Readback => "Readback",
            Self::Collection => "Collection",
            Self::Snapshot => "Snapshot",
            Self::Value => "Value",
            Self::Nestable => "Nestable",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Parameter" => Ok(Self::Parameter),
            "Setpoint" => Ok(Self::Setpoint),
            "Readback" => Ok(Self::Readback),
            "Collection" => Ok(Self::Collection),
            "Snapshot" => Ok(Self::Snapshot),
            "Value" => Ok(Self::Value),
            "Nestable" => Ok(Self::Nestable),
            other => Err(Error::malformed(format!("unknown entry type \"{}\"", other))),
        }
    }
}
