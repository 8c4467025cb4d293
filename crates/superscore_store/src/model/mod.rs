//! The persistable entry model.
//!
//! Entries form a tree: Collections and Snapshots hold ordered children,
//! and Parameters and Setpoints may carry a readback. Every child slot is an
//! [`EntryRef`], so a tree can be stored flat as a set of records addressed
//! by UUID and filled back on read.

mod alarm;
mod data;
mod entry;
mod reference;
mod root;

pub use alarm::{Severity, Status};
pub use data::EpicsValue;
pub use entry::{Collection, Entry, EntryType, Parameter, Readback, Setpoint, Snapshot};
pub use reference::{EntryRef, FILL_ALL};
pub use root::{Root, TagGroup, TagGroupId, TagGroups, TagId, TagSet};
