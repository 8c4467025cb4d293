//! Child slots that hold either a resolved entry or a bare UUID.
//!
//! Flattening swaps resolved children for their UUIDs so that a record can
//! be stored without embedding its subtree. Filling resolves the UUIDs back
//! through a lookup, one generation per level of depth.

use super::{Collection, Entry, Parameter, Readback, Setpoint, Snapshot};
use crate::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fill depth that resolves every reachable generation.
pub const FILL_ALL: usize = usize::MAX;

/// A child slot: a bare UUID or a resolved entry.
///
/// On the wire a reference is the UUID string and a resolved entry is the
/// nested object, so both shapes decode into the matching variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryRef {
    Reference(Uuid),
    Resolved(Box<Entry>),
}

impl EntryRef {
    /// Returns the UUID of the referenced entry, resolved or not.
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::Reference(id) => *id,
            Self::Resolved(entry) => entry.uuid(),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_))
    }

    pub fn as_entry(&self) -> Option<&Entry> {
        match self {
            Self::Resolved(entry) => Some(entry),
            Self::Reference(_) => None,
        }
    }

    pub fn as_entry_mut(&mut self) -> Option<&mut Entry> {
        match self {
            Self::Resolved(entry) => Some(entry),
            Self::Reference(_) => None,
        }
    }

    pub fn into_entry(self) -> Option<Entry> {
        match self {
            Self::Resolved(entry) => Some(*entry),
            Self::Reference(_) => None,
        }
    }
}

impl From<Uuid> for EntryRef {
    fn from(id: Uuid) -> Self {
        Self::Reference(id)
    }
}

impl From<Entry> for EntryRef {
    fn from(entry: Entry) -> Self {
        Self::Resolved(Box::new(entry))
    }
}

macro_rules! impl_ref_from_record {
    ($($record:ident),*) => {
        $(
            impl From<$record> for EntryRef {
                fn from(record: $record) -> Self {
                    Self::Resolved(Box::new(Entry::from(record)))
                }
            }
        )*
    };
}

impl_ref_from_record!(Parameter, Setpoint, Readback, Collection, Snapshot);

impl Entry {
    /// Returns every direct child slot: `children` elements and `readback`.
    pub fn child_slots(&self) -> Vec<&EntryRef> {
        match self {
            Self::Parameter(p) => p.readback.iter().collect(),
            Self::Setpoint(s) => s.readback.iter().collect(),
            Self::Readback(_) => Vec::new(),
            Self::Collection(c) => c.children.iter().collect(),
            Self::Snapshot(s) => s.children.iter().collect(),
        }
    }

    pub fn child_slots_mut(&mut self) -> Vec<&mut EntryRef> {
        match self {
            Self::Parameter(p) => p.readback.iter_mut().collect(),
            Self::Setpoint(s) => s.readback.iter_mut().collect(),
            Self::Readback(_) => Vec::new(),
            Self::Collection(c) => c.children.iter_mut().collect(),
            Self::Snapshot(s) => s.children.iter_mut().collect(),
        }
    }

    /// Replaces every resolved direct child with its UUID.
    ///
    /// Returns the swapped-out entries in slot order so the caller can
    /// persist them. Slots that already hold a UUID are left alone and are
    /// not returned. Not recursive.
    ///
    /// # Examples
    ///
    /// ```
    /// use superscore_store::{Collection, Entry, EntryRef, Parameter};
    ///
    /// let param = Parameter::new("X");
    /// let id = param.uuid;
    /// let mut col = Entry::from(Collection::new("col1").with_child(param));
    ///
    /// let swapped = col.swap_to_uuids();
    /// assert_eq!(swapped.len(), 1);
    /// assert_eq!(col.children().unwrap(), &[EntryRef::Reference(id)]);
    /// ```
    pub fn swap_to_uuids(&mut self) -> Vec<Entry> {
        let mut swapped = Vec::new();
        for slot in self.child_slots_mut() {
            if let EntryRef::Resolved(_) = slot {
                let id = slot.uuid();
                if let EntryRef::Resolved(child) = std::mem::replace(slot, EntryRef::Reference(id))
                {
                    swapped.push(*child);
                }
            }
        }
        swapped
    }

    /// Returns a copy with every direct child flattened.
    pub fn flattened(&self) -> Entry {
        let mut copy = self.clone();
        copy.swap_to_uuids();
        copy
    }

    /// Returns `true` if both entries hold the same record contents.
    ///
    /// Children are compared by UUID only, so a filled copy and a flattened
    /// copy of the same record compare equal.
    pub fn same_contents(&self, other: &Entry) -> bool {
        self.flattened() == other.flattened()
    }

    /// Resolves UUID child slots through `lookup`, up to `depth` generations.
    ///
    /// A depth of 0 does nothing and a depth of 1 resolves only the direct
    /// children. References that `lookup` reports as not found are left in
    /// place; any other lookup error is returned. A UUID that already
    /// appears on the path from `self` is not expanded again.
    pub fn fill<F>(&mut self, depth: usize, lookup: &mut F) -> Result<()>
    where
        F: FnMut(Uuid) -> Result<Entry>,
    {
        let mut path = vec![self.uuid()];
        fill_slots(self, depth, lookup, &mut path)
    }
}

fn fill_slots<F>(entry: &mut Entry, depth: usize, lookup: &mut F, path: &mut Vec<Uuid>) -> Result<()>
where
    F: FnMut(Uuid) -> Result<Entry>,
{
    if depth == 0 {
        return Ok(());
    }

    for slot in entry.child_slots_mut() {
        let id = slot.uuid();
        if path.contains(&id) {
            continue;
        }

        if slot.is_reference() {
            match lookup(id) {
                Ok(resolved) => *slot = EntryRef::from(resolved),
                Err(e) if e.is_not_found() => {
                    log::debug!("leaving unresolved reference {} in place", id);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(child) = slot.as_entry_mut() {
            path.push(id);
            let filled = fill_slots(child, depth - 1, lookup, path);
            path.pop();
            filled?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::collections::HashMap;

    fn lookup_in(store: &HashMap<Uuid, Entry>) -> impl FnMut(Uuid) -> Result<Entry> + '_ {
        move |id| store.get(&id).cloned().ok_or(Error::NotFound(id))
    }

    #[test]
    fn test_reference_and_resolved_decode() {
        let id = Uuid::new_v4();
        let r: EntryRef = serde_json::from_value(serde_json::json!(id.to_string())).unwrap();
        assert_eq!(r, EntryRef::Reference(id));

        let param = Parameter::new("X");
        let json = serde_json::to_value(EntryRef::from(param.clone())).unwrap();
        let r: EntryRef = serde_json::from_value(json).unwrap();
        assert_eq!(r.as_entry(), Some(&Entry::from(param)));
    }

    #[test]
    fn test_swap_leaves_references_untouched() {
        let already = Uuid::new_v4();
        let live = Parameter::new("B");
        let mut col = Entry::from(Collection::new("c").with_child(already).with_child(live.clone()));

        let swapped = col.swap_to_uuids();
        assert_eq!(swapped, vec![Entry::from(live.clone())]);
        assert_eq!(
            col.children().unwrap(),
            &[EntryRef::Reference(already), EntryRef::Reference(live.uuid)]
        );
        assert!(col.swap_to_uuids().is_empty());
    }

    #[test]
    fn test_swap_covers_readback_slot() {
        let rbv = Readback::new("X:RBV", 1.5);
        let mut sp = Entry::from(Setpoint::new("X", 1.5).with_readback(rbv.clone()));
        let swapped = sp.swap_to_uuids();
        assert_eq!(swapped, vec![Entry::from(rbv.clone())]);
        match sp {
            Entry::Setpoint(s) => assert_eq!(s.readback, Some(EntryRef::Reference(rbv.uuid))),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_swap_then_fill_restores_children() {
        let a = Parameter::new("A");
        let b = Collection::new("inner").with_child(Parameter::new("C"));
        let original = Entry::from(Collection::new("outer").with_child(a).with_child(b));

        let mut entry = original.clone();
        let store: HashMap<Uuid, Entry> = entry
            .swap_to_uuids()
            .into_iter()
            .map(|e| (e.uuid(), e))
            .collect();

        entry.fill(1, &mut lookup_in(&store)).unwrap();
        assert_eq!(entry, original);
    }

    #[test]
    fn test_fill_depth_zero_is_noop() {
        let id = Uuid::new_v4();
        let mut entry = Entry::from(Collection::new("c").with_child(id));
        let store = HashMap::new();
        entry.fill(0, &mut lookup_in(&store)).unwrap();
        assert_eq!(entry.children().unwrap(), &[EntryRef::Reference(id)]);
    }

    #[test]
    fn test_fill_is_bounded_by_depth() {
        let leaf = Parameter::new("LEAF");
        let mut mid = Entry::from(Collection::new("mid").with_child(leaf.clone()));
        let mid_id = mid.uuid();
        mid.swap_to_uuids();

        let mut store = HashMap::new();
        store.insert(leaf.uuid, Entry::from(leaf.clone()));
        store.insert(mid_id, mid);

        let mut top = Entry::from(Collection::new("top").with_child(mid_id));
        top.fill(1, &mut lookup_in(&store)).unwrap();
        let mid = top.children().unwrap()[0].as_entry().unwrap();
        assert_eq!(mid.children().unwrap(), &[EntryRef::Reference(leaf.uuid)]);

        top.fill(FILL_ALL, &mut lookup_in(&store)).unwrap();
        let mid = top.children().unwrap()[0].as_entry().unwrap();
        assert_eq!(mid.children().unwrap()[0].as_entry(), Some(&Entry::from(leaf)));
    }

    #[test]
    fn test_fill_leaves_missing_references() {
        let missing = Uuid::new_v4();
        let mut entry = Entry::from(Collection::new("c").with_child(missing));
        let store = HashMap::new();
        entry.fill(FILL_ALL, &mut lookup_in(&store)).unwrap();
        assert_eq!(entry.children().unwrap(), &[EntryRef::Reference(missing)]);
    }

    #[test]
    fn test_fill_propagates_other_errors() {
        let mut entry = Entry::from(Collection::new("c").with_child(Uuid::new_v4()));
        let err = entry
            .fill(1, &mut |_| Err(Error::Storage("disk gone".into())))
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_fill_stops_at_cycles() {
        let mut param = Parameter::new("X");
        let mut rbv_param = Parameter::new("X:RBV");
        rbv_param.readback = Some(EntryRef::Reference(param.uuid));
        param.readback = Some(EntryRef::Reference(rbv_param.uuid));

        let mut store = HashMap::new();
        store.insert(param.uuid, Entry::from(param.clone()));
        store.insert(rbv_param.uuid, Entry::from(rbv_param.clone()));

        let mut entry = Entry::from(param);
        entry.fill(FILL_ALL, &mut lookup_in(&store)).unwrap();
        let rbv = entry.child_slots()[0].as_entry().unwrap();
        assert!(rbv.child_slots()[0].is_reference());
    }

    #[test]
    fn test_same_contents_ignores_fill_state() {
        let child = Parameter::new("A");
        let filled = Entry::from(Collection::new("c").with_child(child));
        let flat = filled.flattened();
        assert!(filled.same_contents(&flat));

        let mut changed = flat.clone();
        changed.set_description("edited");
        assert!(!filled.same_contents(&changed));
    }
}
