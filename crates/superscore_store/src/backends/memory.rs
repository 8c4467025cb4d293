//! In-memory storage backend
//!
//! Holds the entry tree as given, without serialization. Reads return
//! flattened copies, so callers never alias the stored tree; changes made to
//! a returned entry take effect only through `update_entry`.

use super::Backend;
use crate::model::{Entry, EntryRef, Root, TagGroups};
use crate::search::{RecordSource, Search, SearchTerm};
use crate::{Error, Result};
use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Default)]
struct Tree {
    entries: Vec<Entry>,
    tag_groups: TagGroups,
}

/// In-memory storage backend
#[derive(Default)]
pub struct MemoryBackend {
    tree: RwLock<Tree>,
}

impl MemoryBackend {
    /// Create a new empty in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend holding `entries` as its top-level entries
    pub fn with_entries(entries: Vec<Entry>) -> Self {
        Self {
            tree: RwLock::new(Tree {
                entries,
                tag_groups: TagGroups::new(),
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tree>> {
        self.tree
            .read()
            .map_err(|_| Error::Storage("lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tree>> {
        self.tree
            .write()
            .map_err(|_| Error::Storage("lock poisoned".into()))
    }
}

/// Every resolved entry in the tree, depth first.
fn walk(entries: &[Entry]) -> Vec<&Entry> {
    let mut found = Vec::new();
    let mut stack: Vec<&Entry> = entries.iter().rev().collect();
    while let Some(entry) = stack.pop() {
        found.push(entry);
        let slots = entry.child_slots();
        stack.extend(slots.into_iter().rev().filter_map(EntryRef::as_entry));
    }
    found
}

fn find(entries: &[Entry], id: Uuid) -> Option<&Entry> {
    walk(entries).into_iter().find(|e| e.uuid() == id)
}

/// Keeps resolved children of `old` where `new` only names them by UUID.
fn relink(old: &Entry, mut new: Entry) -> Entry {
    let resolved: Vec<&Entry> = old.child_slots().into_iter().filter_map(EntryRef::as_entry).collect();
    for slot in new.child_slots_mut() {
        if let EntryRef::Reference(id) = slot {
            if let Some(child) = resolved.iter().find(|c| c.uuid() == *id) {
                *slot = EntryRef::from((*child).clone());
            }
        }
    }
    new
}

/// Replaces every occurrence of `new`'s UUID, returning how many were found.
fn replace_all(entry: &mut Entry, new: &Entry) -> usize {
    if entry.uuid() == new.uuid() {
        *entry = relink(entry, new.clone());
        return 1;
    }
    entry
        .child_slots_mut()
        .into_iter()
        .filter_map(EntryRef::as_entry_mut)
        .map(|child| replace_all(child, new))
        .sum()
}

/// Turns every nested occurrence of `id` into a bare reference.
fn detach_all(entry: &mut Entry, id: Uuid) {
    for slot in entry.child_slots_mut() {
        if slot.uuid() == id {
            *slot = EntryRef::Reference(id);
        } else if let Some(child) = slot.as_entry_mut() {
            detach_all(child, id);
        }
    }
}

impl RecordSource for MemoryBackend {
    fn scan(&self) -> Result<Box<dyn Iterator<Item = Result<Entry>> + '_>> {
        let tree = self.read()?;
        let mut seen = HashSet::new();
        let records: Vec<Result<Entry>> = walk(&tree.entries)
            .into_iter()
            .filter(|e| seen.insert(e.uuid()))
            .map(|e| Ok(e.flattened()))
            .collect();
        Ok(Box::new(records.into_iter()))
    }

    fn lookup(&self, id: Uuid) -> Result<Entry> {
        self.get_entry(id)
    }
}

impl Backend for MemoryBackend {
    fn get_entry(&self, id: Uuid) -> Result<Entry> {
        let tree = self.read()?;
        find(&tree.entries, id)
            .map(Entry::flattened)
            .ok_or(Error::NotFound(id))
    }

    fn save_entry(&self, entry: &Entry) -> Result<()> {
        let mut tree = self.write()?;
        if find(&tree.entries, entry.uuid()).is_some() {
            return Err(Error::AlreadyExists(entry.uuid()));
        }
        tree.entries.push(entry.clone());
        Ok(())
    }

    fn update_entry(&self, entry: &Entry) -> Result<()> {
        let mut tree = self.write()?;
        let replaced: usize = tree
            .entries
            .iter_mut()
            .map(|e| replace_all(e, entry))
            .sum();
        if replaced == 0 {
            return Err(Error::NotFound(entry.uuid()));
        }
        log::debug!("updated {} occurrence(s) of {}", replaced, entry.uuid());
        Ok(())
    }

    fn delete_entry(&self, entry: &Entry) -> Result<()> {
        let id = entry.uuid();
        let mut tree = self.write()?;

        let stored: Vec<&Entry> = walk(&tree.entries)
            .into_iter()
            .filter(|e| e.uuid() == id)
            .collect();
        if stored.is_empty() {
            return Err(Error::NotFound(id));
        }
        if stored.iter().any(|e| !e.same_contents(entry)) {
            return Err(Error::OutOfSync(id));
        }

        tree.entries.retain(|e| e.uuid() != id);
        for top in tree.entries.iter_mut() {
            detach_all(top, id);
        }
        Ok(())
    }

    fn search(&self, terms: &[SearchTerm]) -> Result<Search<'_>> {
        Search::new(self, terms)
    }

    fn root(&self) -> Result<Root> {
        let tree = self.read()?;
        Ok(Root {
            entries: tree.entries.iter().cloned().map(EntryRef::from).collect(),
            tag_groups: tree.tag_groups.clone(),
        })
    }

    fn get_tags(&self) -> Result<TagGroups> {
        Ok(self.read()?.tag_groups.clone())
    }

    fn set_tags(&self, tags: TagGroups) -> Result<()> {
        self.write()?.tag_groups = tags;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Collection, Parameter, Readback, Setpoint, TagGroup};

    fn nested() -> (MemoryBackend, Collection, Parameter) {
        let param = Parameter::new("MY:PV");
        let inner = Collection::new("inner").with_child(param.clone());
        let outer = Collection::new("outer").with_child(inner);
        let backend = MemoryBackend::with_entries(vec![outer.clone().into()]);
        (backend, outer, param)
    }

    #[test]
    fn test_get_nested_entry() {
        let (backend, _, param) = nested();
        let found = backend.get_entry(param.uuid).unwrap();
        assert_eq!(found, Entry::from(param));
    }

    #[test]
    fn test_get_returns_flattened_copy() {
        let (backend, outer, _) = nested();
        let found = backend.get_entry(outer.uuid).unwrap();
        assert!(found.children().unwrap().iter().all(EntryRef::is_reference));
    }

    #[test]
    fn test_save_collision_anywhere_in_tree() {
        let (backend, _, param) = nested();
        let err = backend.save_entry(&param.into()).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[test]
    fn test_update_nested_keeps_tree_linked() {
        let (backend, outer, _) = nested();
        let inner_id = outer.children[0].uuid();

        let mut inner = backend.get_entry(inner_id).unwrap();
        inner.set_description("edited");
        backend.update_entry(&inner).unwrap();

        assert_eq!(backend.get_entry(inner_id).unwrap().description(), "edited");

        // The child of the updated entry is still resolvable.
        let param_id = inner.children().unwrap()[0].uuid();
        assert!(backend.get_entry(param_id).is_ok());
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.update_entry(&Parameter::new("X").into()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_out_of_sync() {
        let (backend, _, param) = nested();
        let mut stale = param.clone();
        stale.pv_name = "OTHER:PV".into();

        let err = backend.delete_entry(&stale.into()).unwrap_err();
        assert!(matches!(err, Error::OutOfSync(_)));
        assert!(backend.get_entry(param.uuid).is_ok());
    }

    #[test]
    fn test_delete_nested_leaves_reference() {
        let (backend, outer, param) = nested();
        backend.delete_entry(&param.clone().into()).unwrap();

        assert!(backend.get_entry(param.uuid).unwrap_err().is_not_found());
        let inner = backend.get_entry(outer.children[0].uuid()).unwrap();
        assert_eq!(inner.children().unwrap(), &[EntryRef::Reference(param.uuid)]);
    }

    #[test]
    fn test_delete_top_level() {
        let backend = MemoryBackend::new();
        let sp = Entry::from(Setpoint::new("X", 1).with_readback(Readback::new("X:RBV", 1)));
        backend.save_entry(&sp).unwrap();
        backend.delete_entry(&sp.flattened()).unwrap();
        assert!(backend.root().unwrap().entries.is_empty());
    }

    #[test]
    fn test_scan_deduplicates_shared_children() {
        let shared = Parameter::new("SHARED");
        let a = Collection::new("a").with_child(shared.clone());
        let b = Collection::new("b").with_child(shared);
        let backend = MemoryBackend::with_entries(vec![a.into(), b.into()]);
        assert_eq!(backend.search(&[]).unwrap().entries().unwrap().len(), 3);
    }

    #[test]
    fn test_tags_roundtrip() {
        let backend = MemoryBackend::new();
        let mut tags = TagGroups::new();
        tags.insert(1, TagGroup::new("Area", "Machine area").with_tag(0, "GUNB"));
        backend.set_tags(tags.clone()).unwrap();
        assert_eq!(backend.get_tags().unwrap(), tags);
        assert_eq!(backend.root().unwrap().tag_groups, tags);
    }
}
