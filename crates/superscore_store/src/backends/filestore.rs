//! Filestore storage backend
//!
//! Keeps the whole store in one JSON file holding a serialized [`Root`].
//! The file is read on first access into a flat cache keyed by UUID; every
//! change rebuilds the tree from the cache and replaces the file atomically.
//! Records that are no longer reachable from a top-level entry do not
//! survive the rebuild.

use super::Backend;
use crate::model::{Entry, EntryRef, Root, TagGroups, FILL_ALL};
use crate::persist::write_json_atomic;
use crate::search::{RecordSource, Search, SearchTerm};
use crate::{Error, Result};
use indexmap::IndexMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// Flattened records plus the order of the top-level entries.
#[derive(Debug, Default)]
struct EntryCache {
    entries: IndexMap<Uuid, Entry>,
    top_level: Vec<Uuid>,
    tag_groups: TagGroups,
}

impl EntryCache {
    fn from_root(root: Root) -> Self {
        let mut cache = Self {
            tag_groups: root.tag_groups,
            ..Default::default()
        };
        for top in root.entries {
            cache.top_level.push(top.uuid());
            if let Some(entry) = top.into_entry() {
                cache.insert_tree(entry, false);
            }
        }
        cache
    }

    /// Flattens `entry` and its resolved descendants into the cache.
    ///
    /// With `overwrite` unset the first copy of a UUID wins.
    fn insert_tree(&mut self, mut entry: Entry, overwrite: bool) {
        for child in entry.swap_to_uuids() {
            self.insert_tree(child, overwrite);
        }
        let id = entry.uuid();
        if overwrite {
            self.entries.insert(id, entry);
        } else if self.entries.contains_key(&id) {
            log::debug!("duplicate entry {} in store, keeping the first copy", id);
        } else {
            self.entries.insert(id, entry);
        }
    }

    fn lookup(&self, id: Uuid) -> Result<Entry> {
        self.entries.get(&id).cloned().ok_or(Error::NotFound(id))
    }

    /// Rebuilds the filled tree from the surviving top-level entries.
    fn reconstruct(&self) -> Result<Root> {
        let mut entries = Vec::with_capacity(self.top_level.len());
        for id in &self.top_level {
            let Some(entry) = self.entries.get(id) else {
                continue;
            };
            let mut filled = entry.clone();
            filled.fill(FILL_ALL, &mut |child| self.lookup(child))?;
            entries.push(EntryRef::from(filled));
        }
        Ok(Root {
            entries,
            tag_groups: self.tag_groups.clone(),
        })
    }
}

/// Filestore storage backend
pub struct FilestoreBackend {
    path: PathBuf,
    cache: RwLock<Option<EntryCache>>,
}

impl FilestoreBackend {
    /// Open the store at `path`
    ///
    /// Nothing is read until the first operation. A missing or empty file
    /// is initialized with an empty root at that point.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            cache: RwLock::new(None),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a new, empty store
    ///
    /// Refuses to overwrite an existing nonempty file.
    pub fn initialize(&self) -> Result<()> {
        let mut guard = self.write_lock()?;
        self.write_empty()?;
        *guard = Some(EntryCache::default());
        Ok(())
    }

    /// Drop the cache so the next operation re-reads the file
    pub fn reload(&self) -> Result<()> {
        *self.write_lock()? = None;
        Ok(())
    }

    fn write_empty(&self) -> Result<()> {
        let occupied = fs::metadata(&self.path)
            .map(|meta| meta.len() > 0)
            .unwrap_or(false);
        if occupied {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!(
                    "file {} already exists, can not initialize a new database",
                    self.path.display()
                ),
            )));
        }
        log::debug!("initializing new database at {}", self.path.display());
        write_json_atomic(&self.path, &Root::new())
    }

    fn load(&self) -> Result<EntryCache> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            self.write_empty()?;
            return Ok(EntryCache::default());
        }

        let root: Root = serde_json::from_str(&text)?;
        let cache = EntryCache::from_root(root);
        log::debug!(
            "loaded {} entries from {}",
            cache.entries.len(),
            self.path.display()
        );
        Ok(cache)
    }

    fn read_lock(&self) -> Result<RwLockReadGuard<'_, Option<EntryCache>>> {
        self.cache
            .read()
            .map_err(|_| Error::Storage("lock poisoned".into()))
    }

    fn write_lock(&self) -> Result<RwLockWriteGuard<'_, Option<EntryCache>>> {
        self.cache
            .write()
            .map_err(|_| Error::Storage("lock poisoned".into()))
    }

    fn ensure_loaded<'c>(&self, slot: &'c mut Option<EntryCache>) -> Result<&'c mut EntryCache> {
        if slot.is_none() {
            *slot = Some(self.load()?);
        }
        slot.as_mut()
            .ok_or_else(|| Error::Storage("entry cache unavailable".into()))
    }

    fn with_cache<R>(&self, f: impl FnOnce(&EntryCache) -> Result<R>) -> Result<R> {
        {
            let guard = self.read_lock()?;
            if let Some(cache) = guard.as_ref() {
                return f(cache);
            }
        }
        let mut guard = self.write_lock()?;
        let cache = self.ensure_loaded(&mut guard)?;
        f(cache)
    }

    /// Apply `f` to the cache, then rewrite the file.
    ///
    /// If the write fails the cache is dropped so that the next operation
    /// sees what is actually on disk.
    fn mutate<R>(&self, f: impl FnOnce(&mut EntryCache) -> Result<R>) -> Result<R> {
        let mut guard = self.write_lock()?;
        let cache = self.ensure_loaded(&mut guard)?;
        let out = f(cache)?;

        let stored = cache
            .reconstruct()
            .and_then(|root| write_json_atomic(&self.path, &root).map(|_| root));
        match stored {
            Ok(root) => {
                *cache = EntryCache::from_root(root);
                Ok(out)
            }
            Err(e) => {
                *guard = None;
                Err(e)
            }
        }
    }
}

impl RecordSource for FilestoreBackend {
    fn scan(&self) -> Result<Box<dyn Iterator<Item = Result<Entry>> + '_>> {
        let records: Vec<Entry> = self.with_cache(|cache| Ok(cache.entries.values().cloned().collect()))?;
        Ok(Box::new(records.into_iter().map(Ok)))
    }

    fn lookup(&self, id: Uuid) -> Result<Entry> {
        self.get_entry(id)
    }
}

impl Backend for FilestoreBackend {
    fn get_entry(&self, id: Uuid) -> Result<Entry> {
        self.with_cache(|cache| cache.lookup(id))
    }

    fn save_entry(&self, entry: &Entry) -> Result<()> {
        self.mutate(|cache| {
            let id = entry.uuid();
            if cache.entries.contains_key(&id) {
                return Err(Error::AlreadyExists(id));
            }
            cache.insert_tree(entry.clone(), true);
            cache.top_level.push(id);
            Ok(())
        })
    }

    fn update_entry(&self, entry: &Entry) -> Result<()> {
        self.mutate(|cache| {
            let id = entry.uuid();
            if !cache.entries.contains_key(&id) {
                return Err(Error::NotFound(id));
            }
            cache.insert_tree(entry.clone(), true);
            Ok(())
        })
    }

    fn delete_entry(&self, entry: &Entry) -> Result<()> {
        self.mutate(|cache| {
            let id = entry.uuid();
            let stored = cache.entries.get(&id).ok_or(Error::NotFound(id))?;
            if !stored.same_contents(entry) {
                return Err(Error::OutOfSync(id));
            }
            cache.entries.shift_remove(&id);
            cache.top_level.retain(|top| *top != id);
            Ok(())
        })
    }

    fn search(&self, terms: &[SearchTerm]) -> Result<Search<'_>> {
        Search::new(self, terms)
    }

    fn root(&self) -> Result<Root> {
        self.with_cache(EntryCache::reconstruct)
    }

    fn get_tags(&self) -> Result<TagGroups> {
        self.with_cache(|cache| Ok(cache.tag_groups.clone()))
    }

    fn set_tags(&self, tags: TagGroups) -> Result<()> {
        self.mutate(|cache| {
            cache.tag_groups = tags;
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "filestore"
    }
}
