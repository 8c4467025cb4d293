//! Directory storage backend
//!
//! Stores each record as its own JSON file. Files are spread over nested
//! single-character directories taken from the leading hex digits of the
//! record's UUID, which keeps every directory small as the store grows:
//!
//! ```text
//! <store>/root.json
//! <store>/d/5/b/d5bade05-d992-4e44-87d8-0db2937209bf.json
//! ```
//!
//! `root.json` lists the top-level entries by UUID and holds the tag
//! vocabulary.

use super::Backend;
use crate::model::{Entry, EntryRef, Root, TagGroups};
use crate::persist::{create_json_atomic, is_temp_name, write_json_atomic};
use crate::search::{RecordSource, Search, SearchTerm};
use crate::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;
use walkdir::WalkDir;

/// Default number of UUID hex digits used as directory levels.
pub const RADIX_DEPTH: usize = 3;

/// Name of the index file at the top of the store.
pub const ROOT_FILE: &str = "root.json";

/// Directory storage backend
pub struct DirectoryBackend {
    path: PathBuf,
    radix_depth: usize,
    /// Serializes read-modify-write cycles on the files within this process.
    lock: RwLock<()>,
}

impl DirectoryBackend {
    /// Open or create a store at `path` with the default radix depth
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_radix_depth(path, RADIX_DEPTH)
    }

    /// Open or create a store at `path`
    ///
    /// `radix_depth` must not exceed the 32 hex digits of a UUID.
    pub fn with_radix_depth(path: impl AsRef<Path>, radix_depth: usize) -> Result<Self> {
        if radix_depth > 32 {
            return Err(Error::Config(format!(
                "radix depth {} exceeds the 32 digits of a UUID",
                radix_depth
            )));
        }

        let backend = Self {
            path: path.as_ref().to_path_buf(),
            radix_depth,
            lock: RwLock::new(()),
        };
        match backend.initialize() {
            Ok(()) => {}
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::PermissionDenied => {
                log::debug!("using existing store at {}", backend.path.display());
            }
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::AlreadyExists => {
                log::warn!(
                    "store at {} was initialized concurrently: {}",
                    backend.path.display(),
                    e
                );
            }
            Err(e) => return Err(e),
        }
        Ok(backend)
    }

    /// Root directory of the store
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn radix_depth(&self) -> usize {
        self.radix_depth
    }

    /// Create the store directory and an empty `root.json`
    ///
    /// Fails with a permission error if `root.json` already exists.
    pub fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.path)?;
        let root_path = self.root_path();
        if root_path.exists() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!(
                    "directory {} already holds a store, can not initialize a new database",
                    self.path.display()
                ),
            )));
        }
        log::debug!("initializing new database at {}", self.path.display());
        create_json_atomic(&root_path, &Root::new())
    }

    /// Delete every record and start over with an empty store
    ///
    /// The tag vocabulary is cleared as well.
    pub fn reset(&self) -> Result<()> {
        let _guard = self.write_lock()?;
        let files = self.record_files().collect::<Result<Vec<_>>>()?;
        for file in files {
            fs::remove_file(&file)?;
            self.prune_empty_dirs(&file)?;
        }
        fs::remove_file(self.root_path())?;
        self.initialize()
    }

    /// Path of the file holding the record `id`
    pub fn entry_path(&self, id: Uuid) -> PathBuf {
        let mut path = self.path.clone();
        let digits = id.simple().to_string();
        for digit in digits.chars().take(self.radix_depth) {
            path.push(digit.to_string());
        }
        path.push(format!("{}.json", id));
        path
    }

    fn root_path(&self) -> PathBuf {
        self.path.join(ROOT_FILE)
    }

    fn read_lock(&self) -> Result<RwLockReadGuard<'_, ()>> {
        self.lock
            .read()
            .map_err(|_| Error::Storage("lock poisoned".into()))
    }

    fn write_lock(&self) -> Result<RwLockWriteGuard<'_, ()>> {
        self.lock
            .write()
            .map_err(|_| Error::Storage("lock poisoned".into()))
    }

    fn read_record(&self, id: Uuid) -> Result<Entry> {
        let text = match fs::read_to_string(self.entry_path(id)) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::NotFound(id)),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }

    fn read_root(&self) -> Result<Root> {
        let text = fs::read_to_string(self.root_path()).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::Storage(format!(
                    "{} has no {}, it is not a directory store",
                    self.path.display(),
                    ROOT_FILE
                ))
            } else {
                e.into()
            }
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    fn write_root(&self, root: &Root) -> Result<()> {
        write_json_atomic(&self.root_path(), root)
    }

    /// Writes `entry` and its resolved descendants, flattened.
    ///
    /// Descendants that already exist are overwritten. The entry itself is
    /// created exclusively when `exclusive` is set.
    fn write_tree(&self, mut entry: Entry, exclusive: bool) -> Result<()> {
        for child in entry.swap_to_uuids() {
            self.write_tree(child, false)?;
        }

        let id = entry.uuid();
        let path = self.entry_path(id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        if exclusive {
            create_json_atomic(&path, &entry).map_err(|e| match e {
                Error::Io(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    Error::AlreadyExists(id)
                }
                other => other,
            })
        } else {
            write_json_atomic(&path, &entry)
        }
    }

    /// Removes now-empty radix directories above `file`, stopping at the store root.
    fn prune_empty_dirs(&self, file: &Path) -> Result<()> {
        let mut dir = file.parent();
        while let Some(current) = dir {
            if current == self.path || !current.starts_with(&self.path) {
                break;
            }
            if fs::read_dir(current)?.next().is_some() {
                break;
            }
            fs::remove_dir(current)?;
            dir = current.parent();
        }
        Ok(())
    }

    /// Every record file below the store root, lazily.
    fn record_files(&self) -> impl Iterator<Item = Result<PathBuf>> + '_ {
        WalkDir::new(&self.path)
            .min_depth(1)
            .into_iter()
            .filter_map(move |item| {
                let item = match item {
                    Ok(item) => item,
                    Err(e) => return Some(Err(Error::Io(e.into()))),
                };
                if !item.file_type().is_file() {
                    return None;
                }
                let name = item.file_name().to_string_lossy();
                if name == ROOT_FILE || is_temp_name(&name) || !name.ends_with(".json") {
                    return None;
                }
                Some(Ok(item.into_path()))
            })
    }

    fn record_at(&self, file: &Path) -> Option<Result<Entry>> {
        let id = match file
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(Uuid::parse_str)
        {
            Some(Ok(id)) => id,
            _ => {
                log::debug!("skipping {}, not a record file", file.display());
                return None;
            }
        };

        match self.read_record(id) {
            Ok(entry) => Some(Ok(entry)),
            Err(e) if e.is_not_found() => {
                log::debug!("record {} vanished during the scan", id);
                None
            }
            Err(Error::Serialization(msg)) => {
                log::warn!("skipping unreadable record {}: {}", file.display(), msg);
                None
            }
            Err(e) => Some(Err(e)),
        }
    }
}

impl RecordSource for DirectoryBackend {
    fn scan(&self) -> Result<Box<dyn Iterator<Item = Result<Entry>> + '_>> {
        let records = self.record_files().filter_map(move |file| match file {
            Ok(file) => self.record_at(&file),
            Err(e) => Some(Err(e)),
        });
        Ok(Box::new(records))
    }

    fn lookup(&self, id: Uuid) -> Result<Entry> {
        self.get_entry(id)
    }
}

impl Backend for DirectoryBackend {
    fn get_entry(&self, id: Uuid) -> Result<Entry> {
        let _guard = self.read_lock()?;
        self.read_record(id)
    }

    fn save_entry(&self, entry: &Entry) -> Result<()> {
        let _guard = self.write_lock()?;
        let id = entry.uuid();
        if self.entry_path(id).exists() {
            return Err(Error::AlreadyExists(id));
        }

        self.write_tree(entry.clone(), true)?;

        let mut root = self.read_root()?;
        root.push(id);
        self.write_root(&root)
    }

    fn update_entry(&self, entry: &Entry) -> Result<()> {
        let _guard = self.write_lock()?;
        let id = entry.uuid();
        if !self.entry_path(id).exists() {
            return Err(Error::NotFound(id));
        }
        self.write_tree(entry.clone(), false)
    }

    fn delete_entry(&self, entry: &Entry) -> Result<()> {
        let _guard = self.write_lock()?;
        let id = entry.uuid();
        let stored = self.read_record(id)?;
        if !stored.same_contents(entry) {
            return Err(Error::OutOfSync(id));
        }

        let path = self.entry_path(id);
        fs::remove_file(&path)?;
        self.prune_empty_dirs(&path)?;

        let mut root = self.read_root()?;
        let before = root.entries.len();
        root.entries.retain(|top| top.uuid() != id);
        if root.entries.len() != before {
            self.write_root(&root)?;
        }
        Ok(())
    }

    fn search(&self, terms: &[SearchTerm]) -> Result<Search<'_>> {
        Search::new(self, terms)
    }

    fn root(&self) -> Result<Root> {
        let _guard = self.read_lock()?;
        let mut root = self.read_root()?;
        for top in root.entries.iter_mut() {
            if let EntryRef::Reference(id) = *top {
                match self.read_record(id) {
                    Ok(entry) => *top = EntryRef::from(entry),
                    Err(e) if e.is_not_found() => {
                        log::warn!("top-level entry {} has no record", id);
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(root)
    }

    fn get_tags(&self) -> Result<TagGroups> {
        let _guard = self.read_lock()?;
        Ok(self.read_root()?.tag_groups)
    }

    fn set_tags(&self, tags: TagGroups) -> Result<()> {
        let _guard = self.write_lock()?;
        let mut root = self.read_root()?;
        root.tag_groups = tags;
        self.write_root(&root)
    }

    fn name(&self) -> &'static str {
        "directory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Collection, Parameter, TagGroup};
    use tempfile::TempDir;

    fn store() -> (TempDir, DirectoryBackend) {
        let dir = TempDir::new().unwrap();
        let backend = DirectoryBackend::open(dir.path().join("db")).unwrap();
        (dir, backend)
    }

    #[test]
    fn test_entry_path_layout() {
        let (_dir, backend) = store();
        let id = Uuid::parse_str("d5bade05-d992-4e44-87d8-0db2937209bf").unwrap();
        assert_eq!(
            backend.entry_path(id),
            backend
                .path()
                .join("d/5/b/d5bade05-d992-4e44-87d8-0db2937209bf.json")
        );
    }

    #[test]
    fn test_radix_depth_zero_is_flat() {
        let dir = TempDir::new().unwrap();
        let backend = DirectoryBackend::with_radix_depth(dir.path(), 0).unwrap();
        let id = Uuid::new_v4();
        assert_eq!(backend.entry_path(id), dir.path().join(format!("{}.json", id)));
    }

    #[test]
    fn test_radix_depth_is_bounded() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            DirectoryBackend::with_radix_depth(dir.path(), 33),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_reopen_existing_store() {
        let (_dir, backend) = store();
        let entry = Entry::from(Parameter::new("X"));
        backend.save_entry(&entry).unwrap();

        let reopened = DirectoryBackend::open(backend.path()).unwrap();
        assert_eq!(reopened.get_entry(entry.uuid()).unwrap(), entry);
        assert!(matches!(reopened.initialize(), Err(Error::Io(_))));
    }

    #[test]
    fn test_root_json_lists_top_level_uuids() {
        let (_dir, backend) = store();
        let param = Parameter::new("X");
        let col = Collection::new("col1").with_child(param.clone());
        backend.save_entry(&col.clone().into()).unwrap();

        let text = fs::read_to_string(backend.path().join(ROOT_FILE)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["entries"], serde_json::json!([col.uuid.to_string()]));

        let record = fs::read_to_string(backend.entry_path(col.uuid)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&record).unwrap();
        assert_eq!(json["children"], serde_json::json!([param.uuid.to_string()]));
    }

    #[test]
    fn test_existing_children_are_updated_on_save() {
        let (_dir, backend) = store();
        let mut param = Parameter::new("X");
        backend.save_entry(&param.clone().into()).unwrap();

        param.description = "moved under a collection".into();
        let col = Collection::new("col1").with_child(param.clone());
        backend.save_entry(&col.into()).unwrap();

        assert_eq!(
            backend.get_entry(param.uuid).unwrap().description(),
            "moved under a collection"
        );
    }

    #[test]
    fn test_delete_prunes_empty_dirs_and_root() {
        let (_dir, backend) = store();
        let entry = Entry::from(Parameter::new("X"));
        backend.save_entry(&entry).unwrap();
        let path = backend.entry_path(entry.uuid());

        backend.delete_entry(&entry).unwrap();
        assert!(!path.exists());
        let top_dir = path
            .ancestors()
            .nth(backend.radix_depth())
            .unwrap()
            .to_path_buf();
        assert!(!top_dir.exists());
        assert!(backend.path().exists());
        assert!(backend.root().unwrap().entries.is_empty());
    }

    #[test]
    fn test_scan_skips_root_and_temp_files() {
        let (_dir, backend) = store();
        backend.save_entry(&Parameter::new("X").into()).unwrap();
        fs::write(backend.path().join("_a1b2c3d4_root.json"), "{").unwrap();
        fs::write(backend.path().join("notes.txt"), "hello").unwrap();

        assert_eq!(backend.search(&[]).unwrap().entries().unwrap().len(), 1);
    }

    #[test]
    fn test_scan_skips_corrupt_records() {
        let (_dir, backend) = store();
        backend.save_entry(&Parameter::new("X").into()).unwrap();
        let bad = backend.entry_path(Uuid::new_v4());
        fs::create_dir_all(bad.parent().unwrap()).unwrap();
        fs::write(&bad, "{ truncated").unwrap();

        assert_eq!(backend.search(&[]).unwrap().entries().unwrap().len(), 1);
    }

    #[test]
    fn test_reset() {
        let (_dir, backend) = store();
        let mut tags = TagGroups::new();
        tags.insert(0, TagGroup::new("Area", "").with_tag(0, "GUNB"));
        backend.set_tags(tags).unwrap();
        backend
            .save_entry(&Collection::new("c").with_child(Parameter::new("X")).into())
            .unwrap();

        backend.reset().unwrap();
        assert!(backend.search(&[]).unwrap().entries().unwrap().is_empty());
        assert_eq!(backend.root().unwrap(), Root::new());
        let leftovers: Vec<_> = fs::read_dir(backend.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }
}
