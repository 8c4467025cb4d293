//! Storage backends for entries
//!
//! Multiple backends are supported:
//! - Memory: In-memory storage (testing/ephemeral)
//! - Filestore: A single JSON file rewritten atomically on every change (default)
//! - Directory: One JSON file per record in a radix directory tree (default)

pub mod memory;

#[cfg(feature = "filestore")]
pub mod filestore;

#[cfg(feature = "directory")]
pub mod directory;

use crate::config::{BackendKind, StoreConfig};
use crate::model::{Entry, Root, TagGroups};
use crate::search::{RecordSource, Search, SearchTerm};
use crate::Result;
use uuid::Uuid;

/// Trait for storage backends
///
/// Stored records are flat: their child slots hold UUIDs. Saving an entry
/// also persists every resolved child reachable from it.
pub trait Backend: RecordSource + Send + Sync {
    /// Get the record with `id`, flattened
    fn get_entry(&self, id: Uuid) -> Result<Entry>;

    /// Store a new record and any resolved children
    ///
    /// Fails with [`Error::AlreadyExists`](crate::Error::AlreadyExists) if a
    /// record with the same UUID is already stored.
    fn save_entry(&self, entry: &Entry) -> Result<()>;

    /// Replace the stored record with the same UUID
    ///
    /// Fails with [`Error::NotFound`](crate::Error::NotFound) if no such
    /// record exists.
    fn update_entry(&self, entry: &Entry) -> Result<()>;

    /// Remove the stored record with the same UUID
    ///
    /// Fails with [`Error::OutOfSync`](crate::Error::OutOfSync) if the stored
    /// contents differ from `entry`. Children are left in place.
    fn delete_entry(&self, entry: &Entry) -> Result<()>;

    /// Build a restartable search over every stored record
    fn search(&self, terms: &[SearchTerm]) -> Result<Search<'_>>;

    /// Get the top-level entries and tag vocabulary
    fn root(&self) -> Result<Root>;

    /// Get the tag vocabulary
    fn get_tags(&self) -> Result<TagGroups>;

    /// Replace the tag vocabulary
    fn set_tags(&self, tags: TagGroups) -> Result<()>;

    /// Resolve UUID child slots of `entry` from this backend, `depth` levels deep
    fn fill(&self, entry: &mut Entry, depth: usize) -> Result<()> {
        entry.fill(depth, &mut |id| self.get_entry(id))
    }

    /// Check if a record exists
    fn contains(&self, id: Uuid) -> Result<bool> {
        match self.get_entry(id) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Short engine name, e.g. `"filestore"`
    fn name(&self) -> &'static str;
}

// Re-exports
pub use memory::MemoryBackend;

#[cfg(feature = "filestore")]
pub use self::filestore::FilestoreBackend;

#[cfg(feature = "directory")]
pub use self::directory::DirectoryBackend;

/// Open the backend selected by `config`
///
/// Without a `[backend]` section an empty in-memory backend is returned.
/// Selecting an engine that was not compiled in returns
/// [`Error::BackendUnavailable`](crate::Error::BackendUnavailable).
pub fn open_backend(config: &StoreConfig) -> Result<Box<dyn Backend>> {
    let Some(backend) = &config.backend else {
        log::warn!("no backend specified, loading an empty in-memory backend");
        return Ok(Box::new(MemoryBackend::new()));
    };

    match backend.kind {
        BackendKind::Memory => Ok(Box::new(MemoryBackend::new())),

        #[cfg(feature = "filestore")]
        BackendKind::Filestore => {
            let store = FilestoreBackend::open(backend.require_path()?)?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "filestore"))]
        BackendKind::Filestore => Err(crate::Error::BackendUnavailable(
            "filestore backend not available. Compile with --features filestore".into(),
        )),

        #[cfg(feature = "directory")]
        BackendKind::Directory => {
            let depth = backend.radix_depth.unwrap_or(directory::RADIX_DEPTH);
            let store = DirectoryBackend::with_radix_depth(backend.require_path()?, depth)?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "directory"))]
        BackendKind::Directory => Err(crate::Error::BackendUnavailable(
            "directory backend not available. Compile with --features directory".into(),
        )),
    }
}
