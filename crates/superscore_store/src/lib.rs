//! Superscore Store - Entry storage for EPICS configuration snapshots
//!
//! Stores trees of heterogeneous records (parameters, captured values,
//! collections and snapshots) as a flat set of UUID-addressable records,
//! and answers attribute searches over them. Trees are flattened to UUID
//! references on write and filled back to the depth a caller asks for on
//! read.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Superscore Store                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │                   Search Engine                       │   │
//! │  │  eq │ lt │ gt │ in │ like │ entry_type │ ancestor     │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                           │                                  │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │                   Entry Model                         │   │
//! │  │  ┌──────────┐  ┌──────────┐  ┌──────────┐            │   │
//! │  │  │ Flatten  │  │   Fill   │  │  Tags    │            │   │
//! │  │  └──────────┘  └──────────┘  └──────────┘            │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                           │                                  │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │              Storage Backends                         │   │
//! │  │  Filestore (default) │ Directory │ Memory            │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                                                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use superscore_store::{Backend, Collection, Entry, EntryRef, MemoryBackend, Parameter};
//!
//! let backend = MemoryBackend::new();
//!
//! // Save a collection holding one parameter
//! let param = Parameter::new("LASR:GUNB:TEST1");
//! let col = Collection::new("GUNB lasers").with_child(param.clone());
//! backend.save_entry(&col.clone().into())?;
//!
//! // Records come back flattened: children are UUIDs
//! let mut stored = backend.get_entry(col.uuid)?;
//! assert_eq!(stored.children().unwrap(), &[EntryRef::Reference(param.uuid)]);
//!
//! // Fill one level to resolve them again
//! backend.fill(&mut stored, 1)?;
//! assert_eq!(stored.children().unwrap()[0].as_entry(), Some(&Entry::from(param)));
//! # Ok::<(), superscore_store::Error>(())
//! ```
//!
//! # Choosing a backend
//!
//! Backends are selected with a TOML config file, found through the
//! `SUPERSCORE_CFG` environment variable or the usual config directories:
//!
//! ```toml
//! [backend]
//! type = "filestore"
//! path = "./db/filestore.json"
//! ```
//!
//! ```rust,no_run
//! use superscore_store::{open_backend, StoreConfig};
//!
//! let backend = open_backend(&StoreConfig::load()?)?;
//! println!("using the {} backend", backend.name());
//! # Ok::<(), superscore_store::Error>(())
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod model;
pub mod persist;
pub mod search;

// Re-exports
pub use backends::{open_backend, Backend, MemoryBackend};
pub use config::{BackendConfig, BackendKind, StoreConfig};
pub use error::{Error, Result};
pub use model::{
    Collection, Entry, EntryRef, EntryType, EpicsValue, Parameter, Readback, Root, Setpoint,
    Severity, Snapshot, Status, TagGroup, TagGroupId, TagGroups, TagId, TagSet, FILL_ALL,
};
pub use search::{Operator, Search, SearchTerm, SearchValue};

#[cfg(feature = "filestore")]
pub use backends::FilestoreBackend;

#[cfg(feature = "directory")]
pub use backends::DirectoryBackend;

/// Environment variable holding the full path of the config file
pub const ENV_CONFIG: &str = "SUPERSCORE_CFG";

/// Config file names tried in each search directory, in order
pub const CONFIG_FILE_NAMES: [&str; 2] = [".superscore.toml", "superscore.toml"];

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
