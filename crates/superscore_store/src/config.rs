//! Store configuration loaded from TOML.
//!
//! ```toml
//! [backend]
//! type = "directory"
//! path = "./db"
//! radix_depth = 3
//! ```

use crate::{Error, Result, CONFIG_FILE_NAMES, ENV_CONFIG};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The storage engine to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One JSON file holding the whole tree.
    Filestore,
    /// One JSON file per record under a radix directory tree.
    Directory,
    /// Volatile, in-process storage.
    #[serde(alias = "test")]
    Memory,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filestore => "filestore",
            Self::Directory => "directory",
            Self::Memory => "memory",
        }
    }
}

/// The `[backend]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(rename = "type")]
    pub kind: BackendKind,
    /// Location of the store. Required for the file-backed engines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Directory engine only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radix_depth: Option<usize>,
}

impl BackendConfig {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            path: None,
            radix_depth: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Returns the configured path, or a `Config` error naming the engine.
    pub fn require_path(&self) -> Result<&Path> {
        self.path.as_deref().ok_or_else(|| {
            Error::Config(format!(
                "the {} backend needs a `path`",
                self.kind.as_str()
            ))
        })
    }
}

/// Top-level store configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `None` selects the in-memory engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendConfig>,
}

impl StoreConfig {
    pub fn new(backend: BackendConfig) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Parses a configuration. Paths are kept as written.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reads a configuration file.
    ///
    /// A relative backend `path` is resolved against the directory holding
    /// the file, and a leading `~` is expanded to the home directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        log::debug!("loading configuration file at {}", path.display());

        let mut config = Self::from_toml(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        if let Some(store_path) = config.backend.as_mut().and_then(|b| b.path.as_mut()) {
            *store_path = resolve_path(base, store_path);
        }
        Ok(config)
    }

    /// Finds and reads the configuration file.
    ///
    /// Looks at `$SUPERSCORE_CFG` first, then for `.superscore.toml` or
    /// `superscore.toml` in `$XDG_CONFIG_HOME` (or the working directory)
    /// and in `~/.config`.
    pub fn load() -> Result<Self> {
        Self::from_file(Self::find()?)
    }

    /// Returns the path of the configuration file [`StoreConfig::load`] would read.
    pub fn find() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(ENV_CONFIG).filter(|v| !v.is_empty()) {
            log::debug!("found ${} pointing at {:?}", ENV_CONFIG, path);
            return Ok(PathBuf::from(path));
        }

        let mut dirs = vec![std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))];
        if let Some(home) = dirs::home_dir() {
            dirs.push(home.join(".config"));
        }

        find_in(&dirs).ok_or_else(|| {
            Error::Config(format!(
                "no configuration file found, check ${}",
                ENV_CONFIG
            ))
        })
    }
}

/// Returns the first existing config file among `dirs`.
fn find_in(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter().find_map(|dir| {
        log::debug!("searching for configuration in {}", dir.display());
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

/// Expands `~` and anchors relative paths at `base`.
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    };

    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_backend_section() {
        let config = StoreConfig::from_toml(
            r#"
            [backend]
            type = "directory"
            path = "/var/superscore"
            radix_depth = 2
            "#,
        )
        .unwrap();

        let backend = config.backend.unwrap();
        assert_eq!(backend.kind, BackendKind::Directory);
        assert_eq!(backend.path, Some(PathBuf::from("/var/superscore")));
        assert_eq!(backend.radix_depth, Some(2));
    }

    #[test]
    fn test_test_is_an_alias_for_memory() {
        let config = StoreConfig::from_toml("[backend]\ntype = \"test\"\n").unwrap();
        assert_eq!(config.backend.unwrap().kind, BackendKind::Memory);
    }

    #[test]
    fn test_missing_backend_section() {
        let config = StoreConfig::from_toml("").unwrap();
        assert!(config.backend.is_none());
    }

    #[test]
    fn test_unknown_backend_type_is_config_error() {
        let err = StoreConfig::from_toml("[backend]\ntype = \"mongo\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = StoreConfig::new(BackendConfig::new(BackendKind::Filestore).with_path("db.json"));
        let text = config.to_toml().unwrap();
        assert_eq!(StoreConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_from_file_resolves_relative_path() {
        let dir = TempDir::new().unwrap();
        let cfg = dir.path().join("superscore.toml");
        std::fs::write(&cfg, "[backend]\ntype = \"filestore\"\npath = \"db/store.json\"\n").unwrap();

        let config = StoreConfig::from_file(&cfg).unwrap();
        assert_eq!(
            config.backend.unwrap().path,
            Some(dir.path().join("db/store.json"))
        );
    }

    #[test]
    fn test_resolve_path_keeps_absolute() {
        let abs = if cfg!(windows) { "C:\\db" } else { "/db" };
        assert_eq!(resolve_path(Path::new("/etc"), Path::new(abs)), PathBuf::from(abs));
    }

    #[test]
    fn test_find_in_prefers_hidden_name_then_first_dir() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        std::fs::write(second.path().join(".superscore.toml"), "").unwrap();
        std::fs::write(second.path().join("superscore.toml"), "").unwrap();

        let dirs = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        assert_eq!(find_in(&dirs), Some(second.path().join(".superscore.toml")));

        std::fs::write(first.path().join("superscore.toml"), "").unwrap();
        assert_eq!(find_in(&dirs), Some(first.path().join("superscore.toml")));
    }

    #[test]
    fn test_require_path() {
        let backend = BackendConfig::new(BackendKind::Directory);
        assert!(matches!(backend.require_path(), Err(Error::Config(_))));
    }
}
