//! Crash-safe file replacement.
//!
//! Data is written to a uniquely named temporary file next to the target,
//! which then replaces the target with a single rename. An interrupted write
//! leaves the previous file untouched.

use crate::{Error, Result};
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Prefix shared by in-flight temporary files.
pub const TEMP_PREFIX: &str = "_";

/// Writes `path` atomically with the bytes produced by `write`.
///
/// The temporary file is named `_<random>_<file name>` in the target's
/// directory. If the target already exists its permission bits are copied
/// onto the temporary file before the rename. On any failure the temporary
/// file is removed and the error is returned.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    write_via_temp(path, write, true)
}

/// Like [`write_atomic`], but fails with [`std::io::ErrorKind::AlreadyExists`]
/// instead of replacing an existing file.
pub fn create_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    write_via_temp(path, write, false)
}

fn write_via_temp<F>(path: &Path, write: F, clobber: bool) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .ok_or_else(|| Error::Storage(format!("{} does not name a file", path.display())))?;

    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(&format!("_{}", name.to_string_lossy()))
        .rand_bytes(8)
        .tempfile_in(dir)?;

    let result = (|| -> Result<()> {
        let mut writer = BufWriter::new(temp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
        drop(writer);
        temp.as_file().sync_all()?;

        if let Ok(meta) = fs::metadata(path) {
            fs::set_permissions(temp.path(), meta.permissions())?;
        }
        Ok(())
    })();

    if let Err(e) = result {
        log::debug!("atomic write of {} failed: {}", path.display(), e);
        return Err(e);
    }

    let persisted = if clobber {
        temp.persist(path)
    } else {
        temp.persist_noclobber(path)
    };
    persisted.map_err(|e| {
        log::debug!("moving temp file to {} failed: {}", path.display(), e.error);
        Error::Io(e.error)
    })?;
    Ok(())
}

/// Serializes `value` as pretty JSON and writes it atomically.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, |writer| {
        serde_json::to_writer_pretty(&mut *writer, value)?;
        writer.write_all(b"\n")?;
        Ok(())
    })
}

/// Serializes `value` as pretty JSON into a file that must not exist yet.
pub fn create_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    create_atomic(path, |writer| {
        serde_json::to_writer_pretty(&mut *writer, value)?;
        writer.write_all(b"\n")?;
        Ok(())
    })
}

/// Returns `true` for names used by in-flight temporary files.
pub fn is_temp_name(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX) || name.starts_with('.')
}
