//! Storage port for catalog files.
//!
//! Parsing, merging, compiling and validating operate on in-memory data.
//! Every file access the workflow needs goes through [`Storage`], so the
//! whole pipeline can run against [`MemoryStorage`] in tests.

use crate::error::{CatalogError, Result};
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;
use tracing::{debug, info};

pub trait Storage {
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write the full contents. The data is durable once this returns.
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    fn exists(&self, path: &Path) -> bool;

    /// Last modification time, if known.
    fn modified(&self, path: &Path) -> Option<SystemTime>;

    /// Size in bytes, or `None` when the file does not exist.
    fn size(&self, path: &Path) -> Option<u64> {
        self.read(path).ok().map(|bytes| bytes.len() as u64)
    }

    /// Read a file as UTF-8 text, replacing invalid sequences.
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Local filesystem adapter.
#[derive(Debug, Clone, Default)]
pub struct FsStorage;

impl Storage for FsStorage {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let compile_err = |source| CatalogError::Compile {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(compile_err)?;
        }
        let mut file = File::create(path).map_err(compile_err)?;
        file.write_all(bytes).map_err(compile_err)?;
        file.sync_all().map_err(compile_err)?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        fs::metadata(path).and_then(|m| m.modified()).ok()
    }

    fn size(&self, path: &Path) -> Option<u64> {
        fs::metadata(path).map(|m| m.len()).ok()
    }
}

/// In-memory adapter, mainly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<PathBuf, (Vec<u8>, SystemTime)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes, SystemTime::now());
        self
    }

    /// Insert a file with an explicit modification time.
    pub fn insert(&self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>, modified: SystemTime) {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), (bytes.into(), modified));
    }

    /// Paths currently stored, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .files
            .lock()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }
}

impl Storage for MemoryStorage {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.files
            .lock()
            .ok()
            .and_then(|files| files.get(path).map(|(bytes, _)| bytes.clone()))
            .ok_or_else(|| CatalogError::Read {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            })
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut files = self.files.lock().map_err(|_| CatalogError::Compile {
            path: path.to_path_buf(),
            source: std::io::Error::other("storage lock poisoned"),
        })?;
        files.insert(path.to_path_buf(), (bytes.to_vec(), SystemTime::now()));
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files
            .lock()
            .map(|files| files.contains_key(path))
            .unwrap_or(false)
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        self.files
            .lock()
            .ok()
            .and_then(|files| files.get(path).map(|(_, modified)| *modified))
    }
}

/// Path of a timestamped backup for `source` inside `backup_dir`:
/// `<stem>_<YYYYmmddHHMMSS>.<ext>`.
pub fn backup_path(source: &Path, backup_dir: &Path, at: DateTime<Local>) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "catalog".to_string());
    let ext = source
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "po".to_string());
    backup_dir.join(format!("{}_{}.{}", stem, at.format("%Y%m%d%H%M%S"), ext))
}

/// Like [`backup_path`], but appends `_1`, `_2`, ... when a backup with the
/// same timestamp already exists.
fn free_backup_path<S: Storage + ?Sized>(
    storage: &S,
    source: &Path,
    backup_dir: &Path,
    at: DateTime<Local>,
) -> PathBuf {
    let base = backup_path(source, backup_dir, at);
    if !storage.exists(&base) {
        return base;
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = base
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    (1..)
        .map(|n| backup_dir.join(format!("{}_{}.{}", stem, n, ext)))
        .find(|candidate| !storage.exists(candidate))
        .unwrap_or(base)
}

/// Copy `source` byte-for-byte into a timestamped backup.
///
/// Returns `Ok(None)` when there is nothing to back up yet.
pub fn create_backup<S: Storage + ?Sized>(
    storage: &S,
    source: &Path,
    backup_dir: &Path,
) -> Result<Option<PathBuf>> {
    if !storage.exists(source) {
        debug!("No existing file at {}, skipping backup", source.display());
        return Ok(None);
    }
    let bytes = storage.read(source)?;
    let target = free_backup_path(storage, source, backup_dir, Local::now());
    storage.write(&target, &bytes)?;
    info!("Backup created: {}", target.display());
    Ok(Some(target))
}
