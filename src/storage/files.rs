//! Atomic file I/O and per-path write locks
//!
//! Writers always write a temp file in the target directory, fsync it, then
//! rename it over the target. Readers never see a partially written file
//! and never need a lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::index::{IndexError, IndexResult};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Per-path async mutexes serializing writers of the same file.
#[derive(Debug, Default)]
pub struct FileLocks {
    locks: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `path`, waiting for any other holder.
    pub async fn lock(&self, path: &Path) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = match self.locks.lock() {
                Ok(locks) => locks,
                Err(poisoned) => poisoned.into_inner(),
            };
            // Drop entries nobody is holding or waiting on
            if locks.len() > 1024 {
                locks.retain(|_, m| Arc::strong_count(m) > 1);
            }
            locks
                .entry(path.to_path_buf())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        mutex.lock_owned().await
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{}.{}.{}.tmp", name, std::process::id(), n))
}

/// Writes `bytes` to `path` via temp file + rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> IndexResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| IndexError::io(parent, e))?;
    }

    let temp = temp_path_for(path);
    let result = async {
        let mut file = fs::File::create(&temp)
            .await
            .map_err(|e| IndexError::io(&temp, e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| IndexError::io(&temp, e))?;
        file.sync_all()
            .await
            .map_err(|e| IndexError::io(&temp, e))?;
        fs::rename(&temp, path)
            .await
            .map_err(|e| IndexError::io(path, e))
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&temp).await;
    }
    result
}

/// Serializes `value` as pretty JSON and writes it atomically.
///
/// Returns the number of bytes written.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> IndexResult<u64> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| IndexError::corrupt(path, e))?;
    write_atomic(path, &bytes).await?;
    Ok(bytes.len() as u64)
}

/// Reads and parses a JSON file. A missing file is `Ok(None)`.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> IndexResult<Option<T>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(IndexError::io(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| IndexError::corrupt(path, e))
}

/// Removes a file. Returns false if it did not exist.
pub async fn remove_if_exists(path: &Path) -> IndexResult<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(IndexError::io(path, e)),
    }
}

/// Removes a directory tree. Returns false if it did not exist.
pub async fn remove_dir_if_exists(path: &Path) -> IndexResult<bool> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(IndexError::io(path, e)),
    }
}

/// Checks existence without opening the file
pub async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

/// Size of a file in bytes, if it exists
pub async fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path).await.ok().map(|m| m.len())
}

/// Lists regular files directly under `dir` (empty if the dir is missing)
pub async fn list_files(dir: &Path) -> IndexResult<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(IndexError::io(dir, e)),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| IndexError::io(dir, e))?
    {
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if is_file && !hidden {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Lists subdirectories directly under `dir`
pub async fn list_dirs(dir: &Path) -> IndexResult<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(IndexError::io(dir, e)),
    };

    let mut dirs = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| IndexError::io(dir, e))?
    {
        if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}
