//! [`StoragePort`] backends.
//!
//! - [`FileStorage`]: one file per key under `<root>/<namespace>/`.  On the
//!   target the root is the FAT-formatted SD card mounted on the VFS at
//!   [`pins::SD_MOUNT_POINT`](crate::pins::SD_MOUNT_POINT); on the host any
//!   directory works.  Writes go to a sibling temp file which is then
//!   renamed over the old one, so a reader never sees a half-written blob.
//! - [`MemoryStorage`]: a map, for tests and the host simulation.
//!
//! Namespaces and keys become path components and follow the mode name
//! rule, [`is_name_char`].  The temp file adds the only dot.

use std::collections::HashMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use log::warn;

use crate::app::commands::is_name_char;
use crate::app::ports::StoragePort;
use crate::error::StorageError;

fn valid_component(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_name_char)
}

fn copy_out(data: &[u8], buf: &mut [u8]) -> Result<usize, StorageError> {
    // Larger than the caller's record type can be: cannot decode anyway.
    if data.len() > buf.len() {
        return Err(StorageError::Corrupted);
    }
    buf[..data.len()].copy_from_slice(data);
    Ok(data.len())
}

// ───────────────────────────────────────────────────────────────
// In-memory
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryStorage {
    store: HashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{namespace}::{key}")
    }

    /// Number of stored keys across all namespaces.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl StoragePort for MemoryStorage {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.store.get(&Self::composite_key(namespace, key)) {
            Some(data) => copy_out(data, buf),
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.store
            .insert(Self::composite_key(namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&Self::composite_key(namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store.contains_key(&Self::composite_key(namespace, key))
    }
}

// ───────────────────────────────────────────────────────────────
// File-backed
// ───────────────────────────────────────────────────────────────

pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Use `root` as the storage directory, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| io_error("create root", &root, &e))?;
        log::info!("storage: file backend at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, namespace: &str, key: &str) -> Result<PathBuf, StorageError> {
        if !valid_component(namespace) || !valid_component(key) {
            return Err(StorageError::InvalidName);
        }
        Ok(self.root.join(namespace).join(key))
    }
}

fn io_error(op: &str, path: &Path, e: &io::Error) -> StorageError {
    warn!("storage: {} {} failed: {}", op, path.display(), e);
    match e.kind() {
        ErrorKind::NotFound => StorageError::NotFound,
        ErrorKind::StorageFull => StorageError::Full,
        _ => StorageError::IoError,
    }
}

impl StoragePort for FileStorage {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let path = self.path(namespace, key)?;
        match fs::read(&path) {
            Ok(data) => copy_out(&data, buf),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(e) => Err(io_error("read", &path, &e)),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.path(namespace, key)?;
        let dir = self.root.join(namespace);
        fs::create_dir_all(&dir).map_err(|e| io_error("mkdir", &dir, &e))?;

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, data).map_err(|e| io_error("write", &tmp, &e))?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            io_error("rename", &path, &e)
        })
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let path = self.path(namespace, key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete", &path, &e)),
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.path(namespace, key).is_ok_and(|p| p.is_file())
    }
}
