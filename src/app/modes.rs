//! Named parameter presets ("modes") on a [`StoragePort`].
//!
//! Layout:
//!
//! - `modeidx/index`: postcard-encoded list of names, at most
//!   [`MAX_MODES`](super::commands::MAX_MODES).
//! - `modes/<name>`: postcard-encoded [`PumpParameters`].
//!
//! The index lives in its own namespace, so no mode name can collide with
//! it.  Fixed names stay within FAT 8.3 limits; mode names longer than
//! eight characters need long file name support on the card.  Writes put the blob before the index and deletes drop the index
//! entry before the blob, so the index never names a missing blob.

use log::{info, warn};

use super::commands::{mode_name, ModeList, ModeName};
use super::ports::StoragePort;
use crate::error::StorageError;
use crate::params::PumpParameters;

pub const MODES_NAMESPACE: &str = "modes";
pub const INDEX_NAMESPACE: &str = "modeidx";
const INDEX_KEY: &str = "index";

/// Encoded index upper bound: 16 × (1 length byte + 16 name bytes) + 1.
const INDEX_BUF: usize = 320;
const PARAMS_BUF: usize = 64;

pub struct ModeStore<S: StoragePort> {
    storage: S,
}

impl<S: StoragePort> ModeStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Stored mode names, in insertion order.
    pub fn list(&self) -> Result<ModeList, StorageError> {
        let mut buf = [0u8; INDEX_BUF];
        match self.storage.read(INDEX_NAMESPACE, INDEX_KEY, &mut buf) {
            Ok(len) => postcard::from_bytes(&buf[..len]).map_err(|_| {
                warn!("storage: mode index corrupted");
                StorageError::Corrupted
            }),
            Err(StorageError::NotFound) => Ok(ModeList::new()),
            Err(e) => Err(e),
        }
    }

    pub fn contains(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.list()?.iter().any(|m| m.as_str() == name))
    }

    /// Read a mode.  Does not validate; the caller applies it through the
    /// parameter write boundary.
    pub fn load(&self, name: &str) -> Result<PumpParameters, StorageError> {
        let name = mode_name(name)?;
        if !self.contains(&name)? {
            return Err(StorageError::NotFound);
        }
        let mut buf = [0u8; PARAMS_BUF];
        let len = self.storage.read(MODES_NAMESPACE, &name, &mut buf)?;
        postcard::from_bytes(&buf[..len]).map_err(|_| {
            warn!("storage: mode '{}' corrupted", name);
            StorageError::Corrupted
        })
    }

    /// Create or overwrite.
    pub fn save(&mut self, name: &str, params: &PumpParameters) -> Result<(), StorageError> {
        let name = mode_name(name)?;
        let mut index = self.list()?;
        let is_new = !index.iter().any(|m| *m == name);
        if is_new && index.is_full() {
            return Err(StorageError::Full);
        }
        self.write_params(&name, params)?;
        if is_new {
            index.push(name.clone()).map_err(|_| StorageError::Full)?;
            self.write_index(&index)?;
        }
        info!(
            "storage: {} mode '{}'",
            if is_new { "created" } else { "updated" },
            name
        );
        Ok(())
    }

    /// Create; fails with `AlreadyExists` when the name is taken.
    pub fn add(&mut self, name: &str, params: &PumpParameters) -> Result<(), StorageError> {
        if self.contains(name)? {
            return Err(StorageError::AlreadyExists);
        }
        self.save(name, params)
    }

    pub fn delete(&mut self, name: &str) -> Result<(), StorageError> {
        let name = mode_name(name)?;
        let mut index = self.list()?;
        let Some(pos) = index.iter().position(|m| *m == name) else {
            return Err(StorageError::NotFound);
        };
        index.remove(pos);
        self.write_index(&index)?;
        self.storage.delete(MODES_NAMESPACE, &name)?;
        info!("storage: deleted mode '{}'", name);
        Ok(())
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn write_params(&mut self, name: &ModeName, params: &PumpParameters) -> Result<(), StorageError> {
        let mut buf = [0u8; PARAMS_BUF];
        let bytes = postcard::to_slice(params, &mut buf).map_err(|_| StorageError::Corrupted)?;
        self.storage.write(MODES_NAMESPACE, name, bytes)
    }

    fn write_index(&mut self, index: &ModeList) -> Result<(), StorageError> {
        let mut buf = [0u8; INDEX_BUF];
        let bytes = postcard::to_slice(index, &mut buf).map_err(|_| StorageError::Corrupted)?;
        self.storage.write(INDEX_NAMESPACE, INDEX_KEY, bytes)
    }
}
