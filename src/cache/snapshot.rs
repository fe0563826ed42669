//! Snapshot Module
//!
//! Writes the entry map out as JSON and merges a previously written map back
//! in. The layout is whatever serde produces for `HashMap<String, Entry<T>>`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::cache::{Entry, Store};
use crate::error::{CacheError, Result};

impl<T: Serialize> Store<T> {
    // == Save ==
    /// Writes every entry, expired ones included, to `writer`.
    ///
    /// The map is encoded into memory under the read lock; `writer` is only
    /// touched after the lock is released.
    pub fn save<W: Write>(&self, mut writer: W) -> Result<()> {
        let bytes = self
            .with_entries(serde_json::to_vec)
            .map_err(CacheError::Encode)?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    /// Writes the snapshot to `path`, creating or truncating the file.
    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

impl<T: DeserializeOwned> Store<T> {
    // == Load ==
    /// Merges a snapshot read from `reader` into the store.
    ///
    /// The whole snapshot is decoded before the store is touched, so
    /// malformed input leaves the live entries unchanged. Incoming entries
    /// never displace live ones (see [`Store::load_items`]). Returns the
    /// number of entries applied.
    pub fn load<R: Read>(&self, reader: R) -> Result<usize> {
        let items: HashMap<String, Entry<T>> =
            serde_json::from_reader(reader).map_err(CacheError::Decode)?;
        let decoded = items.len();
        let applied = self.load_items(items);
        debug!(decoded, applied, "Snapshot loaded");
        Ok(applied)
    }

    /// Merges the snapshot stored at `path` into the store.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        self.load(BufReader::new(File::open(path)?))
    }
}
