//! File-backed collection store: one JSON document per collection.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use kakeibo_core::store::{Collection, LedgerStore, StoreError};
use kakeibo_core::transactions::Transaction;

/// Stores each collection as `<data_dir>/<key>.json`.
///
/// Saves replace the whole document through a temp-file rename, so a
/// crash mid-write never leaves a half-written collection behind. There is
/// no transaction across collections.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path_for(&self, collection: Collection) -> PathBuf {
        self.data_dir.join(format!("{}.json", collection.key()))
    }
}

impl LedgerStore for JsonFileStore {
    fn load(&self, collection: Collection) -> Result<Vec<Transaction>, StoreError> {
        let raw = match fs::read(self.path_for(collection)) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&raw).map_err(|err| StoreError::Decode(err.to_string()))
    }

    fn save(&self, collection: Collection, entries: &[Transaction]) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec_pretty(entries)
            .map_err(|err| StoreError::Encode(err.to_string()))?;

        fs::create_dir_all(&self.data_dir)?;
        let path = self.path_for(collection);
        let staged = path.with_extension("json.tmp");
        fs::write(&staged, encoded)?;
        fs::rename(&staged, &path)?;
        Ok(())
    }
}
