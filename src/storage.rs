//! Ledger storage backends
//!
//! Every mutating engine operation stages its writes into a [`WriteBatch`]
//! and hands it to [`LedgerStore::commit`], which applies all puts or none.

use crate::config::{StorageBackend, StorageConfig};
use crate::errors::{EngineResult, StorageError};
use rocksdb::{Direction, IteratorMode, Options, DB};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Ordered set of puts applied atomically
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    puts: Vec<(Vec<u8>, Vec<u8>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.puts.push((key.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.puts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.puts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.puts.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }
}

/// Byte-keyed store with atomic batch commits
pub trait LedgerStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// All entries whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;

    fn commit(&self, batch: WriteBatch) -> Result<(), StorageError>;
}

/// In-process store for tests and the development preset
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::ReadFailed("memory store lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::ReadFailed("memory store lock poisoned".to_string()))?;
        Ok(entries
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::WriteFailed("memory store lock poisoned".to_string()))?;
        for (key, value) in batch.puts {
            entries.insert(key, value);
        }
        Ok(())
    }
}

/// RocksDB-backed durable store
#[derive(Clone)]
pub struct RocksStore {
    db: Arc<DB>,
}

impl RocksStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        Self::with_write_buffer(path, 64)
    }

    pub fn new_with_config(config: &StorageConfig) -> Result<Self, StorageError> {
        if config.clear_on_start && Path::new(&config.data_directory).exists() {
            std::fs::remove_dir_all(&config.data_directory).map_err(|e| {
                StorageError::DatabaseOpenFailed(format!(
                    "Failed to clear {}: {}",
                    config.data_directory, e
                ))
            })?;
            tracing::warn!(path = %config.data_directory, "cleared ledger directory on start");
        }
        Self::with_write_buffer(&config.data_directory, config.write_buffer_size_mb)
    }

    fn with_write_buffer<P: AsRef<Path>>(path: P, write_buffer_mb: usize) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(write_buffer_mb * 1024 * 1024);
        opts.set_max_write_buffer_number(4);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path.as_ref()).map_err(|e| {
            StorageError::DatabaseOpenFailed(format!("{}: {}", path.as_ref().display(), e))
        })?;
        tracing::info!(path = %path.as_ref().display(), "opened ledger database");
        Ok(Self { db: Arc::new(db) })
    }
}

impl LedgerStore for RocksStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        self.db
            .get(key)
            .map_err(|e| StorageError::ReadFailed(e.to_string()))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let mut rows = Vec::new();
        for item in self.db.iterator(IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) = item.map_err(|e| StorageError::ReadFailed(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key.into_vec(), value.into_vec()));
        }
        Ok(rows)
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut rocks_batch = rocksdb::WriteBatch::default();
        for (key, value) in batch.iter() {
            rocks_batch.put(key, value);
        }
        self.db.write(rocks_batch)?;
        Ok(())
    }
}

/// Open the backend selected in `config`.
pub fn open_store(config: &StorageConfig) -> EngineResult<Arc<dyn LedgerStore>> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::RocksDb => Ok(Arc::new(RocksStore::new_with_config(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn LedgerStore) {
        let mut batch = WriteBatch::new();
        batch.put(b"bet:\x00\x02".to_vec(), b"two".to_vec());
        batch.put(b"bet:\x00\x01".to_vec(), b"one".to_vec());
        batch.put(b"round:\x00\x01".to_vec(), b"r".to_vec());
        assert_eq!(batch.len(), 3);
        store.commit(batch).unwrap();

        assert_eq!(store.get(b"round:\x00\x01").unwrap(), Some(b"r".to_vec()));
        assert_eq!(store.get(b"missing").unwrap(), None);

        let bets = store.scan_prefix(b"bet:").unwrap();
        let values: Vec<&[u8]> = bets.iter().map(|(_, v)| v.as_slice()).collect();
        assert_eq!(values, vec![b"one".as_slice(), b"two".as_slice()]);
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_rocks_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksStore::new(dir.path()).unwrap();
        exercise(&store);
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let store = MemoryStore::new();
        store.commit(WriteBatch::new()).unwrap();
        assert!(store.scan_prefix(b"").unwrap().is_empty());
    }
}
