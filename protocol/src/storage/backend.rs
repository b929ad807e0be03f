//! # Key-Value Backends
//!
//! The data store only needs a handful of things from its backing store:
//! point reads and writes, atomic batches, prefix scans and a way to copy
//! itself somewhere safe. [`KvBackend`] captures exactly that, and
//! [`SledBackend`] provides it on top of sled.
//!
//! Keys are UTF-8 paths (`main/names/outbound/transfer/example/0`), so a
//! prefix scan over `main/names/outbound/list/` lists every outbound name
//! in lexicographic order.

use sled::{Batch, Db, Tree};
use std::path::Path;
use thiserror::Error;

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("stored key is not valid UTF-8: {0}")]
    BadKey(String),

    #[error("corrupt version counter at {0}")]
    CorruptCounter(String),

    #[error("backup target {0} already exists")]
    BackupExists(String),

    #[error("unknown data store migration {0:?}")]
    UnknownMigration(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put(String, Vec<u8>),
    Delete(String),
}

/// A set of writes applied all-or-nothing.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Put(key.into(), value.into()));
    }

    pub fn delete(&mut self, key: impl Into<String>) {
        self.ops.push(BatchOp::Delete(key.into()));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Minimal key-value storage the data store is written against.
pub trait KvBackend: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Apply every write in `batch` atomically.
    fn apply(&self, batch: WriteBatch) -> StoreResult<()>;

    /// All entries whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>>;

    /// Copy the whole store to a new location. Callers hold off their own
    /// writes for the duration.
    fn backup_to(&self, path: &Path) -> StoreResult<usize>;
}

// ---------------------------------------------------------------------------
// Sled
// ---------------------------------------------------------------------------

/// [`KvBackend`] backed by a single sled tree.
///
/// sled handles concurrent readers itself, so a `SledBackend` can be shared
/// behind an `Arc` freely.
#[derive(Debug, Clone)]
pub struct SledBackend {
    db: Db,
    tree: Tree,
}

impl SledBackend {
    /// Open or create a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::from_db(sled::open(path)?)
    }

    /// An in-memory store that disappears on drop. For tests.
    pub fn open_temporary() -> StoreResult<Self> {
        let config = sled::Config::new().temporary(true);
        Self::from_db(config.open()?)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let tree = db.open_tree("namedex")?;
        Ok(Self { db, tree })
    }

    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Copy every entry into a fresh store at `path` and flush it. Refuses
    /// to write into a directory that already exists. Returns the number
    /// of entries copied.
    pub fn snapshot_to<P: AsRef<Path>>(&self, path: P) -> StoreResult<usize> {
        let path = path.as_ref();
        if path.exists() {
            return Err(StoreError::BackupExists(path.display().to_string()));
        }
        let target = Self::open(path)?;
        let mut batch = Batch::default();
        let mut copied = 0;
        for entry in self.tree.iter() {
            let (key, value) = entry?;
            batch.insert(key, value);
            copied += 1;
        }
        target.tree.apply_batch(batch)?;
        target.flush()?;
        Ok(copied)
    }
}

impl KvBackend for SledBackend {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.tree.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.tree.insert(key.as_bytes(), value)?;
        self.db.flush()?;
        Ok(())
    }

    fn apply(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut sled_batch = Batch::default();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put(key, value) => sled_batch.insert(key.as_bytes(), value),
                BatchOp::Delete(key) => sled_batch.remove(key.as_bytes()),
            }
        }
        self.tree.apply_batch(sled_batch)?;
        self.db.flush()?;
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        self.tree
            .scan_prefix(prefix.as_bytes())
            .map(|entry| {
                let (key, value) = entry?;
                let key = String::from_utf8(key.to_vec())
                    .map_err(|e| StoreError::BadKey(e.to_string()))?;
                Ok((key, value.to_vec()))
            })
            .collect()
    }

    fn backup_to(&self, path: &Path) -> StoreResult<usize> {
        self.snapshot_to(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_roundtrip() {
        let kv = SledBackend::open_temporary().unwrap();
        assert_eq!(kv.get("missing").unwrap(), None);
        kv.put("a/b", b"value").unwrap();
        assert_eq!(kv.get("a/b").unwrap(), Some(b"value".to_vec()));
    }

    #[test]
    fn batch_lands_together() {
        let kv = SledBackend::open_temporary().unwrap();
        let mut batch = WriteBatch::default();
        batch.put("x/1", b"one".to_vec());
        batch.put("x/2", b"two".to_vec());
        assert_eq!(batch.len(), 2);
        kv.apply(batch).unwrap();

        assert_eq!(kv.get("x/1").unwrap(), Some(b"one".to_vec()));
        assert_eq!(kv.get("x/2").unwrap(), Some(b"two".to_vec()));

        let mut batch = WriteBatch::default();
        batch.delete("x/1");
        batch.put("y/1", b"moved".to_vec());
        kv.apply(batch).unwrap();
        assert_eq!(kv.get("x/1").unwrap(), None);
        assert_eq!(kv.get("y/1").unwrap(), Some(b"moved".to_vec()));
    }

    #[test]
    fn prefix_scan_is_ordered_and_bounded() {
        let kv = SledBackend::open_temporary().unwrap();
        kv.put("list/bravo", b"1").unwrap();
        kv.put("list/alpha", b"0").unwrap();
        kv.put("lisp/other", b"2").unwrap();

        let keys: Vec<_> = kv
            .scan_prefix("list/")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["list/alpha", "list/bravo"]);
    }

    #[test]
    fn reopen_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let kv = SledBackend::open(dir.path()).unwrap();
            kv.put("persisted", b"yes").unwrap();
        }
        let kv = SledBackend::open(dir.path()).unwrap();
        assert_eq!(kv.get("persisted").unwrap(), Some(b"yes".to_vec()));
    }

    #[test]
    fn snapshot_copies_everything_once() {
        let dir = tempfile::tempdir().unwrap();
        let kv = SledBackend::open_temporary().unwrap();
        kv.put("a", b"1").unwrap();
        kv.put("b/c", b"2").unwrap();

        let target = dir.path().join("snapshot");
        assert_eq!(kv.snapshot_to(&target).unwrap(), 2);
        assert!(matches!(
            kv.snapshot_to(&target),
            Err(StoreError::BackupExists(_))
        ));

        let copy = SledBackend::open(&target).unwrap();
        assert_eq!(copy.get("b/c").unwrap(), Some(b"2".to_vec()));
    }
}
