//! Persistent store using RocksDB optimistic transactions.

use rocksdb::{Direction, ErrorKind, IteratorMode, OptimisticTransactionDB, Options, Transaction};
use std::path::Path;
use tracing::debug;

use super::{Store, Tx, Txn};
use crate::error::{Error, Result};

/// Conflicting commits are retried this many times before giving up.
const MAX_ATTEMPTS: usize = 16;

/// RocksDB-backed store.
///
/// Every read goes through `get_for_update`, so a transaction that read a
/// key fails to commit if another transaction wrote that key first. The
/// closure is then run again against fresh data.
pub struct RocksStore {
    db: OptimisticTransactionDB,
}

impl RocksStore {
    /// Open or create storage at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = OptimisticTransactionDB::open(&opts, path)?;
        Ok(Self { db })
    }
}

struct RocksTxn<'a, 'db> {
    txn: &'a Transaction<'db, OptimisticTransactionDB>,
}

impl Txn for RocksTxn<'_, '_> {
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.txn.get_for_update(key.as_bytes(), true)?)
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        Ok(self.txn.put(key.as_bytes(), value)?)
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        Ok(self.txn.delete(key.as_bytes())?)
    }

    fn scan(&mut self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let prefix = prefix.as_bytes();
        let mut rows = Vec::new();

        let iter = self
            .txn
            .iterator(IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            let key = String::from_utf8(key.into_vec())
                .map_err(|_| Error::Storage("non-utf8 key in store".into()))?;
            rows.push((key, value.into_vec()));
        }

        Ok(rows)
    }
}

impl Store for RocksStore {
    fn transact<T, F>(&self, mut f: F) -> Result<T>
    where
        F: FnMut(&mut Tx<'_>) -> Result<T>,
    {
        for attempt in 1..=MAX_ATTEMPTS {
            let txn = self.db.transaction();
            let out = {
                let mut view = RocksTxn { txn: &txn };
                f(&mut Tx::new(&mut view))?
            };

            match txn.commit() {
                Ok(()) => return Ok(out),
                Err(e) if matches!(e.kind(), ErrorKind::Busy | ErrorKind::TryAgain) => {
                    debug!(attempt, "transaction conflicted, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::Storage(format!(
            "transaction still conflicting after {MAX_ATTEMPTS} attempts"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Group, GroupId, NewGroup};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tempfile::tempdir;

    #[test]
    fn storage_roundtrip() {
        let dir = tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();

        let group = Group::create(NewGroup::new("Rocks", Decimal::from(10), 2), Utc::now());
        let id = group.id.clone();
        store
            .transact(|tx| tx.save_group(&mut group.clone(), Utc::now()))
            .unwrap();

        let loaded = store.transact(|tx| tx.require_group(&id)).unwrap();
        assert_eq!(loaded.name, group.name);
        assert_eq!(loaded.revision, 1);
    }

    #[test]
    fn failed_closure_rolls_back() {
        let dir = tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();

        let result: Result<()> = store.transact(|tx| {
            tx.txn.put("group:x", b"{}")?;
            Err(Error::InvalidInput("abort".into()))
        });
        assert!(result.is_err());

        let seen = store.transact(|tx| tx.group(&GroupId::new("x"))).unwrap();
        assert!(seen.is_none());
    }

    #[test]
    fn scan_stops_at_prefix_end() {
        let dir = tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        store
            .transact(|tx| {
                tx.txn.put("a:1", b"1")?;
                tx.txn.put("a:2", b"2")?;
                tx.txn.put("b:1", b"3")
            })
            .unwrap();

        let rows = store.transact(|tx| tx.txn.scan("a:")).unwrap();
        assert_eq!(rows.len(), 2);
    }
}
