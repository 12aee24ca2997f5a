//! In-memory store for tests and single-process deployments.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Mutex;

use super::{Store, Tx, Txn};
use crate::error::{Error, Result};

/// Ordered map behind a mutex. A transaction holds the lock for its whole
/// duration, so transactions are serializable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Writes are staged here and applied only if the closure succeeds.
struct Staged<'a> {
    base: &'a BTreeMap<String, Vec<u8>>,
    writes: BTreeMap<String, Option<Vec<u8>>>,
}

fn prefixed<'a, V>(
    map: &'a BTreeMap<String, V>,
    prefix: &'a str,
) -> impl Iterator<Item = (&'a String, &'a V)> + 'a {
    map.range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
        .take_while(move |(key, _)| key.starts_with(prefix))
}

impl Txn for Staged<'_> {
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(staged) = self.writes.get(key) {
            return Ok(staged.clone());
        }
        Ok(self.base.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.writes.insert(key.to_string(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.writes.insert(key.to_string(), None);
        Ok(())
    }

    fn scan(&mut self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let mut merged: BTreeMap<String, Vec<u8>> = prefixed(self.base, prefix)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, staged) in prefixed(&self.writes, prefix) {
            match staged {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }
}

impl Store for MemoryStore {
    fn transact<T, F>(&self, mut f: F) -> Result<T>
    where
        F: FnMut(&mut Tx<'_>) -> Result<T>,
    {
        let mut data = self
            .data
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".into()))?;

        let mut staged = Staged {
            base: &*data,
            writes: BTreeMap::new(),
        };
        let out = f(&mut Tx::new(&mut staged))?;

        for (key, write) in staged.writes {
            match write {
                Some(value) => {
                    data.insert(key, value);
                }
                None => {
                    data.remove(&key);
                }
            }
        }
        Ok(out)
    }
}
