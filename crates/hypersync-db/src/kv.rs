//! The contract the snapshot engine and the chunk server need from whatever
//! embedded ordered key-value store backs the live database. Opening and
//! closing the store are constructor-level concerns of a concrete
//! implementation, not part of this trait, since `open` can't return `Self`
//! from a trait object.

use hypersync_primitives::DbEntry;

use crate::errors::DbResult;

/// A single write against a [`KvStore`]: either set a key to a value, or
/// delete it.
#[derive(Debug, Clone)]
pub enum KvWrite {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>>;

    /// Ordered entries under `prefix`, starting at (and including)
    /// `start_key`, up to `limit` entries. The returned bool is `true` when
    /// the slice was truncated by `limit`, i.e. there is more to fetch.
    fn iterate_prefix(
        &self,
        prefix: &[u8],
        start_key: &[u8],
        limit: usize,
    ) -> DbResult<(Vec<DbEntry>, bool)>;

    /// Deletes every key under `prefix`. Used to retire a past epoch's
    /// ancestral records once nothing can query it any longer.
    fn drop_prefix(&self, prefix: &[u8]) -> DbResult<()>;

    /// Applies `writes` atomically: either all of them land, or none do.
    fn write_batch(&self, writes: Vec<KvWrite>) -> DbResult<()>;
}

#[cfg(feature = "test-support")]
pub mod mem {
    use std::collections::BTreeMap;
    use std::sync::RwLock;

    use super::*;

    /// A `BTreeMap`-backed [`KvStore`] for tests that don't need a real
    /// embedded store, only its ordering and prefix semantics.
    #[derive(Default)]
    pub struct MemKvStore {
        inner: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    }

    impl MemKvStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl KvStore for MemKvStore {
        fn get(&self, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
            Ok(self.inner.read().unwrap().get(key).cloned())
        }

        fn iterate_prefix(
            &self,
            prefix: &[u8],
            start_key: &[u8],
            limit: usize,
        ) -> DbResult<(Vec<DbEntry>, bool)> {
            let map = self.inner.read().unwrap();
            let mut out = Vec::new();
            let mut truncated = false;
            for (k, v) in map.range(start_key.to_vec()..) {
                if !k.starts_with(prefix) {
                    if k.as_slice() >= prefix.as_ref() {
                        break;
                    }
                    continue;
                }
                if out.len() == limit {
                    truncated = true;
                    break;
                }
                out.push(DbEntry::new(k.clone(), v.clone()));
            }
            Ok((out, truncated))
        }

        fn drop_prefix(&self, prefix: &[u8]) -> DbResult<()> {
            let mut map = self.inner.write().unwrap();
            let doomed: Vec<Vec<u8>> = map
                .range(prefix.to_vec()..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, _)| k.clone())
                .collect();
            for k in doomed {
                map.remove(&k);
            }
            Ok(())
        }

        fn write_batch(&self, writes: Vec<KvWrite>) -> DbResult<()> {
            let mut map = self.inner.write().unwrap();
            for w in writes {
                match w {
                    KvWrite::Put(k, v) => {
                        map.insert(k, v);
                    }
                    KvWrite::Delete(k) => {
                        map.remove(&k);
                    }
                }
            }
            Ok(())
        }
    }

}
