//! In-flight mutation batches awaiting persistence into the ancestral store.
//! One `AncestralCache` is opened per `prepare_flush()` call and lives until
//! the dispatcher has flushed it.

use std::collections::{BTreeMap, BTreeSet};

use hypersync_db::AncestralRecord;

/// Pre-images captured for a single mutation batch. `existing` and
/// `non_existing` are always disjoint; `keys_ordered` is their union in
/// first-seen order until [`AncestralCache::sorted_records`] is called.
#[derive(Debug, Clone)]
pub struct AncestralCache {
    pub id: u64,
    existing: BTreeMap<Vec<u8>, Vec<u8>>,
    non_existing: BTreeSet<Vec<u8>>,
    keys_ordered: Vec<Vec<u8>>,
}

impl AncestralCache {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            existing: BTreeMap::new(),
            non_existing: BTreeSet::new(),
            keys_ordered: Vec::new(),
        }
    }

    /// Records the pre-image of `key`, unless this cache already has one
    /// (idempotent: the first record for a key within a batch wins).
    pub fn prepare_record(&mut self, key: Vec<u8>, prev_value: Option<Vec<u8>>) {
        if self.existing.contains_key(&key) || self.non_existing.contains(&key) {
            return;
        }
        match prev_value {
            Some(v) => {
                self.existing.insert(key.clone(), v);
            }
            None => {
                self.non_existing.insert(key.clone());
            }
        }
        self.keys_ordered.push(key);
    }

    pub fn is_empty(&self) -> bool {
        self.keys_ordered.is_empty()
    }

    /// `keys_ordered`, sorted byte-lexicographically, translated into
    /// records ready for the ancestral store. Maximizes sequential-write
    /// locality in the underlying LSM.
    ///
    /// Returns `Err` if a key in `keys_ordered` is in neither map, which
    /// would mean the disjointness invariant was violated upstream.
    pub fn sorted_records(&self) -> Result<Vec<AncestralRecord>, Vec<u8>> {
        let mut keys = self.keys_ordered.clone();
        keys.sort();
        keys.into_iter()
            .map(|key| {
                if let Some(prev) = self.existing.get(&key) {
                    Ok(AncestralRecord {
                        key,
                        prev_value: Some(prev.clone()),
                    })
                } else if self.non_existing.contains(&key) {
                    Ok(AncestralRecord {
                        key,
                        prev_value: None,
                    })
                } else {
                    Err(key)
                }
            })
            .collect()
    }
}
