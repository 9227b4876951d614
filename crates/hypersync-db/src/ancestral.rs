//! The ancestral database: a sidecar rockbound-backed store holding the
//! pre-images of keys touched since the last completed flush, so that the
//! state at the last snapshot height can be reconstructed from the live
//! database plus this log without ever pausing writers.
//!
//! Only the snapshot dispatcher ever writes here, so a single `DB` handle
//! (no transactions) is enough: every write we issue is a single atomic
//! `SchemaBatch`, and there is never a concurrent writer to race against.

use std::path::Path;
use std::sync::Arc;

use rockbound::{rocksdb::Options, Schema, SchemaBatch, DB};
use tracing::debug;

use crate::errors::{DbError, DbResult};
use crate::schema::{epoch_prefix, epoch_record_key, strip_epoch_prefix, AncestralSchema, HEALTH_KEY};

const DB_NAME: &str = "hypersync_ancestral";

/// A single record: the value a live key held before it was overwritten or
/// deleted this epoch, or `None` if the key didn't exist before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestralRecord {
    pub key: Vec<u8>,
    pub prev_value: Option<Vec<u8>>,
}

/// Encodes `prev_value ‖ existence_byte`: the stored value itself (empty if
/// the key didn't exist before), followed by a trailing byte marking
/// whether it existed at all.
fn encode_record_value(prev_value: &Option<Vec<u8>>) -> Vec<u8> {
    match prev_value {
        Some(v) => {
            let mut out = Vec::with_capacity(v.len() + 1);
            out.extend_from_slice(v);
            out.push(1);
            out
        }
        None => vec![0],
    }
}

fn decode_record_value(data: &[u8]) -> DbResult<Option<Vec<u8>>> {
    match data.split_last() {
        Some((0, prev)) if prev.is_empty() => Ok(None),
        Some((1, prev)) => Ok(Some(prev.to_vec())),
        _ => Err(DbError::CorruptRecord(format!("malformed ancestral record value: {data:?}"))),
    }
}

pub struct AncestralStore {
    db: Arc<DB>,
}

impl AncestralStore {
    pub fn open(path: &Path) -> DbResult<Self> {
        let mut opts = Options::default();
        opts.create_missing_column_families(true);
        opts.create_if_missing(true);
        let db = DB::open(
            path,
            DB_NAME,
            vec![AncestralSchema::COLUMN_FAMILY_NAME],
            &opts,
        )?;
        let store = Self { db: Arc::new(db) };
        if store.db.get::<AncestralSchema>(&vec![HEALTH_KEY])?.is_none() {
            store.set_healthy(true)?;
        }
        Ok(store)
    }

    pub fn is_healthy(&self) -> DbResult<bool> {
        match self.db.get::<AncestralSchema>(&vec![HEALTH_KEY])? {
            Some(v) => Ok(v.first() == Some(&1)),
            None => Ok(true),
        }
    }

    pub fn set_healthy(&self, healthy: bool) -> DbResult<()> {
        self.db
            .put::<AncestralSchema>(&vec![HEALTH_KEY], &vec![healthy as u8])?;
        Ok(())
    }

    /// A flush that was interrupted mid-write (process crash, I/O failure)
    /// leaves the health byte at `0x00` forever, since nothing past `open`
    /// ever sets it back without a fresh, successful `flush_records`. Every
    /// other entry point checks this first rather than risk reading or
    /// extending a half-written epoch.
    fn require_healthy(&self) -> DbResult<()> {
        if self.is_healthy()? {
            Ok(())
        } else {
            Err(DbError::Unhealthy)
        }
    }

    /// Does this epoch already have a record for `key`? Used to decide
    /// whether a mutation's pre-image needs capturing (only the first
    /// mutation of a key within an epoch does).
    pub fn has_record(&self, epoch_height: u64, key: &[u8]) -> DbResult<bool> {
        self.require_healthy()?;
        let rk = epoch_record_key(epoch_height, key);
        Ok(self.db.get::<AncestralSchema>(&rk)?.is_some())
    }

    pub fn get_record(&self, epoch_height: u64, key: &[u8]) -> DbResult<Option<Option<Vec<u8>>>> {
        self.require_healthy()?;
        let rk = epoch_record_key(epoch_height, key);
        match self.db.get::<AncestralSchema>(&rk)? {
            Some(v) => Ok(Some(decode_record_value(&v)?)),
            None => Ok(None),
        }
    }

    /// Writes every record in `records` for `epoch_height` in a single
    /// atomic batch, toggling the health byte off for the duration. Records
    /// for keys that already have a record this epoch are skipped, since
    /// only the first pre-image in an epoch is meaningful.
    pub fn flush_records(&self, epoch_height: u64, records: &[AncestralRecord]) -> DbResult<()> {
        self.require_healthy()?;
        let mut batch = SchemaBatch::new();
        batch.put::<AncestralSchema>(&vec![HEALTH_KEY], &vec![0u8])?;

        for record in records {
            let rk = epoch_record_key(epoch_height, &record.key);
            if self.db.get::<AncestralSchema>(&rk)?.is_some() {
                continue;
            }
            batch.put::<AncestralSchema>(&rk, &encode_record_value(&record.prev_value))?;
        }

        batch.put::<AncestralSchema>(&vec![HEALTH_KEY], &vec![1u8])?;
        self.db.write_schemas(batch)?;
        debug!(epoch_height, count = records.len(), "flushed ancestral records");
        Ok(())
    }

    /// Ordered `(live_key, prev_value)` pairs recorded for `epoch_height`
    /// under `prefix`, starting at `start_key`, capped at `limit`.
    pub fn iterate_epoch(
        &self,
        epoch_height: u64,
        prefix: &[u8],
        start_key: &[u8],
        limit: usize,
    ) -> DbResult<(Vec<AncestralRecord>, bool)> {
        self.require_healthy()?;
        let lower = epoch_record_key(epoch_height, start_key.max(prefix));
        let upper_prefix = epoch_prefix(epoch_height);

        let mut iter = self.db.iter::<AncestralSchema>()?;
        iter.seek(&lower)?;

        let mut out = Vec::new();
        let mut truncated = false;
        for item in iter {
            let (k, v) = item?.into_tuple();
            if !k.starts_with(&upper_prefix) {
                break;
            }
            let live_key = match strip_epoch_prefix(&k) {
                Some(lk) => lk,
                None => continue,
            };
            if !live_key.starts_with(prefix) {
                if live_key >= prefix {
                    break;
                }
                continue;
            }
            if out.len() == limit {
                truncated = true;
                break;
            }
            out.push(AncestralRecord {
                key: live_key.to_vec(),
                prev_value: decode_record_value(&v)?,
            });
        }
        Ok((out, truncated))
    }

    /// Deletes every record belonging to `epoch_height`, once nothing can
    /// query it any longer.
    pub fn drop_epoch(&self, epoch_height: u64) -> DbResult<()> {
        let prefix = epoch_prefix(epoch_height);
        let mut iter = self.db.iter::<AncestralSchema>()?;
        iter.seek(&prefix)?;

        let mut batch = SchemaBatch::new();
        let mut dropped = 0usize;
        for item in iter {
            let (k, _v) = item?.into_tuple();
            if !k.starts_with(&prefix) {
                break;
            }
            batch.delete::<AncestralSchema>(&k)?;
            dropped += 1;
        }
        self.db.write_schemas(batch)?;
        debug!(epoch_height, dropped, "dropped retired epoch records");
        Ok(())
    }
}

#[cfg(all(test, feature = "test-support"))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, AncestralStore) {
        let dir = TempDir::new().unwrap();
        let store = AncestralStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn opens_healthy_by_default() {
        let (_dir, store) = setup();
        assert!(store.is_healthy().unwrap());
    }

    #[test]
    fn flush_then_has_record() {
        let (_dir, store) = setup();
        store
            .flush_records(
                7,
                &[AncestralRecord {
                    key: b"alice".to_vec(),
                    prev_value: Some(b"100".to_vec()),
                }],
            )
            .unwrap();
        assert!(store.has_record(7, b"alice").unwrap());
        assert!(!store.has_record(7, b"bob").unwrap());
        assert_eq!(
            store.get_record(7, b"alice").unwrap(),
            Some(Some(b"100".to_vec()))
        );
        assert!(store.is_healthy().unwrap());
    }

    #[test]
    fn flush_skips_keys_already_recorded_this_epoch() {
        let (_dir, store) = setup();
        store
            .flush_records(
                1,
                &[AncestralRecord {
                    key: b"k".to_vec(),
                    prev_value: Some(b"first".to_vec()),
                }],
            )
            .unwrap();
        store
            .flush_records(
                1,
                &[AncestralRecord {
                    key: b"k".to_vec(),
                    prev_value: Some(b"second".to_vec()),
                }],
            )
            .unwrap();
        assert_eq!(
            store.get_record(1, b"k").unwrap(),
            Some(Some(b"first".to_vec()))
        );
    }

    #[test]
    fn iterate_epoch_respects_prefix_and_limit() {
        let (_dir, store) = setup();
        store
            .flush_records(
                3,
                &[
                    AncestralRecord { key: b"p/a".to_vec(), prev_value: Some(b"1".to_vec()) },
                    AncestralRecord { key: b"p/b".to_vec(), prev_value: None },
                    AncestralRecord { key: b"q/a".to_vec(), prev_value: Some(b"2".to_vec()) },
                ],
            )
            .unwrap();

        let (records, full) = store.iterate_epoch(3, b"p/", b"p/", 1).unwrap();
        assert_eq!(records.len(), 1);
        assert!(full);
        assert_eq!(records[0].key, b"p/a");

        let (records, full) = store.iterate_epoch(3, b"p/", b"p/a\0", 10).unwrap();
        assert_eq!(records.len(), 1);
        assert!(!full);
        assert_eq!(records[0].key, b"p/b");
        assert_eq!(records[0].prev_value, None);
    }

    #[test]
    fn drop_epoch_removes_only_that_epoch() {
        let (_dir, store) = setup();
        store
            .flush_records(1, &[AncestralRecord { key: b"k".to_vec(), prev_value: None }])
            .unwrap();
        store
            .flush_records(2, &[AncestralRecord { key: b"k".to_vec(), prev_value: None }])
            .unwrap();
        store.drop_epoch(1).unwrap();
        assert!(!store.has_record(1, b"k").unwrap());
        assert!(store.has_record(2, b"k").unwrap());
    }

    #[test]
    fn unhealthy_store_refuses_reads_and_writes() {
        let (_dir, store) = setup();
        store.set_healthy(false).unwrap();

        assert!(matches!(store.has_record(1, b"k"), Err(DbError::Unhealthy)));
        assert!(matches!(store.get_record(1, b"k"), Err(DbError::Unhealthy)));
        assert!(matches!(store.iterate_epoch(1, b"", b"", 10), Err(DbError::Unhealthy)));
        assert!(matches!(
            store.flush_records(1, &[AncestralRecord { key: b"k".to_vec(), prev_value: None }]),
            Err(DbError::Unhealthy)
        ));
    }

    #[test]
    fn corrupt_record_value_is_reported_as_corrupt_record() {
        let (_dir, store) = setup();
        let rk = epoch_record_key(5, b"k");
        store.db.put::<AncestralSchema>(&rk, &vec![0xff, 0xff]).unwrap();

        assert!(matches!(store.get_record(5, b"k"), Err(DbError::CorruptRecord(_))));
    }
}
