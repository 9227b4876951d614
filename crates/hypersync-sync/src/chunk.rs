//! Serving and ingesting chunks of the database as it existed at the last
//! snapshot height: the live DB is always ahead of `epoch_height`, and the
//! gap is filled in by merging against the ancestral log.

use hypersync_db::KvStore;
use hypersync_primitives::DbEntry;
use hypersync_snapshot::SnapshotEngine;

use crate::errors::SyncResult;

#[derive(Debug, Clone)]
pub struct ChunkPage {
    pub entries: Vec<DbEntry>,
    pub full: bool,
    pub concurrency_fault: bool,
}

impl ChunkPage {
    fn fault() -> Self {
        Self {
            entries: Vec::new(),
            full: false,
            concurrency_fault: true,
        }
    }
}

/// Returns the contiguous slice of `prefix` starting at `start_key`, as the
/// database existed at the engine's current `epoch_height`. Callers must
/// retry with the same `start_key` whenever `concurrency_fault` comes back
/// true.
pub fn get_chunk(engine: &SnapshotEngine, prefix: &[u8], start_key: &[u8]) -> SyncResult<ChunkPage> {
    let g0 = engine.gen_counters();
    if !g0.is_quiescent() {
        return Ok(ChunkPage::fault());
    }

    let batch_size = engine.config().batch_size;
    let epoch_height = engine.epoch_height();

    let (live_entries, main_full) = engine.live_store().iterate_prefix(prefix, start_key, batch_size)?;
    let (ancestral_entries, ancestral_full) =
        engine
            .ancestral_store()
            .iterate_epoch(epoch_height, prefix, start_key, batch_size)?;

    let mut out = Vec::new();
    let mut live_idx = 0;

    'outer: for record in &ancestral_entries {
        while live_idx < live_entries.len() && live_entries[live_idx].key < record.key {
            out.push(live_entries[live_idx].clone());
            live_idx += 1;
        }
        if live_idx == live_entries.len() && main_full {
            break 'outer;
        }
        if live_idx < live_entries.len() && live_entries[live_idx].key == record.key {
            live_idx += 1;
        }
        if let Some(value) = &record.prev_value {
            out.push(DbEntry::new(record.key.clone(), value.clone()));
        }
    }

    if !ancestral_full {
        while live_idx < live_entries.len() {
            out.push(live_entries[live_idx].clone());
            live_idx += 1;
        }
    }

    let g1 = engine.gen_counters();
    if (g0.main_gen, g0.ancestral_gen) != (g1.main_gen, g1.ancestral_gen) {
        return Ok(ChunkPage::fault());
    }

    if out.is_empty() {
        return Ok(ChunkPage {
            entries: vec![DbEntry::empty()],
            full: false,
            concurrency_fault: false,
        });
    }

    Ok(ChunkPage {
        entries: out,
        full: main_full || ancestral_full,
        concurrency_fault: false,
    })
}

/// Ingests a received chunk into the live database. The write lands before
/// the checksum is updated, so a failed batch can never advance the
/// checksum for entries that were never durably written; see
/// [`hypersync_snapshot::engine`]'s handling of `ProcessChunk`.
pub async fn set_chunk(engine: &SnapshotEngine, entries: Vec<DbEntry>) -> SyncResult<()> {
    engine.process_chunk(entries).await?;
    Ok(())
}
