use hypersync_primitives::DbEntry;
use tokio::sync::oneshot;

/// Everything that mutates checksum/cache/epoch/ancestral-DB state flows
/// through this enum onto the dispatcher, giving every producer a single
/// total order to reason about.
#[derive(Debug)]
pub enum Op {
    /// Drain and persist the head ancestral cache.
    Flush,

    /// A new block landed; advances the epoch if `height` is a boundary.
    ProcessBlock { height: u64, block_hash: Vec<u8> },

    /// A received sync chunk to ingest into the live database.
    ProcessChunk { entries: Vec<DbEntry> },

    ChecksumAdd(Vec<u8>),
    ChecksumRemove(Vec<u8>),

    /// Emits the current digest through the log sink, tagged for
    /// diagnostics.
    ChecksumPrint(String),

    /// Acks once every operation enqueued before it has been applied.
    /// Internal synchronization primitive, not part of the peer protocol.
    Barrier(oneshot::Sender<()>),
}
