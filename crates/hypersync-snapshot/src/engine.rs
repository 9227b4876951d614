//! The snapshot dispatcher: a single cooperative loop, run on a dedicated
//! thread, that owns every mutation to the checksum, the ancestral caches,
//! the epoch state and the ancestral store. Producers enqueue operations and
//! never touch dispatcher-owned state directly, except for the small
//! producer/consumer handoff described on [`AncestralCache`].

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use hypersync_checksum::{Checksum, GElem};
use hypersync_db::{AncestralStore, KvStore, KvWrite};
use hypersync_primitives::DbEntry;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::cache::AncestralCache;
use crate::config::SnapshotConfig;
use crate::errors::{SnapshotError, SnapshotResult};
use crate::op::Op;

#[derive(Debug, Clone)]
struct EpochState {
    height: u64,
    checksum_bytes: [u8; 32],
    block_hash: Vec<u8>,
}

/// `main_gen`/`ancestral_gen`, always read and written together.
#[derive(Default, Clone, Copy, Debug)]
pub struct GenCounters {
    pub main_gen: i32,
    pub ancestral_gen: i32,
}

impl GenCounters {
    /// No flush can possibly be in flight: the counters agree and neither
    /// is mid-update.
    pub fn is_quiescent(&self) -> bool {
        self.main_gen == self.ancestral_gen && self.main_gen % 2 == 0
    }
}

struct Inner {
    caches: Mutex<VecDeque<AncestralCache>>,
    flush_counter: AtomicU64,
    gens: Mutex<GenCounters>,
    broken: AtomicBool,
    epoch: Mutex<EpochState>,
    checksum: Arc<Checksum>,
    ancestral: AncestralStore,
    live: Arc<dyn KvStore>,
    config: SnapshotConfig,
}

/// Handle to a running snapshot engine. Cheap to clone; every clone shares
/// the same dispatcher thread and operation channel.
#[derive(Clone)]
pub struct SnapshotEngine {
    inner: Arc<Inner>,
    tx: mpsc::Sender<Op>,
}

pub struct SnapshotJoinHandle {
    thread: Option<JoinHandle<()>>,
}

impl SnapshotJoinHandle {
    /// Blocks until the dispatcher loop has exited.
    pub fn join(mut self) {
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

impl SnapshotEngine {
    /// Opens the ancestral store at `path` and spawns the dispatcher thread.
    /// `rt` is used to drive the checksum's async API from the dispatcher's
    /// synchronous loop.
    pub fn spawn(
        path: &Path,
        live: Arc<dyn KvStore>,
        config: SnapshotConfig,
        rt: tokio::runtime::Handle,
    ) -> SnapshotResult<(Self, SnapshotJoinHandle)> {
        let ancestral = AncestralStore::open(path)?;
        let checksum = Arc::new(Checksum::new(
            config.checksum_workers,
            config.checksum_dst.clone(),
        ));

        let inner = Arc::new(Inner {
            caches: Mutex::new(VecDeque::new()),
            flush_counter: AtomicU64::new(0),
            gens: Mutex::new(GenCounters::default()),
            broken: AtomicBool::new(false),
            epoch: Mutex::new(EpochState {
                height: 0,
                checksum_bytes: GElem::identity().to_bytes(),
                block_hash: Vec::new(),
            }),
            checksum,
            ancestral,
            live,
            config,
        });

        let (tx, rx) = mpsc::channel(inner.config.op_channel_capacity);

        let dispatcher_inner = inner.clone();
        let thread = std::thread::Builder::new()
            .name("hypersync-snapshot-dispatcher".into())
            .spawn(move || dispatcher_loop(dispatcher_inner, rx, rt))
            .expect("failed to spawn snapshot dispatcher thread");

        Ok((
            SnapshotEngine { inner, tx },
            SnapshotJoinHandle { thread: Some(thread) },
        ))
    }

    fn check_not_broken(&self) -> SnapshotResult<()> {
        if self.inner.broken.load(Ordering::SeqCst) {
            return Err(SnapshotError::Broken);
        }
        Ok(())
    }

    /// Opens a new ancestral cache for an about-to-begin mutation batch.
    /// Must precede any `prepare_record` for that batch.
    pub fn prepare_flush(&self) -> SnapshotResult<u64> {
        self.check_not_broken()?;
        let id = self.inner.flush_counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.caches.lock().push_back(AncestralCache::new(id));
        self.bump_main_gen();
        Ok(id)
    }

    /// Records the pre-image of `key` in the most recently opened cache.
    pub fn prepare_record(
        &self,
        key: Vec<u8>,
        prev_value: Option<Vec<u8>>,
    ) -> SnapshotResult<()> {
        self.check_not_broken()?;
        let expected_id = self.inner.flush_counter.load(Ordering::SeqCst);
        let mut caches = self.inner.caches.lock();
        let tail = caches.back_mut().ok_or(SnapshotError::CacheMissing)?;
        if tail.id != expected_id {
            return Err(SnapshotError::CacheIdMismatch);
        }
        tail.prepare_record(key, prev_value);
        Ok(())
    }

    /// Seals the tail cache and schedules its persistence on the
    /// dispatcher.
    pub async fn enqueue_flush(&self) -> SnapshotResult<()> {
        self.check_not_broken()?;
        self.bump_main_gen();
        self.bump_ancestral_gen();
        self.tx
            .send(Op::Flush)
            .await
            .map_err(|_| SnapshotError::Scheduling)
    }

    pub async fn finish_process_block(&self, height: u64, block_hash: Vec<u8>) -> SnapshotResult<()> {
        self.tx
            .send(Op::ProcessBlock { height, block_hash })
            .await
            .map_err(|_| SnapshotError::Scheduling)
    }

    pub async fn process_chunk(&self, entries: Vec<DbEntry>) -> SnapshotResult<()> {
        self.tx
            .send(Op::ProcessChunk { entries })
            .await
            .map_err(|_| SnapshotError::Scheduling)
    }

    pub async fn add_checksum_bytes(&self, bytes: Vec<u8>) -> SnapshotResult<()> {
        self.tx
            .send(Op::ChecksumAdd(bytes))
            .await
            .map_err(|_| SnapshotError::Scheduling)
    }

    pub async fn remove_checksum_bytes(&self, bytes: Vec<u8>) -> SnapshotResult<()> {
        self.tx
            .send(Op::ChecksumRemove(bytes))
            .await
            .map_err(|_| SnapshotError::Scheduling)
    }

    pub async fn print_checksum(&self, tag: impl Into<String>) -> SnapshotResult<()> {
        self.tx
            .send(Op::ChecksumPrint(tag.into()))
            .await
            .map_err(|_| SnapshotError::Scheduling)
    }

    /// Waits until every operation enqueued before this call has been
    /// applied by the dispatcher.
    pub async fn barrier(&self) -> SnapshotResult<()> {
        let (ack_tx, ack_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(Op::Barrier(ack_tx))
            .await
            .map_err(|_| SnapshotError::Scheduling)?;
        ack_rx.await.map_err(|_| SnapshotError::Scheduling)
    }

    pub fn gen_counters(&self) -> GenCounters {
        *self.inner.gens.lock()
    }

    /// The checksum's current digest, independent of epoch boundaries. Safe
    /// to call from any thread; `Checksum` is its own synchronization
    /// domain.
    pub async fn current_checksum_bytes(&self) -> SnapshotResult<[u8; 32]> {
        Ok(self.inner.checksum.to_bytes().await?)
    }

    pub fn is_broken(&self) -> bool {
        self.inner.broken.load(Ordering::SeqCst)
    }

    pub fn epoch_height(&self) -> u64 {
        self.inner.epoch.lock().height
    }

    pub fn epoch_checksum_bytes(&self) -> [u8; 32] {
        self.inner.epoch.lock().checksum_bytes
    }

    pub fn live_store(&self) -> &Arc<dyn KvStore> {
        &self.inner.live
    }

    pub fn ancestral_store(&self) -> &AncestralStore {
        &self.inner.ancestral
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.inner.config
    }

    /// Consumes this handle so its sender is dropped, and blocks until the
    /// dispatcher has exited. The channel only closes once every clone of
    /// the engine handle has been dropped, so callers that fan the handle
    /// out to producers should drop those first.
    pub async fn stop(self, handle: SnapshotJoinHandle) {
        drop(self);
        tokio::task::spawn_blocking(move || handle.join())
            .await
            .ok();
    }

    fn bump_main_gen(&self) {
        self.inner.gens.lock().main_gen += 1;
    }

    fn bump_ancestral_gen(&self) {
        self.inner.gens.lock().ancestral_gen += 1;
    }
}

fn dispatcher_loop(inner: Arc<Inner>, mut rx: mpsc::Receiver<Op>, rt: tokio::runtime::Handle) {
    while let Some(op) = rx.blocking_recv() {
        if let Err(e) = apply_op(&inner, &rt, op) {
            error!(err = %e, "snapshot dispatcher failed to apply operation");
        }
    }
    info!("snapshot dispatcher exiting");
}

fn apply_op(inner: &Inner, rt: &tokio::runtime::Handle, op: Op) -> SnapshotResult<()> {
    match op {
        Op::Flush => apply_flush(inner, rt),
        Op::ProcessBlock { height, block_hash } => apply_process_block(inner, rt, height, block_hash),
        Op::ProcessChunk { entries } => apply_process_chunk(inner, rt, entries),
        Op::ChecksumAdd(bytes) => {
            rt.block_on(inner.checksum.add(bytes))?;
            Ok(())
        }
        Op::ChecksumRemove(bytes) => {
            rt.block_on(inner.checksum.remove(bytes))?;
            Ok(())
        }
        Op::ChecksumPrint(tag) => {
            let digest = rt.block_on(inner.checksum.to_bytes())?;
            info!(tag, digest = %hex::encode(digest), "checksum digest");
            Ok(())
        }
        Op::Barrier(ack) => {
            let _ = ack.send(());
            Ok(())
        }
    }
}

fn apply_flush(inner: &Inner, rt: &tokio::runtime::Handle) -> SnapshotResult<()> {
    if inner.broken.load(Ordering::SeqCst) {
        return Ok(());
    }

    rt.block_on(inner.checksum.wait())?;

    let head = { inner.caches.lock().front().cloned() };
    let Some(head) = head else {
        return Ok(());
    };
    if head.is_empty() {
        inner.caches.lock().pop_front();
        inner.gens.lock().ancestral_gen += 1;
        return Ok(());
    }

    let records = match head.sorted_records() {
        Ok(r) => r,
        Err(key) => {
            inner.broken.store(true, Ordering::SeqCst);
            error!(key = %hex::encode(&key), "ancestral cache key in neither map, latching broken");
            return Err(SnapshotError::InternalInconsistency);
        }
    };

    let epoch_height = inner.epoch.lock().height;
    match inner.ancestral.flush_records(epoch_height, &records) {
        Ok(()) => {
            inner.gens.lock().ancestral_gen += 1;
            inner.caches.lock().pop_front();
            Ok(())
        }
        Err(e) => {
            inner.broken.store(true, Ordering::SeqCst);
            error!(err = %e, "ancestral flush failed, latching broken");
            Err(SnapshotError::StoreIo(e))
        }
    }
}

fn apply_process_block(
    inner: &Inner,
    rt: &tokio::runtime::Handle,
    height: u64,
    block_hash: Vec<u8>,
) -> SnapshotResult<()> {
    if height % inner.config.epoch_period != 0 {
        return Ok(());
    }

    let checksum_bytes = rt.block_on(inner.checksum.to_bytes())?;
    let retiring_height = {
        let mut epoch = inner.epoch.lock();
        let retiring = epoch.height;
        epoch.height = height;
        epoch.checksum_bytes = checksum_bytes;
        epoch.block_hash = block_hash;
        retiring
    };

    if retiring_height != height {
        if let Err(e) = inner.ancestral.drop_epoch(retiring_height) {
            warn!(err = %e, retiring_height, "failed to drop retired epoch prefix");
            return Err(SnapshotError::StoreIo(e));
        }
    }
    Ok(())
}

fn apply_process_chunk(
    inner: &Inner,
    rt: &tokio::runtime::Handle,
    entries: Vec<DbEntry>,
) -> SnapshotResult<()> {
    let writes = entries
        .iter()
        .map(|e| KvWrite::Put(e.key.clone(), e.value.clone()))
        .collect();
    inner
        .live
        .write_batch(writes)
        .map_err(SnapshotError::StoreIo)?;

    rt.block_on(async {
        for entry in &entries {
            inner.checksum.add(entry.encode()).await?;
        }
        Ok::<_, hypersync_checksum::ChecksumError>(())
    })?;
    Ok(())
}
