/// Runtime configuration for a [`crate::engine::SnapshotEngine`], analogous
/// to a worker's exec config: small, explicit, constructed once at startup.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Heights `0, epoch_period, 2*epoch_period, ...` are snapshot
    /// boundaries.
    pub epoch_period: u64,

    /// Default page size for `get_chunk`/`iterate_prefix` calls. Exposed
    /// here (rather than a build-time constant) so tests can shrink it.
    pub batch_size: usize,

    /// Number of blocking workers in the checksum's hash-to-curve pool.
    pub checksum_workers: usize,

    /// Domain-separation tag mixed into every hash-to-curve call. Changing
    /// this invalidates every peer's checksum and must never happen
    /// silently post-deployment.
    pub checksum_dst: Vec<u8>,

    /// Capacity of the dispatcher's operation channel.
    pub op_channel_capacity: usize,
}

impl SnapshotConfig {
    pub fn new(epoch_period: u64) -> Self {
        Self {
            epoch_period,
            batch_size: 1024,
            checksum_workers: num_cpus(),
            checksum_dst: b"hypersync/elliptic-sum/v1".to_vec(),
            op_channel_capacity: 10_000,
        }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
