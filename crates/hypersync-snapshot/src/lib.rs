//! The snapshot engine: a dispatcher task owning the checksum, the
//! ancestral-cache pipeline, and epoch bookkeeping, so every state mutation
//! the node makes is serialized into one total order without ever pausing
//! readers.

pub mod cache;
pub mod config;
pub mod engine;
pub mod errors;
pub mod op;

pub use cache::AncestralCache;
pub use config::SnapshotConfig;
pub use engine::{GenCounters, SnapshotEngine, SnapshotJoinHandle};
pub use errors::{SnapshotError, SnapshotResult};
pub use op::Op;
