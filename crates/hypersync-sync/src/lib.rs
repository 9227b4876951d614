//! Chunk server and ingester: serves paginated slices of the database as it
//! existed at the last snapshot height, and applies received chunks to the
//! live database.

pub mod chunk;
pub mod errors;

pub use chunk::{get_chunk, set_chunk, ChunkPage};
pub use errors::{SyncError, SyncResult};
