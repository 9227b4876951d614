//! Storage layer: the [`kv::KvStore`] contract the live database must
//! satisfy, and the ancestral records sidecar store (`ancestral`) that logs
//! pre-images of mutated keys for the current epoch.

pub mod ancestral;
pub mod errors;
pub mod kv;
pub mod schema;

pub use ancestral::{AncestralRecord, AncestralStore};
pub use errors::{DbError, DbResult};
pub use kv::{KvStore, KvWrite};

#[cfg(feature = "test-support")]
pub use kv::mem::MemKvStore;
