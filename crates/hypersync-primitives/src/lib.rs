//! Wire-level primitives shared by the checksum, ancestral-records, and
//! chunk-sync crates: the `DBEntry` pair and its varuint-length-prefixed
//! encoding.
//!
//! The key/value codec used by higher layers is out of scope here: this
//! crate only knows about raw bytes.

pub mod entry;
pub mod errors;
pub mod varuint;

pub use entry::DbEntry;
pub use errors::PrimitivesError;
