//! EllipticSum: an incrementally updatable, order-independent checksum over
//! the state database, using homomorphic addition of elliptic curve points.
//!
//! This crate covers the algebra and concurrency of the accumulator only.
//! Where it's wired into the state database is the Snapshot Engine
//! (`hypersync-snapshot`).

pub mod checksum;
pub mod errors;
pub mod group;

pub use checksum::Checksum;
pub use errors::ChecksumError;
pub use group::GElem;
