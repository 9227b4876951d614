//! Errors during parsing/encoding of wire primitives.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PrimitivesError {
    #[error("truncated varuint")]
    TruncatedVaruint,

    #[error("varuint overflows u64")]
    VaruintOverflow,

    #[error("entry truncated: expected {expected} more bytes, found {found}")]
    TruncatedEntry { expected: usize, found: usize },
}
