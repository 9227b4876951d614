//! The `DBEntry` pair and its wire encoding:
//! `varuint(len(key)) || key || varuint(len(value)) || value`.

use crate::{errors::PrimitivesError, varuint};

/// Reserved key prefix byte. No valid state key begins with it, so it can be
/// repurposed as a sentinel and as the ancestral-DB key-space prefix.
pub const RESERVED_PREFIX: u8 = 0x00;

/// An ordered `(key, value)` pair as it appears in the live database or a
/// sync chunk.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DbEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl DbEntry {
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self { key, value }
    }

    /// The sentinel "no entries" marker returned by `get_chunk` when a page
    /// is empty. Distinguishable from any real entry because `0x00` is
    /// reserved and never appears as a state key prefix.
    pub fn empty() -> Self {
        Self {
            key: vec![RESERVED_PREFIX],
            value: Vec::new(),
        }
    }

    pub fn is_empty_sentinel(&self) -> bool {
        self.key == [RESERVED_PREFIX] && self.value.is_empty()
    }

    /// Encodes `varuint(len(key)) || key || varuint(len(value)) || value`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.key.len() + self.value.len() + 8);
        varuint::encode(self.key.len() as u64, &mut out);
        out.extend_from_slice(&self.key);
        varuint::encode(self.value.len() as u64, &mut out);
        out.extend_from_slice(&self.value);
        out
    }

    /// Decodes a single entry from the front of `buf`, returning the entry
    /// and the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), PrimitivesError> {
        let (klen, n1) = varuint::decode(buf)?;
        let klen = klen as usize;
        let mut off = n1;
        if buf.len() < off + klen {
            return Err(PrimitivesError::TruncatedEntry {
                expected: off + klen,
                found: buf.len(),
            });
        }
        let key = buf[off..off + klen].to_vec();
        off += klen;

        let (vlen, n2) = varuint::decode(&buf[off..])?;
        let vlen = vlen as usize;
        off += n2;
        if buf.len() < off + vlen {
            return Err(PrimitivesError::TruncatedEntry {
                expected: off + vlen,
                found: buf.len(),
            });
        }
        let value = buf[off..off + vlen].to_vec();
        off += vlen;

        Ok((Self { key, value }, off))
    }
}
