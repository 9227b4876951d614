//! LEB128-style unsigned varint, used to length-prefix the byte strings in
//! the [`crate::DbEntry`] wire format.

use crate::errors::PrimitivesError;

/// Appends the varuint encoding of `val` to `out`.
pub fn encode(val: u64, out: &mut Vec<u8>) {
    let mut val = val;
    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if val == 0 {
            break;
        }
    }
}

/// Decodes a varuint from the front of `buf`, returning the value and the
/// number of bytes consumed.
pub fn decode(buf: &[u8]) -> Result<(u64, usize), PrimitivesError> {
    let mut val: u64 = 0;
    let mut shift = 0u32;
    for (i, &byte) in buf.iter().enumerate() {
        if shift >= 64 {
            return Err(PrimitivesError::VaruintOverflow);
        }
        val |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok((val, i + 1));
        }
        shift += 7;
    }
    Err(PrimitivesError::TruncatedVaruint)
}
