//! The ancestral records live in a single rockbound column family, keyed by
//! raw bytes rather than borsh so that key ordering on disk matches byte
//! ordering in memory: `0x00 || epoch_height_be || live_key` for a record,
//! `0x01` for the health byte. Borsh would length-prefix a `Vec<u8>` key and
//! scramble that ordering, so the codecs here are the identity function.

use rockbound::schema::{KeyDecoder, KeyEncoder, ValueCodec};
use rockbound::{CodecError, Schema};

pub const ANCESTRAL_COLUMN_FAMILY: &str = "ancestral_records";

#[derive(Clone, Copy, Debug, Default)]
pub struct AncestralSchema;

impl Schema for AncestralSchema {
    const COLUMN_FAMILY_NAME: &'static str = ANCESTRAL_COLUMN_FAMILY;
    type Key = Vec<u8>;
    type Value = Vec<u8>;
}

impl KeyEncoder<AncestralSchema> for Vec<u8> {
    fn encode_key(&self) -> Result<Vec<u8>, CodecError> {
        Ok(self.clone())
    }
}

impl KeyDecoder<AncestralSchema> for Vec<u8> {
    fn decode_key(data: &[u8]) -> Result<Self, CodecError> {
        Ok(data.to_vec())
    }
}

impl ValueCodec<AncestralSchema> for Vec<u8> {
    fn encode_value(&self) -> Result<Vec<u8>, CodecError> {
        Ok(self.clone())
    }

    fn decode_value(data: &[u8]) -> Result<Self, CodecError> {
        Ok(data.to_vec())
    }
}

/// The one reserved key outside the `0x00`-prefixed record space: `0x00`
/// means healthy, `0x01` means a flush is (or was left) in progress.
pub const HEALTH_KEY: u8 = 0x01;
pub const RECORD_PREFIX: u8 = 0x00;

pub fn epoch_record_key(epoch_height: u64, live_key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 8 + live_key.len());
    out.push(RECORD_PREFIX);
    out.extend_from_slice(&epoch_height.to_be_bytes());
    out.extend_from_slice(live_key);
    out
}

pub fn epoch_prefix(epoch_height: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 8);
    out.push(RECORD_PREFIX);
    out.extend_from_slice(&epoch_height.to_be_bytes());
    out
}

/// Strips the `0x00 || epoch_height_be` header off a record key, returning
/// the live-db key it shadows.
pub fn strip_epoch_prefix(key: &[u8]) -> Option<&[u8]> {
    key.strip_prefix(&[RECORD_PREFIX]).and_then(|rest| rest.get(8..))
}
