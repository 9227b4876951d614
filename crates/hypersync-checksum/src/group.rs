//! The elliptic-curve group EllipticSum operates over: Ristretto255, a
//! prime-order group built on Curve25519. Ristretto255 gives us a
//! ~128-bit-secure group with identity, addition, negation, and a canonical
//! 32-byte compressed encoding out of the box.

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::traits::Identity;
use hypersync_primitives::varuint;
use sha2::Sha512;

/// Width of the canonical compressed encoding of a Ristretto255 point.
pub const ENCODED_LEN: usize = 32;

/// A point in the checksum's group. Addition is commutative and `identity`
/// is the additive identity, which is what makes the running accumulator
/// order-independent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GElem(pub(crate) RistrettoPoint);

impl GElem {
    pub fn identity() -> Self {
        Self(RistrettoPoint::identity())
    }

    /// Hashes `input` to a group element under domain separator `dst`. The
    /// dst length is prefixed so that `(dst, input)` pairs with different
    /// split points never collide into the same hash preimage.
    pub fn hash_to_curve(input: &[u8], dst: &[u8]) -> Self {
        let mut msg = Vec::with_capacity(dst.len() + input.len() + 9);
        varuint::encode(dst.len() as u64, &mut msg);
        msg.extend_from_slice(dst);
        msg.extend_from_slice(input);
        Self(RistrettoPoint::hash_from_bytes::<Sha512>(&msg))
    }

    pub fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }

    pub fn neg(self) -> Self {
        Self(-self.0)
    }

    /// Canonical compressed encoding: 32 bytes, stable across runs and
    /// across the network. This is part of the peer protocol and must
    /// never change silently.
    pub fn to_bytes(&self) -> [u8; ENCODED_LEN] {
        self.0.compress().to_bytes()
    }

    pub fn from_bytes(bytes: &[u8; ENCODED_LEN]) -> Option<Self> {
        CompressedRistretto(*bytes).decompress().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_additive_identity() {
        let p = GElem::hash_to_curve(b"hello", b"test-dst");
        assert_eq!(p.add(GElem::identity()), p);
    }

    #[test]
    fn add_is_commutative() {
        let a = GElem::hash_to_curve(b"a", b"dst");
        let b = GElem::hash_to_curve(b"b", b"dst");
        assert_eq!(a.add(b), b.add(a));
    }

    #[test]
    fn neg_cancels() {
        let a = GElem::hash_to_curve(b"a", b"dst");
        assert_eq!(a.add(a.neg()), GElem::identity());
    }

    #[test]
    fn deterministic() {
        let a = GElem::hash_to_curve(b"repeatable", b"dst");
        let b = GElem::hash_to_curve(b"repeatable", b"dst");
        assert_eq!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn distinct_inputs_differ() {
        let a = GElem::hash_to_curve(b"a", b"dst");
        let b = GElem::hash_to_curve(b"b", b"dst");
        assert_ne!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn dst_separates_protocols() {
        let a = GElem::hash_to_curve(b"same-input", b"dst-one");
        let b = GElem::hash_to_curve(b"same-input", b"dst-two");
        assert_ne!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn roundtrips_through_bytes() {
        let a = GElem::hash_to_curve(b"abc", b"dst");
        let bytes = a.to_bytes();
        let b = GElem::from_bytes(&bytes).unwrap();
        assert_eq!(a, b);
    }
}
