//! EllipticSum: an order-independent, incrementally updatable checksum over
//! a multiset of byte strings, built from homomorphic addition of elliptic
//! curve points.
//!
//! A Merkle tree costs O(log n) per update and O(n) space to prove
//! membership we never need. Here the state database folds down to one
//! group element: `acc = Σ H(s, DST) for s in S`. Updates are O(1) in
//! space, and collisions are as hard as the discrete log problem in the
//! group.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::trace;

use crate::errors::ChecksumError;
use crate::group::GElem;

/// Hash-to-curve is 2-3 orders of magnitude more expensive than a point
/// addition, so it's fanned out to a bounded pool of `workers` blocking
/// tasks; the addition onto `acc` is serialized behind a single mutex.
/// `snapshot`/`wait` drain the pool by acquiring every permit at once,
/// which is only possible once every in-flight hash-to-curve has finished
/// and released its permit.
pub struct Checksum {
    acc: Arc<Mutex<GElem>>,
    permits: Arc<Semaphore>,
    workers: u32,
    dst: Vec<u8>,
}

impl Checksum {
    pub fn new(workers: usize, dst: impl Into<Vec<u8>>) -> Self {
        let workers = workers.max(1) as u32;
        Self {
            acc: Arc::new(Mutex::new(GElem::identity())),
            permits: Arc::new(Semaphore::new(workers as usize)),
            workers,
            dst: dst.into(),
        }
    }

    /// Schedules `acc <- acc + H(bytes, DST)`. Returns once the work has
    /// been admitted to the pool, not once it has run.
    pub async fn add(&self, bytes: impl Into<Vec<u8>>) -> Result<(), ChecksumError> {
        self.schedule(bytes.into(), false).await
    }

    /// Schedules `acc <- acc + (-H(bytes, DST))`.
    pub async fn remove(&self, bytes: impl Into<Vec<u8>>) -> Result<(), ChecksumError> {
        self.schedule(bytes.into(), true).await
    }

    async fn schedule(&self, bytes: Vec<u8>, negate: bool) -> Result<(), ChecksumError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ChecksumError::Scheduling)?;

        let acc = self.acc.clone();
        let dst = self.dst.clone();
        tokio::task::spawn_blocking(move || {
            let mut point = GElem::hash_to_curve(&bytes, &dst);
            if negate {
                point = point.neg();
            }
            let mut guard = acc.lock();
            *guard = guard.add(point);
            drop(permit);
        });

        Ok(())
    }

    /// Blocks until every scheduled add/remove has been applied to `acc`.
    pub async fn wait(&self) -> Result<(), ChecksumError> {
        let _all = self
            .permits
            .clone()
            .acquire_many_owned(self.workers)
            .await
            .map_err(|_| ChecksumError::Scheduling)?;
        trace!("checksum pool drained");
        Ok(())
    }

    /// Drains the pool and returns a defensive copy of the accumulator.
    pub async fn snapshot(&self) -> Result<GElem, ChecksumError> {
        self.wait().await?;
        Ok(*self.acc.lock())
    }

    /// `snapshot()` followed by canonical compressed encoding.
    pub async fn to_bytes(&self) -> Result<[u8; crate::group::ENCODED_LEN], ChecksumError> {
        Ok(self.snapshot().await?.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_store_checksum_is_identity() {
        let c = Checksum::new(4, b"test-dst".to_vec());
        assert_eq!(c.to_bytes().await.unwrap(), GElem::identity().to_bytes());
    }

    #[tokio::test]
    async fn commutative_across_enqueue_order() {
        let c1 = Checksum::new(4, b"test-dst".to_vec());
        c1.add(b"hello".to_vec()).await.unwrap();
        c1.add(b"world".to_vec()).await.unwrap();
        let d1 = c1.to_bytes().await.unwrap();

        let c2 = Checksum::new(4, b"test-dst".to_vec());
        c2.add(b"world".to_vec()).await.unwrap();
        c2.add(b"hello".to_vec()).await.unwrap();
        let d2 = c2.to_bytes().await.unwrap();

        assert_eq!(d1, d2);
    }

    #[tokio::test]
    async fn add_remove_cancels() {
        let c = Checksum::new(4, b"test-dst".to_vec());
        c.add(b"x".to_vec()).await.unwrap();
        c.add(b"y".to_vec()).await.unwrap();
        c.remove(b"x".to_vec()).await.unwrap();
        let got = c.to_bytes().await.unwrap();

        let only_y = Checksum::new(4, b"test-dst".to_vec());
        only_y.add(b"y".to_vec()).await.unwrap();
        let want = only_y.to_bytes().await.unwrap();

        assert_eq!(got, want);
    }

    #[tokio::test]
    async fn many_concurrent_updates_still_drain() {
        let c = Arc::new(Checksum::new(4, b"test-dst".to_vec()));
        let mut handles = Vec::new();
        for i in 0..64u32 {
            let c = c.clone();
            handles.push(tokio::spawn(async move {
                c.add(format!("key-{i}").into_bytes()).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        c.wait().await.unwrap();

        let sequential = Checksum::new(1, b"test-dst".to_vec());
        for i in 0..64u32 {
            sequential
                .add(format!("key-{i}").into_bytes())
                .await
                .unwrap();
        }

        assert_eq!(c.to_bytes().await.unwrap(), sequential.to_bytes().await.unwrap());
    }
}
