//! In-memory blob store.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::blob_ref::BlobRef;
use crate::store::{BlobStore, BlobStoreError};

/// Read counters for an in-memory store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of blobs stored
    pub blob_count: usize,
    /// Total bytes stored
    pub byte_count: usize,
    /// Single-blob `get` calls served
    pub point_reads: u64,
    /// `get_many` calls served
    pub batch_reads: u64,
}

/// In-memory content-addressed blob store.
///
/// Clones share the same underlying storage. Uses `parking_lot::RwLock`
/// so a panicking reader never poisons the store.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    blobs: RwLock<HashMap<BlobRef, Bytes>>,
    point_reads: AtomicU64,
    batch_reads: AtomicU64,
}

impl MemoryBlobStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently stored
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.blobs.read().len()
    }

    /// Returns `true` if no blobs are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.blobs.read().is_empty()
    }

    /// Snapshot of size and read counters
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let blobs = self.inner.blobs.read();
        StoreStats {
            blob_count: blobs.len(),
            byte_count: blobs.values().map(Bytes::len).sum(),
            point_reads: self.inner.point_reads.load(Ordering::Relaxed),
            batch_reads: self.inner.batch_reads.load(Ordering::Relaxed),
        }
    }

    /// Store bytes under an arbitrary reference, bypassing hashing.
    ///
    /// Only useful to simulate corruption in tests of callers.
    #[doc(hidden)]
    pub fn insert_raw(&self, blob: BlobRef, bytes: impl Into<Bytes>) {
        self.inner.blobs.write().insert(blob, bytes.into());
    }

    /// Drop a blob, simulating loss in the backing store.
    #[doc(hidden)]
    pub fn remove(&self, blob: &BlobRef) -> bool {
        self.inner.blobs.write().remove(blob).is_some()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bytes: &[u8]) -> Result<BlobRef, BlobStoreError> {
        let blob = BlobRef::compute(bytes);
        let mut blobs = self.inner.blobs.write();
        if !blobs.contains_key(&blob) {
            blobs.insert(blob, Bytes::copy_from_slice(bytes));
        }
        Ok(blob)
    }

    async fn get(&self, blob: &BlobRef) -> Result<Option<Bytes>, BlobStoreError> {
        self.inner.point_reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.inner.blobs.read().get(blob).cloned())
    }

    async fn contains(&self, blob: &BlobRef) -> Result<bool, BlobStoreError> {
        Ok(self.inner.blobs.read().contains_key(blob))
    }

    async fn get_many(
        &self,
        blobs: &[BlobRef],
        _concurrency: usize,
    ) -> Result<BTreeMap<BlobRef, Bytes>, BlobStoreError> {
        self.inner.batch_reads.fetch_add(1, Ordering::Relaxed);
        let stored = self.inner.blobs.read();
        Ok(blobs
            .iter()
            .filter_map(|blob| stored.get(blob).map(|bytes| (*blob, bytes.clone())))
            .collect())
    }

    async fn enumerate(&self) -> Result<Vec<BlobRef>, BlobStoreError> {
        let mut refs: Vec<BlobRef> = self.inner.blobs.read().keys().copied().collect();
        refs.sort_unstable();
        Ok(refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get() {
        let store = MemoryBlobStore::new();
        let blob = store.put(b"hello").await.unwrap();
        assert_eq!(blob, BlobRef::compute(b"hello"));
        assert_eq!(store.get(&blob).await.unwrap().unwrap().as_ref(), b"hello");
    }

    #[tokio::test]
    async fn put_is_idempotent() {
        let store = MemoryBlobStore::new();
        let a = store.put(b"same").await.unwrap();
        let b = store.put(b"same").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn missing_blob_is_none() {
        let store = MemoryBlobStore::new();
        let missing = BlobRef::compute(b"never stored");
        assert!(store.get(&missing).await.unwrap().is_none());
        assert!(!store.contains(&missing).await.unwrap());
    }

    #[tokio::test]
    async fn get_many_omits_missing_and_counts_one_batch() {
        let store = MemoryBlobStore::new();
        let a = store.put(b"a").await.unwrap();
        let b = store.put(b"b").await.unwrap();
        let missing = BlobRef::compute(b"c");

        let fetched = store.get_many(&[a, missing, b], 4).await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert!(fetched.contains_key(&a));
        assert!(fetched.contains_key(&b));

        let stats = store.stats();
        assert_eq!(stats.batch_reads, 1);
        assert_eq!(stats.point_reads, 0);
    }

    #[tokio::test]
    async fn enumerate_is_sorted() {
        let store = MemoryBlobStore::new();
        for i in 0..10u8 {
            store.put(&[i]).await.unwrap();
        }
        let refs = store.enumerate().await.unwrap();
        assert_eq!(refs.len(), 10);
        assert!(refs.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn clones_share_storage() {
        let store = MemoryBlobStore::new();
        let clone = store.clone();
        let blob = clone.put(b"shared").await.unwrap();
        assert!(store.contains(&blob).await.unwrap());
    }
}
