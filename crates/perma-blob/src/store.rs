//! Blob store collaborator
//!
//! The [`BlobStore`] trait is the only way the claim log touches storage.
//! Absence is not an error: `get` returns `Ok(None)` for unknown references.
//! Errors are reserved for the store being unreachable or unwritable.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::blob_ref::BlobRef;

/// Default number of concurrent fetches used by batched reads.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 16;

/// Content-addressed immutable blob storage.
///
/// Implementations must be idempotent on `put`: storing identical bytes twice
/// returns the same reference and leaves the store unchanged.
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    /// Store bytes, returning their content reference.
    async fn put(&self, bytes: &[u8]) -> Result<BlobRef, BlobStoreError>;

    /// Fetch a blob. `Ok(None)` when the reference is unknown.
    async fn get(&self, blob: &BlobRef) -> Result<Option<Bytes>, BlobStoreError>;

    /// Check existence without retrieving.
    async fn contains(&self, blob: &BlobRef) -> Result<bool, BlobStoreError> {
        Ok(self.get(blob).await?.is_some())
    }

    /// Fetch many blobs in one call. Missing references are omitted.
    ///
    /// The default implementation issues up to `concurrency` point reads at a
    /// time; stores with a native batch read should override it.
    async fn get_many(
        &self,
        blobs: &[BlobRef],
        concurrency: usize,
    ) -> Result<BTreeMap<BlobRef, Bytes>, BlobStoreError> {
        let fetched: Vec<(BlobRef, Option<Bytes>)> = stream::iter(blobs.iter().copied())
            .map(|blob| async move { self.get(&blob).await.map(|bytes| (blob, bytes)) })
            .buffer_unordered(concurrency.max(1))
            .try_collect()
            .await?;
        Ok(fetched
            .into_iter()
            .filter_map(|(blob, bytes)| bytes.map(|b| (blob, b)))
            .collect())
    }

    /// All stored references, sorted.
    async fn enumerate(&self) -> Result<Vec<BlobRef>, BlobStoreError>;
}

/// Shared handle to a blob store.
pub type SharedBlobStore = Arc<dyn BlobStore>;

/// Errors from blob store operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlobStoreError {
    /// The store could not be reached or written; safe to retry
    #[error("blob store unavailable: {message}")]
    Unavailable { message: String },

    /// Bytes handed back by the store do not hash to the requested reference
    #[error("integrity failure: {blob} does not match its content")]
    Corrupt { blob: BlobRef },
}

impl BlobStoreError {
    /// Create an unavailability error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Check if the failed operation may be retried
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
