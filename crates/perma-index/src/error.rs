//! Index errors

use perma_blob::BlobStoreError;
use perma_claim::ClaimError;

/// Errors from claim log index operations
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Claim failed decoding or signature verification; nothing was stored
    #[error("malformed claim: {0}")]
    MalformedClaim(#[from] ClaimError),

    /// Blob store could not be read or written; nothing was indexed
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] BlobStoreError),
}

impl IndexError {
    /// Check if the failed operation may be retried
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(e) if e.is_retryable())
    }
}
