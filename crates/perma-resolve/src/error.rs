//! Error types for permanode resolution

use perma_blob::{BlobRef, BlobStoreError};
use perma_claim::ClaimError;
use thiserror::Error;

/// Errors while resolving a permanode
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The blob store could not be read
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] BlobStoreError),

    /// The index names a claim whose body is not in the store
    #[error("indexed claim {claim} is missing from the blob store")]
    MissingClaim {
        /// Missing claim reference
        claim: BlobRef,
    },

    /// A stored claim failed to decode
    #[error("claim {claim} is malformed: {source}")]
    MalformedClaim {
        /// Offending claim reference
        claim: BlobRef,
        /// Decode failure
        #[source]
        source: ClaimError,
    },
}

impl ResolveError {
    /// Whether retrying the resolution may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StorageUnavailable(e) => e.is_retryable(),
            Self::MissingClaim { .. } | Self::MalformedClaim { .. } => false,
        }
    }
}
