//! Error types for describe queries

use perma_blob::BlobStoreError;
use thiserror::Error;

/// Batch-wide describe failure
///
/// Per-item problems (missing blob, unresolvable claims) are reported in
/// the response instead.
#[derive(Debug, Error)]
pub enum DescribeError {
    /// A batched store read failed
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] BlobStoreError),
}

impl DescribeError {
    /// Whether retrying the whole batch may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StorageUnavailable(e) => e.is_retryable(),
        }
    }
}
