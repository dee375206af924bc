//! Error types for the permanode service

use std::path::PathBuf;

use perma_blob::BlobStoreError;
use perma_claim::ClaimError;
use perma_describe::DescribeError;
use perma_index::IndexError;
use perma_resolve::ResolveError;

/// Main service error type
#[derive(Debug, thiserror::Error)]
pub enum PermanodeError {
    /// Claim or permanode could not be built or decoded
    #[error("claim error: {0}")]
    Claim(#[from] ClaimError),

    /// Append or rebuild failed
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Resolution failed
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Describe batch failed
    #[error("describe error: {0}")]
    Describe(#[from] DescribeError),

    /// Direct blob store access failed
    #[error("storage error: {0}")]
    Storage(#[from] BlobStoreError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl PermanodeError {
    /// Check if error is retryable
    ///
    /// Only storage unavailability is; everything else fails the same way
    /// on every attempt.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Index(e) => e.is_retryable(),
            Self::Resolve(e) => e.is_retryable(),
            Self::Describe(e) => e.is_retryable(),
            Self::Storage(e) => e.is_retryable(),
            Self::Claim(_) | Self::Config(_) => false,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document is not valid TOML or has unknown keys
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_storage_failures_retry() {
        let storage: PermanodeError = BlobStoreError::unavailable("down").into();
        assert!(storage.is_retryable());

        let via_index: PermanodeError = IndexError::from(BlobStoreError::unavailable("down")).into();
        assert!(via_index.is_retryable());

        let claim: PermanodeError = ClaimError::malformed("bad").into();
        assert!(!claim.is_retryable());

        let config: PermanodeError = ConfigError::invalid("nope").into();
        assert!(!config.is_retryable());
    }
}
