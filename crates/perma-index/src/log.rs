//! Replay order keys and claim sequences

use chrono::{DateTime, Utc};
use perma_blob::BlobRef;

/// Position of a claim in its permanode's replay order
///
/// Ordered by claimant timestamp, then by claim reference. The reference
/// tie-break resolves equal timestamps deterministically; it is a policy
/// choice and says nothing about which claim was really made first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClaimKey {
    /// Claimant-asserted time
    pub timestamp: DateTime<Utc>,
    /// Claim blob reference
    pub claim: BlobRef,
}

impl ClaimKey {
    /// Create a key
    #[inline]
    #[must_use]
    pub const fn new(timestamp: DateTime<Utc>, claim: BlobRef) -> Self {
        Self { timestamp, claim }
    }

    /// Smallest key at `timestamp`
    #[inline]
    #[must_use]
    pub(crate) const fn floor(timestamp: DateTime<Utc>) -> Self {
        Self::new(timestamp, BlobRef::new([0; 32]))
    }

    /// Largest key at `timestamp`
    #[inline]
    #[must_use]
    pub(crate) const fn ceiling(timestamp: DateTime<Utc>) -> Self {
        Self::new(timestamp, BlobRef::new([0xff; 32]))
    }
}

/// Ordered claim sequence for one permanode
///
/// A snapshot taken at query time; appends made afterwards are not seen.
#[derive(Debug, Clone, Default)]
pub struct ClaimLog {
    keys: std::vec::IntoIter<ClaimKey>,
}

impl ClaimLog {
    pub(crate) fn from_keys(keys: Vec<ClaimKey>) -> Self {
        Self {
            keys: keys.into_iter(),
        }
    }

    /// Claim references in replay order
    #[must_use]
    pub fn refs(self) -> Vec<BlobRef> {
        self.map(|key| key.claim).collect()
    }

    /// Returns `true` if no claims remain
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.len() == 0
    }
}

impl Iterator for ClaimLog {
    type Item = ClaimKey;

    fn next(&mut self) -> Option<Self::Item> {
        self.keys.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.keys.size_hint()
    }
}

impl ExactSizeIterator for ClaimLog {}
