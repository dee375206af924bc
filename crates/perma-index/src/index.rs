//! Claim log index
//!
//! Provides [`ClaimLogIndex`], mapping each permanode to the ordered set of
//! claims that target it.
//!
//! Each permanode's entry is a `BTreeSet<ClaimKey>`, so concurrent appenders
//! merge by set union and the replay order is total no matter in which order
//! the claims arrived.

use std::collections::BTreeSet;
use std::ops::{Bound, RangeBounds};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use perma_blob::{BlobRef, BlobStoreError, SharedBlobStore, DEFAULT_FETCH_CONCURRENCY};
use perma_claim::{decode_schema_blob, Claim, ClaimError, SchemaBlob, SignerId};

use crate::error::IndexError;
use crate::log::{ClaimKey, ClaimLog};

/// Blobs fetched per round trip while rebuilding.
const REBUILD_BATCH: usize = 256;

/// Result of an append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appended {
    /// Reference of the stored claim blob
    pub claim_ref: BlobRef,
    /// `false` when the identical claim was already indexed
    pub newly_indexed: bool,
}

/// Summary of an index rebuild from the blob store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildReport {
    /// Blobs examined
    pub scanned: usize,
    /// Claims newly added to the index
    pub claims_indexed: usize,
    /// Permanodes found, with their owners
    pub permanodes: Vec<(BlobRef, SignerId)>,
    /// Schema blobs that failed decoding or verification
    pub rejected: usize,
    /// Non-schema blobs (file content and the like)
    pub other_blobs: usize,
}

/// Per-permanode ordered claim index
///
/// The index holds derived state only: every entry points at a claim blob
/// that was stored before the entry was written, and the whole index can be
/// recomputed with [`rebuild`](ClaimLogIndex::rebuild).
#[derive(Debug)]
pub struct ClaimLogIndex {
    store: SharedBlobStore,
    by_target: DashMap<BlobRef, BTreeSet<ClaimKey>>,
}

impl ClaimLogIndex {
    /// Create an empty index over `store`
    #[must_use]
    pub fn new(store: SharedBlobStore) -> Self {
        Self {
            store,
            by_target: DashMap::new(),
        }
    }

    /// Backing blob store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &SharedBlobStore {
        &self.store
    }

    /// Verify, store and index a claim
    ///
    /// Idempotent: appending an identical claim again stores nothing new and
    /// leaves the index unchanged (`newly_indexed == false`).
    ///
    /// # Errors
    /// - [`IndexError::MalformedClaim`] if the signature does not verify;
    ///   nothing is stored
    /// - [`IndexError::StorageUnavailable`] if the blob store write fails;
    ///   nothing is indexed
    #[tracing::instrument(
        level = "debug",
        skip(self, claim),
        fields(permanode = %claim.target(), attribute = %claim.attribute())
    )]
    pub async fn append(&self, claim: &Claim) -> Result<Appended, IndexError> {
        claim.verify()?;
        let bytes = claim.encode()?;
        let claim_ref = self.store.put(&bytes).await?;
        if !claim_ref.matches(&bytes) {
            return Err(BlobStoreError::Corrupt { blob: claim_ref }.into());
        }

        let newly_indexed = self.record(*claim.target(), ClaimKey::new(claim.timestamp(), claim_ref));
        if newly_indexed {
            tracing::debug!(claim = %claim_ref, "claim indexed");
        } else {
            tracing::debug!(claim = %claim_ref, "duplicate claim, index unchanged");
        }
        Ok(Appended {
            claim_ref,
            newly_indexed,
        })
    }

    fn record(&self, target: BlobRef, key: ClaimKey) -> bool {
        self.by_target.entry(target).or_default().insert(key)
    }

    /// All claims targeting `permanode`, in replay order
    #[must_use]
    pub fn claims_for(&self, permanode: &BlobRef) -> ClaimLog {
        self.claims_in_range(permanode, ..)
    }

    /// Claims targeting `permanode` whose timestamp falls in `range`, in
    /// replay order
    #[must_use]
    pub fn claims_in_range<R>(&self, permanode: &BlobRef, range: R) -> ClaimLog
    where
        R: RangeBounds<DateTime<Utc>>,
    {
        let Some(set) = self.by_target.get(permanode) else {
            return ClaimLog::default();
        };

        let lower = match range.start_bound() {
            Bound::Included(t) => Bound::Included(ClaimKey::floor(*t)),
            Bound::Excluded(t) => Bound::Excluded(ClaimKey::ceiling(*t)),
            Bound::Unbounded => Bound::Unbounded,
        };
        let keys = set
            .range((lower, Bound::Unbounded))
            .take_while(|key| match range.end_bound() {
                Bound::Included(t) => key.timestamp <= *t,
                Bound::Excluded(t) => key.timestamp < *t,
                Bound::Unbounded => true,
            })
            .copied()
            .collect();
        ClaimLog::from_keys(keys)
    }

    /// Number of claims indexed for `permanode`
    ///
    /// Monotonically non-decreasing, so it doubles as a version number for
    /// anything derived from the permanode's claims.
    #[must_use]
    pub fn claim_count(&self, permanode: &BlobRef) -> usize {
        self.by_target.get(permanode).map_or(0, |set| set.len())
    }

    /// Every permanode that has at least one claim, sorted
    #[must_use]
    pub fn permanodes(&self) -> Vec<BlobRef> {
        let mut refs: Vec<BlobRef> = self.by_target.iter().map(|entry| *entry.key()).collect();
        refs.sort_unstable();
        refs
    }

    /// Re-derive index entries from every claim in the blob store
    ///
    /// Merges into the current contents; running it twice is harmless.
    ///
    /// # Errors
    /// Returns [`IndexError::StorageUnavailable`] if the store cannot be
    /// enumerated or read
    #[tracing::instrument(skip(self))]
    pub async fn rebuild(&self) -> Result<RebuildReport, IndexError> {
        let refs = self.store.enumerate().await?;
        let mut report = RebuildReport::default();

        for chunk in refs.chunks(REBUILD_BATCH) {
            let blobs = self.store.get_many(chunk, DEFAULT_FETCH_CONCURRENCY).await?;
            for (blob_ref, bytes) in &blobs {
                report.scanned += 1;
                match decode_schema_blob(bytes) {
                    Ok(SchemaBlob::Claim(claim)) => {
                        if let Err(e) = claim.verify() {
                            tracing::warn!(blob = %blob_ref, error = %e, "rejecting unverifiable claim");
                            report.rejected += 1;
                            continue;
                        }
                        if self.record(*claim.target(), ClaimKey::new(claim.timestamp(), *blob_ref)) {
                            report.claims_indexed += 1;
                        }
                    }
                    Ok(SchemaBlob::Permanode(permanode)) => {
                        report.permanodes.push((*blob_ref, *permanode.owner()));
                    }
                    Err(ClaimError::NotSchemaBlob) => report.other_blobs += 1,
                    Err(e) => {
                        tracing::warn!(blob = %blob_ref, error = %e, "skipping undecodable schema blob");
                        report.rejected += 1;
                    }
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            claims = report.claims_indexed,
            permanodes = report.permanodes.len(),
            rejected = report.rejected,
            "index rebuilt"
        );
        Ok(report)
    }
}
