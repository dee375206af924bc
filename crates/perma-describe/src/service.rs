//! Batched describe service
//!
//! A describe call costs two store round trips regardless of how many
//! references it names: one for the requested blobs, one for every claim
//! body of every permanode among them that the cache could not answer.

use std::collections::{BTreeMap, BTreeSet};

use perma_blob::BlobRef;
use perma_claim::{decode_schema_blob, SchemaBlob};
use perma_index::ClaimKey;
use perma_resolve::{PermanodeResolver, ResolveOptions};

use crate::cache::{ViewCache, ViewVersion};
use crate::error::DescribeError;
use crate::response::{DescribeOutcome, DescribeResponse};

/// Read side of the permanode system
#[derive(Debug, Clone)]
pub struct DescribeService {
    resolver: PermanodeResolver,
    cache: Option<ViewCache>,
    options: ResolveOptions,
}

impl DescribeService {
    /// Create an uncached service using default resolve options
    #[must_use]
    pub fn new(resolver: PermanodeResolver) -> Self {
        Self {
            resolver,
            cache: None,
            options: ResolveOptions::default(),
        }
    }

    /// Serve current views through `cache`
    #[must_use]
    pub fn with_cache(mut self, cache: ViewCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Options applied to every resolution
    #[must_use]
    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolver used for every permanode
    #[must_use]
    pub fn resolver(&self) -> &PermanodeResolver {
        &self.resolver
    }

    /// View cache, if enabled
    #[must_use]
    pub fn cache(&self) -> Option<&ViewCache> {
        self.cache.as_ref()
    }

    /// Options used by [`describe`](Self::describe)
    #[must_use]
    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Drop the cached view of `permanode`
    pub async fn invalidate(&self, permanode: &BlobRef) {
        if let Some(cache) = &self.cache {
            cache.invalidate(permanode).await;
        }
    }

    /// Describe every distinct reference in `refs`
    ///
    /// # Errors
    /// [`DescribeError::StorageUnavailable`] if a batched store read fails.
    /// Individual items never fail the call.
    #[tracing::instrument(skip(self, refs), fields(requested = refs.len()))]
    pub async fn describe(&self, refs: &[BlobRef]) -> Result<DescribeResponse, DescribeError> {
        self.describe_with(refs, &self.options).await
    }

    /// [`describe`](Self::describe) with explicit resolve options
    ///
    /// Only current-time resolutions under the service's own options go
    /// through the cache; any other options always replay.
    ///
    /// # Errors
    /// [`DescribeError::StorageUnavailable`] if a batched store read fails
    pub async fn describe_with(
        &self,
        refs: &[BlobRef],
        options: &ResolveOptions,
    ) -> Result<DescribeResponse, DescribeError> {
        let distinct: Vec<BlobRef> = refs.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let store = self.resolver.index().store();
        let concurrency = self.resolver.fetch_concurrency();
        let cache = self
            .cache
            .as_ref()
            .filter(|_| options.is_current() && *options == self.options);

        let heads = store.get_many(&distinct, concurrency).await?;

        let mut response = DescribeResponse::default();
        let mut pending: Vec<(BlobRef, Vec<ClaimKey>, ViewVersion)> = Vec::new();

        for blob_ref in &distinct {
            let Some(bytes) = heads.get(blob_ref) else {
                response.insert(*blob_ref, DescribeOutcome::NotFound);
                continue;
            };
            match decode_schema_blob(bytes) {
                Ok(SchemaBlob::Permanode(permanode)) => {
                    if let Err(e) = permanode.verify() {
                        tracing::warn!(blob = %blob_ref, error = %e, "permanode signature invalid");
                        response.insert(*blob_ref, DescribeOutcome::ResolutionError(e.to_string()));
                        continue;
                    }
                    self.resolver.policy().learn_owner(blob_ref, permanode.owner());
                }
                _ => {
                    response.insert(*blob_ref, DescribeOutcome::NotPermanode);
                    continue;
                }
            }

            let generation = self.resolver.policy().generation();
            let keys = self.resolver.replay_keys(blob_ref, options);
            let version = ViewVersion::new(keys.len(), generation);
            if let Some(cache) = cache {
                if let Some(view) = cache.get(blob_ref, version).await {
                    response.insert(*blob_ref, DescribeOutcome::Permanode(view));
                    continue;
                }
            }
            pending.push((*blob_ref, keys, version));
        }

        let claim_refs: Vec<BlobRef> = pending
            .iter()
            .flat_map(|(_, keys, _)| keys.iter().map(|key| key.claim))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let bodies = if claim_refs.is_empty() {
            BTreeMap::new()
        } else {
            store.get_many(&claim_refs, concurrency).await?
        };

        for (permanode, keys, version) in pending {
            match self.resolver.resolve_from_bodies(&permanode, &keys, &bodies, options) {
                Ok(view) => {
                    if let Some(cache) = cache {
                        cache.insert(permanode, version, view.clone()).await;
                    }
                    response.insert(permanode, DescribeOutcome::Permanode(view));
                }
                Err(e) => {
                    tracing::warn!(permanode = %permanode, error = %e, "describe item failed");
                    response.insert(permanode, DescribeOutcome::ResolutionError(e.to_string()));
                }
            }
        }

        tracing::debug!(
            items = response.len(),
            failed = response.error_count(),
            claims_fetched = claim_refs.len(),
            "describe complete"
        );
        Ok(response)
    }
}
