//! Store-backed permanode resolution

use std::collections::BTreeMap;
use std::sync::Arc;

use perma_blob::{BlobRef, Bytes, DEFAULT_FETCH_CONCURRENCY};
use perma_claim::{decode_claim, Claim};
use perma_index::{ClaimKey, ClaimLogIndex};

use crate::error::ResolveError;
use crate::fold::{fold_claims, ResolveOptions};
use crate::policy::AuthorizationPolicy;
use crate::view::PermanodeView;

/// Computes materialized views from the claim log index
#[derive(Debug, Clone)]
pub struct PermanodeResolver {
    index: Arc<ClaimLogIndex>,
    policy: Arc<dyn AuthorizationPolicy>,
    fetch_concurrency: usize,
}

impl PermanodeResolver {
    /// Create a resolver over `index`, filtering claims through `policy`
    #[must_use]
    pub fn new(index: Arc<ClaimLogIndex>, policy: Arc<dyn AuthorizationPolicy>) -> Self {
        Self {
            index,
            policy,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }

    /// Bound on concurrent claim fetches
    #[must_use]
    pub fn with_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch_concurrency = concurrency.max(1);
        self
    }

    /// Claim log index read by this resolver
    #[inline]
    #[must_use]
    pub fn index(&self) -> &Arc<ClaimLogIndex> {
        &self.index
    }

    /// Policy filtering replayed claims
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &Arc<dyn AuthorizationPolicy> {
        &self.policy
    }

    /// Current fetch concurrency
    #[inline]
    #[must_use]
    pub fn fetch_concurrency(&self) -> usize {
        self.fetch_concurrency
    }

    /// Index keys replayed for `permanode` under `options`
    #[must_use]
    pub fn replay_keys(&self, permanode: &BlobRef, options: &ResolveOptions) -> Vec<ClaimKey> {
        match options.as_of {
            Some(at) => self.index.claims_in_range(permanode, ..=at).collect(),
            None => self.index.claims_for(permanode).collect(),
        }
    }

    /// Resolve the current view of `permanode`
    ///
    /// # Errors
    /// - [`ResolveError::StorageUnavailable`] if claim bodies cannot be read
    /// - [`ResolveError::MissingClaim`] if an indexed claim is absent
    /// - [`ResolveError::MalformedClaim`] if a stored claim does not decode
    #[tracing::instrument(level = "debug", skip(self, permanode, options), fields(permanode = %permanode))]
    pub async fn resolve(
        &self,
        permanode: &BlobRef,
        options: &ResolveOptions,
    ) -> Result<PermanodeView, ResolveError> {
        let keys = self.replay_keys(permanode, options);
        if keys.is_empty() {
            return Ok(PermanodeView::new());
        }

        let refs: Vec<BlobRef> = keys.iter().map(|key| key.claim).collect();
        let bodies = self
            .index
            .store()
            .get_many(&refs, self.fetch_concurrency)
            .await?;
        self.resolve_from_bodies(permanode, &keys, &bodies, options)
    }

    /// Fold already-fetched claim bodies
    ///
    /// `bodies` may hold more blobs than `keys` names; only the keyed ones
    /// are replayed. Used by batch readers that fetch many permanodes'
    /// claims in one round trip.
    ///
    /// # Errors
    /// [`ResolveError::MissingClaim`] or [`ResolveError::MalformedClaim`]
    pub fn resolve_from_bodies(
        &self,
        permanode: &BlobRef,
        keys: &[ClaimKey],
        bodies: &BTreeMap<BlobRef, Bytes>,
        options: &ResolveOptions,
    ) -> Result<PermanodeView, ResolveError> {
        let claims = keys
            .iter()
            .map(|key| {
                let bytes = bodies
                    .get(&key.claim)
                    .ok_or(ResolveError::MissingClaim { claim: key.claim })?;
                decode_claim(bytes).map_err(|source| ResolveError::MalformedClaim {
                    claim: key.claim,
                    source,
                })
            })
            .collect::<Result<Vec<Claim>, _>>()?;

        Ok(fold_claims(permanode, &claims, self.policy.as_ref(), options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{AllowAll, OwnerPolicy};
    use perma_test_utils::{add_at, at, delegate, del_at, memory_store, owner, permanode_of, set_at, FailingBlobStore};
    use pretty_assertions::assert_eq;

    fn target() -> BlobRef {
        permanode_of(&owner(), 1).blob_ref().unwrap()
    }

    fn resolver_over(index: Arc<ClaimLogIndex>) -> PermanodeResolver {
        PermanodeResolver::new(index, Arc::new(AllowAll))
    }

    #[tokio::test]
    async fn empty_permanode_resolves_to_empty_view() {
        let (_, store) = memory_store();
        let resolver = resolver_over(Arc::new(ClaimLogIndex::new(store)));
        let view = resolver.resolve(&target(), &ResolveOptions::default()).await.unwrap();
        assert!(view.is_empty());
        assert_eq!(view.modified(), None);
    }

    #[tokio::test]
    async fn resolves_title_and_tags() {
        let (_, store) = memory_store();
        let index = Arc::new(ClaimLogIndex::new(store));
        for claim in [
            set_at(&owner(), target(), "title", "Draft", 1),
            add_at(&owner(), target(), "tag", "a", 2),
            add_at(&owner(), target(), "tag", "b", 3),
            del_at(&owner(), target(), "tag", "a", 4),
            set_at(&owner(), target(), "title", "Final", 5),
        ] {
            index.append(&claim).await.unwrap();
        }

        let view = resolver_over(index)
            .resolve(&target(), &ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(view.get("title"), ["Final"]);
        assert_eq!(view.get("tag"), ["b"]);
        assert_eq!(view.modified(), Some(at(5)));
    }

    #[tokio::test]
    async fn as_of_uses_index_range() {
        let (_, store) = memory_store();
        let index = Arc::new(ClaimLogIndex::new(store));
        index.append(&set_at(&owner(), target(), "title", "v1", 1)).await.unwrap();
        index.append(&set_at(&owner(), target(), "title", "v2", 10)).await.unwrap();

        let resolver = resolver_over(index);
        let options = ResolveOptions::default().with_as_of(at(5));
        assert_eq!(resolver.replay_keys(&target(), &options).len(), 1);
        let view = resolver.resolve(&target(), &options).await.unwrap();
        assert_eq!(view.get("title"), ["v1"]);
    }

    #[tokio::test]
    async fn unauthorized_claim_is_indexed_but_ignored() {
        let (_, store) = memory_store();
        let index = Arc::new(ClaimLogIndex::new(store));
        let policy = Arc::new(OwnerPolicy::new());
        policy.register_owner(target(), owner().id());

        index.append(&set_at(&owner(), target(), "title", "Mine", 1)).await.unwrap();
        index.append(&set_at(&delegate(), target(), "title", "Theirs", 2)).await.unwrap();

        let resolver = PermanodeResolver::new(Arc::clone(&index), policy.clone());
        let view = resolver.resolve(&target(), &ResolveOptions::default()).await.unwrap();
        assert_eq!(index.claim_count(&target()), 2);
        assert_eq!(view.get("title"), ["Mine"]);

        policy.grant(target(), delegate().id());
        let view = resolver.resolve(&target(), &ResolveOptions::default()).await.unwrap();
        assert_eq!(view.get("title"), ["Theirs"]);
    }

    #[tokio::test]
    async fn missing_body_is_reported() {
        let (memory, store) = memory_store();
        let index = Arc::new(ClaimLogIndex::new(store));
        let appended = index
            .append(&set_at(&owner(), target(), "title", "gone", 1))
            .await
            .unwrap();
        memory.remove(&appended.claim_ref);

        let err = resolver_over(index)
            .resolve(&target(), &ResolveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::MissingClaim { claim } if claim == appended.claim_ref));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn corrupted_body_is_malformed() {
        let (memory, store) = memory_store();
        let index = Arc::new(ClaimLogIndex::new(store));
        let appended = index
            .append(&set_at(&owner(), target(), "title", "x", 1))
            .await
            .unwrap();
        memory.insert_raw(appended.claim_ref, &b"{not a claim"[..]);

        let err = resolver_over(index)
            .resolve(&target(), &ResolveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::MalformedClaim { .. }));
    }

    #[tokio::test]
    async fn store_outage_is_retryable() {
        let store = FailingBlobStore::new();
        let index = Arc::new(ClaimLogIndex::new(Arc::new(store.clone())));
        index.append(&set_at(&owner(), target(), "title", "x", 1)).await.unwrap();
        store.set_fail_gets(true);

        let err = resolver_over(index)
            .resolve(&target(), &ResolveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::StorageUnavailable(_)));
        assert!(err.is_retryable());
    }
}
