//! Permanode service
//!
//! Wires store, index, resolver, describe and cache together behind one
//! handle. Writes go through [`PermanodeService::submit_claim`]; reads
//! through [`PermanodeService::describe`] and [`PermanodeService::resolve`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use perma_blob::{BlobRef, SharedBlobStore};
use perma_claim::{decode_schema_blob, Claim, ClaimDraft, ClaimType, SchemaBlob, Signer};
use perma_describe::{DescribeResponse, DescribeService};
use perma_index::{ClaimLog, ClaimLogIndex, RebuildReport};
use perma_resolve::{
    AuthorizationPolicy, OwnerPolicy, PermanodeResolver, PermanodeView, ResolveOptions,
};

use crate::config::ServiceConfig;
use crate::error::PermanodeError;

/// Result of submitting a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Reference of the stored claim
    pub claim_ref: BlobRef,
    /// Whether the signer is currently authorized on the target.
    ///
    /// Advisory only: unauthorized claims are stored and indexed, but
    /// resolution skips them.
    pub authorized: bool,
    /// `false` when the identical claim was already indexed
    pub newly_indexed: bool,
}

/// Handle to a permanode system over one blob store
#[derive(Debug)]
pub struct PermanodeService {
    store: SharedBlobStore,
    index: Arc<ClaimLogIndex>,
    policy: Arc<dyn AuthorizationPolicy>,
    describer: DescribeService,
    config: ServiceConfig,
    /// Last timestamp handed to a claim issued by this service
    clock: Mutex<Option<DateTime<Utc>>>,
}

impl PermanodeService {
    /// Create a service with an empty index
    ///
    /// Call [`rebuild_index`](Self::rebuild_index) to pick up claims already
    /// in `store`.
    #[must_use]
    pub fn new(
        store: SharedBlobStore,
        policy: Arc<dyn AuthorizationPolicy>,
        config: ServiceConfig,
    ) -> Self {
        let index = Arc::new(ClaimLogIndex::new(Arc::clone(&store)));
        let resolver = PermanodeResolver::new(Arc::clone(&index), Arc::clone(&policy))
            .with_fetch_concurrency(config.describe.fetch_concurrency);
        let mut describer = DescribeService::new(resolver).with_options(config.resolve_options());
        if let Some(cache) = config.build_cache() {
            describer = describer.with_cache(cache);
        }

        Self {
            store,
            index,
            policy,
            describer,
            config,
            clock: Mutex::new(None),
        }
    }

    /// Service with an [`OwnerPolicy`] and default configuration
    #[must_use]
    pub fn with_owner_policy(store: SharedBlobStore) -> (Self, Arc<OwnerPolicy>) {
        let policy = Arc::new(OwnerPolicy::new());
        let service = Self::new(store, policy.clone(), ServiceConfig::default());
        (service, policy)
    }

    #[inline]
    #[must_use]
    pub fn store(&self) -> &SharedBlobStore {
        &self.store
    }

    #[inline]
    #[must_use]
    pub fn index(&self) -> &Arc<ClaimLogIndex> {
        &self.index
    }

    #[inline]
    #[must_use]
    pub fn policy(&self) -> &Arc<dyn AuthorizationPolicy> {
        &self.policy
    }

    #[inline]
    #[must_use]
    pub fn describer(&self) -> &DescribeService {
        &self.describer
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Create and store a permanode owned by `signer`
    ///
    /// # Errors
    /// [`PermanodeError::Claim`] if signing fails,
    /// [`PermanodeError::Storage`] if the blob cannot be stored
    pub async fn new_permanode(&self, signer: &Signer) -> Result<BlobRef, PermanodeError> {
        let permanode = signer.new_permanode()?;
        let permanode_ref = self.store.put(&permanode.encode()?).await?;
        self.policy.learn_owner(&permanode_ref, permanode.owner());
        tracing::info!(permanode = %permanode_ref, owner = %permanode.owner().short(), "permanode created");
        Ok(permanode_ref)
    }

    /// Sign and submit a claim stamped with the current time
    ///
    /// Timestamps issued by one service are strictly increasing, so
    /// back-to-back submissions replay in submission order.
    ///
    /// # Errors
    /// [`PermanodeError::Claim`] for an empty attribute,
    /// [`PermanodeError::Index`] if storing fails (nothing is indexed)
    pub async fn submit_claim(
        &self,
        signer: &Signer,
        target: BlobRef,
        claim_type: ClaimType,
        attribute: &str,
        value: &str,
    ) -> Result<SubmitOutcome, PermanodeError> {
        let draft = ClaimDraft::new(target, claim_type, attribute, value, self.next_timestamp());
        let claim = signer.sign_claim(draft)?;
        self.submit(&claim).await
    }

    /// Submit an already signed claim
    ///
    /// # Errors
    /// [`PermanodeError::Index`] if the claim does not verify or cannot be
    /// stored
    #[tracing::instrument(
        skip(self, claim),
        fields(permanode = %claim.target(), attribute = claim.attribute(), kind = %claim.claim_type())
    )]
    pub async fn submit(&self, claim: &Claim) -> Result<SubmitOutcome, PermanodeError> {
        let appended = self.index.append(claim).await?;
        self.describer.invalidate(claim.target()).await;

        let authorized = self.policy.is_authorized(claim.signer(), claim.target());
        if authorized {
            tracing::info!(claim = %appended.claim_ref, "claim submitted");
        } else {
            tracing::info!(
                claim = %appended.claim_ref,
                signer = %claim.signer().short(),
                "claim stored but signer is not authorized"
            );
        }

        Ok(SubmitOutcome {
            claim_ref: appended.claim_ref,
            authorized,
            newly_indexed: appended.newly_indexed,
        })
    }

    /// Replace `attribute` with `value`
    ///
    /// # Errors
    /// As [`submit_claim`](Self::submit_claim)
    pub async fn set_attribute(
        &self,
        signer: &Signer,
        target: BlobRef,
        attribute: &str,
        value: &str,
    ) -> Result<SubmitOutcome, PermanodeError> {
        self.submit_claim(signer, target, ClaimType::SetAttribute, attribute, value)
            .await
    }

    /// Append `value` to `attribute`
    ///
    /// # Errors
    /// As [`submit_claim`](Self::submit_claim)
    pub async fn add_attribute(
        &self,
        signer: &Signer,
        target: BlobRef,
        attribute: &str,
        value: &str,
    ) -> Result<SubmitOutcome, PermanodeError> {
        self.submit_claim(signer, target, ClaimType::AddAttribute, attribute, value)
            .await
    }

    /// Remove `value` from `attribute`, or the whole attribute when `value`
    /// is empty
    ///
    /// # Errors
    /// As [`submit_claim`](Self::submit_claim)
    pub async fn del_attribute(
        &self,
        signer: &Signer,
        target: BlobRef,
        attribute: &str,
        value: &str,
    ) -> Result<SubmitOutcome, PermanodeError> {
        self.submit_claim(signer, target, ClaimType::DelAttribute, attribute, value)
            .await
    }

    /// Describe `refs` in one batch
    ///
    /// # Errors
    /// [`PermanodeError::Describe`] if the store is unavailable
    pub async fn describe(&self, refs: &[BlobRef]) -> Result<DescribeResponse, PermanodeError> {
        Ok(self.describer.describe(refs).await?)
    }

    /// Resolve one permanode
    ///
    /// Bypasses the view cache.
    ///
    /// # Errors
    /// [`PermanodeError::Storage`] or [`PermanodeError::Resolve`]
    pub async fn resolve(
        &self,
        permanode: &BlobRef,
        options: &ResolveOptions,
    ) -> Result<PermanodeView, PermanodeError> {
        if let Some(bytes) = self.store.get(permanode).await? {
            if let Ok(SchemaBlob::Permanode(head)) = decode_schema_blob(&bytes) {
                self.policy.learn_owner(permanode, head.owner());
            }
        }
        Ok(self.describer.resolver().resolve(permanode, options).await?)
    }

    /// Claims targeting `permanode` in replay order, authorized or not
    #[must_use]
    pub fn claims_for(&self, permanode: &BlobRef) -> ClaimLog {
        self.index.claims_for(permanode)
    }

    /// Re-derive the index from every blob in the store
    ///
    /// Owners of discovered permanodes are reported to the policy and the
    /// view cache is cleared.
    ///
    /// # Errors
    /// [`PermanodeError::Index`] if the store cannot be read
    pub async fn rebuild_index(&self) -> Result<RebuildReport, PermanodeError> {
        let report = self.index.rebuild().await?;
        for (permanode, owner) in &report.permanodes {
            self.policy.learn_owner(permanode, owner);
        }
        if let Some(cache) = self.describer.cache() {
            cache.invalidate_all();
        }
        Ok(report)
    }

    fn next_timestamp(&self) -> DateTime<Utc> {
        let mut last = self.clock.lock();
        let now = Utc::now();
        let stamp = match *last {
            Some(prev) if now <= prev => prev + Duration::nanoseconds(1),
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }
}
