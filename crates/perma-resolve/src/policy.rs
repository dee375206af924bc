//! Authorization policies
//!
//! The resolver asks a policy whether each claim's signer may mutate the
//! permanode. Unauthorized claims stay in the log; they are only skipped
//! during replay.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use perma_blob::BlobRef;
use perma_claim::SignerId;

/// Decides which signers may mutate which permanodes
#[cfg_attr(test, mockall::automock)]
pub trait AuthorizationPolicy: Send + Sync + std::fmt::Debug {
    /// Whether claims by `signer` on `permanode` take effect
    fn is_authorized(&self, signer: &SignerId, permanode: &BlobRef) -> bool;

    /// Called whenever a permanode blob is decoded, with its owner.
    ///
    /// Policies that key on ownership record it here; the default ignores it.
    fn learn_owner(&self, _permanode: &BlobRef, _owner: &SignerId) {}

    /// Counter that grows whenever an answer of `is_authorized` may change.
    ///
    /// Views derived under one generation are stale under any other.
    /// Policies whose answers never change keep the default of zero.
    fn generation(&self) -> u64 {
        0
    }
}

/// Every signer is authorized
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AuthorizationPolicy for AllowAll {
    fn is_authorized(&self, _signer: &SignerId, _permanode: &BlobRef) -> bool {
        true
    }
}

/// Owner plus explicitly granted delegates
///
/// The owner of a permanode is the signer of its permanode blob and never
/// changes. A permanode whose owner has not been learned yet authorizes
/// nobody. Every change to owners or delegates bumps the
/// [`generation`](AuthorizationPolicy::generation).
#[derive(Debug, Default)]
pub struct OwnerPolicy {
    owners: DashMap<BlobRef, SignerId>,
    delegates: DashMap<BlobRef, BTreeSet<SignerId>>,
    generation: AtomicU64,
}

impl OwnerPolicy {
    /// Create an empty policy
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the owner of `permanode`
    ///
    /// Returns `false` if an owner was already recorded; the first record
    /// is kept.
    pub fn register_owner(&self, permanode: BlobRef, owner: SignerId) -> bool {
        let mut inserted = false;
        self.owners.entry(permanode).or_insert_with(|| {
            inserted = true;
            owner
        });
        if inserted {
            self.bump();
        }
        inserted
    }

    /// Owner of `permanode`, if known
    #[must_use]
    pub fn owner_of(&self, permanode: &BlobRef) -> Option<SignerId> {
        self.owners.get(permanode).map(|owner| *owner)
    }

    /// Allow `delegate` to mutate `permanode`
    pub fn grant(&self, permanode: BlobRef, delegate: SignerId) -> bool {
        let granted = self.delegates.entry(permanode).or_default().insert(delegate);
        if granted {
            self.bump();
        }
        granted
    }

    /// Withdraw a delegation
    ///
    /// Claims the delegate already made stop taking effect on the next
    /// resolution.
    pub fn revoke(&self, permanode: &BlobRef, delegate: &SignerId) -> bool {
        let revoked = self
            .delegates
            .get_mut(permanode)
            .is_some_and(|mut set| set.remove(delegate));
        if revoked {
            self.bump();
        }
        revoked
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Delegates of `permanode`, sorted
    #[must_use]
    pub fn delegates_of(&self, permanode: &BlobRef) -> Vec<SignerId> {
        self.delegates
            .get(permanode)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl AuthorizationPolicy for OwnerPolicy {
    fn is_authorized(&self, signer: &SignerId, permanode: &BlobRef) -> bool {
        if self.owner_of(permanode).as_ref() == Some(signer) {
            return true;
        }
        self.delegates
            .get(permanode)
            .is_some_and(|set| set.contains(signer))
    }

    fn learn_owner(&self, permanode: &BlobRef, owner: &SignerId) {
        self.register_owner(*permanode, *owner);
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (BlobRef, SignerId, SignerId, SignerId) {
        (
            BlobRef::compute(b"permanode"),
            SignerId::new([1; 32]),
            SignerId::new([2; 32]),
            SignerId::new([3; 32]),
        )
    }

    #[test]
    fn allow_all_authorizes_anyone() {
        let (p, a, _, _) = ids();
        assert!(AllowAll.is_authorized(&a, &p));
    }

    #[test]
    fn owner_is_authorized_stranger_is_not() {
        let (p, owner, _, stranger) = ids();
        let policy = OwnerPolicy::new();
        assert!(!policy.is_authorized(&owner, &p));

        policy.learn_owner(&p, &owner);
        assert!(policy.is_authorized(&owner, &p));
        assert!(!policy.is_authorized(&stranger, &p));
    }

    #[test]
    fn first_owner_registration_wins() {
        let (p, owner, other, _) = ids();
        let policy = OwnerPolicy::new();
        assert!(policy.register_owner(p, owner));
        assert!(!policy.register_owner(p, other));
        assert_eq!(policy.owner_of(&p), Some(owner));
    }

    #[test]
    fn delegates_can_be_granted_and_revoked() {
        let (p, owner, delegate, _) = ids();
        let policy = OwnerPolicy::new();
        policy.register_owner(p, owner);

        assert!(policy.grant(p, delegate));
        assert!(!policy.grant(p, delegate));
        assert!(policy.is_authorized(&delegate, &p));
        assert_eq!(policy.delegates_of(&p), vec![delegate]);

        assert!(policy.revoke(&p, &delegate));
        assert!(!policy.is_authorized(&delegate, &p));
        assert!(!policy.revoke(&p, &delegate));
    }

    #[test]
    fn generation_moves_only_on_effective_changes() {
        let (p, owner, delegate, _) = ids();
        let policy = OwnerPolicy::new();
        assert_eq!(policy.generation(), 0);
        assert_eq!(AllowAll.generation(), 0);

        policy.register_owner(p, owner);
        let after_owner = policy.generation();
        assert!(after_owner > 0);
        policy.learn_owner(&p, &delegate);
        assert_eq!(policy.generation(), after_owner);

        policy.grant(p, delegate);
        let after_grant = policy.generation();
        assert!(after_grant > after_owner);
        policy.grant(p, delegate);
        assert_eq!(policy.generation(), after_grant);

        policy.revoke(&p, &delegate);
        let after_revoke = policy.generation();
        assert!(after_revoke > after_grant);
        policy.revoke(&p, &delegate);
        assert_eq!(policy.generation(), after_revoke);
    }
}
