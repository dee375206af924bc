//! Claim replay
//!
//! [`fold_claims`] is the whole resolution algorithm: a single pass over
//! claims in replay order, with no I/O. The async resolver only fetches the
//! claim bodies and hands them here.

use chrono::{DateTime, Utc};
use perma_blob::BlobRef;
use perma_claim::{Claim, ClaimType};
use serde::{Deserialize, Serialize};

use crate::policy::AuthorizationPolicy;
use crate::view::PermanodeView;

/// How repeated `add-attribute` values are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddSemantics {
    /// Keep every added value, duplicates included
    #[default]
    Multiset,
    /// Skip a value already present in the attribute
    Set,
}

/// Resolution parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ResolveOptions {
    /// Treatment of repeated adds
    pub add_semantics: AddSemantics,
    /// Replay only claims with `timestamp <= as_of`
    pub as_of: Option<DateTime<Utc>>,
}

impl ResolveOptions {
    /// Set add semantics
    #[must_use]
    pub fn with_add_semantics(mut self, semantics: AddSemantics) -> Self {
        self.add_semantics = semantics;
        self
    }

    /// Resolve as of `at`
    #[must_use]
    pub fn with_as_of(mut self, at: DateTime<Utc>) -> Self {
        self.as_of = Some(at);
        self
    }

    /// `true` for a current-time resolution (no `as_of`)
    #[inline]
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.as_of.is_none()
    }
}

/// Replay `claims` against an empty view of `permanode`
///
/// `claims` must already be in replay order. Claims aimed at another
/// target, past `as_of`, or by unauthorized signers are skipped.
pub fn fold_claims<'a, I>(
    permanode: &BlobRef,
    claims: I,
    policy: &dyn AuthorizationPolicy,
    options: &ResolveOptions,
) -> PermanodeView
where
    I: IntoIterator<Item = &'a Claim>,
{
    let mut view = PermanodeView::new();
    let dedup = options.add_semantics == AddSemantics::Set;

    for claim in claims {
        if claim.target() != permanode {
            tracing::trace!(target_ref = %claim.target(), "claim for another permanode ignored");
            continue;
        }
        if options.as_of.is_some_and(|at| claim.timestamp() > at) {
            continue;
        }
        if !policy.is_authorized(claim.signer(), permanode) {
            tracing::debug!(
                permanode = %permanode,
                signer = %claim.signer().short(),
                attribute = claim.attribute(),
                "skipping unauthorized claim"
            );
            continue;
        }

        match claim.claim_type() {
            ClaimType::SetAttribute => view.set(claim.attribute(), claim.value()),
            ClaimType::AddAttribute => view.add(claim.attribute(), claim.value(), dedup),
            ClaimType::DelAttribute => view.del(claim.attribute(), claim.value()),
        }
        view.touch(claim.timestamp());
    }

    view
}

/// Sort `(ref, claim)` pairs into replay order: timestamp, then reference
pub fn sort_for_replay(claims: &mut [(BlobRef, Claim)]) {
    claims.sort_by(|(ref_a, a), (ref_b, b)| {
        a.timestamp()
            .cmp(&b.timestamp())
            .then_with(|| ref_a.cmp(ref_b))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{AllowAll, MockAuthorizationPolicy};
    use perma_test_utils::{add_at, at, del_at, intruder, owner, permanode_of, set_at};
    use pretty_assertions::assert_eq;

    fn target() -> BlobRef {
        permanode_of(&owner(), 1).blob_ref().unwrap()
    }

    fn fold(claims: &[Claim]) -> PermanodeView {
        fold_claims(&target(), claims, &AllowAll, &ResolveOptions::default())
    }

    #[test]
    fn later_set_wins() {
        let view = fold(&[
            set_at(&owner(), target(), "title", "X", 1),
            set_at(&owner(), target(), "title", "Y", 2),
        ]);
        assert_eq!(view.get("title"), ["Y"]);
        assert_eq!(view.modified(), Some(at(2)));
    }

    #[test]
    fn add_add_del_leaves_remaining_value() {
        let view = fold(&[
            add_at(&owner(), target(), "tag", "a", 1),
            add_at(&owner(), target(), "tag", "b", 2),
            del_at(&owner(), target(), "tag", "a", 3),
        ]);
        assert_eq!(view.get("tag"), ["b"]);
    }

    #[test]
    fn del_removes_only_first_occurrence() {
        let view = fold(&[
            add_at(&owner(), target(), "tag", "a", 1),
            add_at(&owner(), target(), "tag", "b", 2),
            add_at(&owner(), target(), "tag", "a", 3),
            del_at(&owner(), target(), "tag", "a", 4),
        ]);
        assert_eq!(view.get("tag"), ["b", "a"]);
    }

    #[test]
    fn empty_del_clears_attribute() {
        let view = fold(&[
            add_at(&owner(), target(), "tag", "a", 1),
            add_at(&owner(), target(), "tag", "b", 2),
            del_at(&owner(), target(), "tag", "", 3),
        ]);
        assert!(view.is_empty());
        assert_eq!(view.modified(), Some(at(3)));
    }

    #[test]
    fn empty_set_and_add_values_are_kept() {
        let view = fold(&[
            set_at(&owner(), target(), "title", "", 1),
            add_at(&owner(), target(), "tag", "", 2),
            add_at(&owner(), target(), "tag", "x", 3),
        ]);
        assert_eq!(view.get("title"), [""]);
        assert_eq!(view.single("title"), Some(""));
        assert_eq!(view.get("tag"), ["", "x"]);
    }

    #[test]
    fn set_semantics_skip_duplicate_adds() {
        let claims = [
            add_at(&owner(), target(), "tag", "a", 1),
            add_at(&owner(), target(), "tag", "a", 2),
        ];
        let multiset = fold(&claims);
        let set = fold_claims(
            &target(),
            &claims,
            &AllowAll,
            &ResolveOptions::default().with_add_semantics(AddSemantics::Set),
        );
        assert_eq!(multiset.get("tag"), ["a", "a"]);
        assert_eq!(set.get("tag"), ["a"]);
    }

    #[test]
    fn set_replaces_accumulated_adds() {
        let view = fold(&[
            add_at(&owner(), target(), "tag", "a", 1),
            add_at(&owner(), target(), "tag", "b", 2),
            set_at(&owner(), target(), "tag", "only", 3),
        ]);
        assert_eq!(view.get("tag"), ["only"]);
    }

    #[test]
    fn foreign_target_is_ignored() {
        let other = permanode_of(&owner(), 2).blob_ref().unwrap();
        let view = fold(&[set_at(&owner(), other, "title", "elsewhere", 1)]);
        assert!(view.is_empty());
        assert_eq!(view.modified(), None);
    }

    #[test]
    fn as_of_ignores_later_claims() {
        let claims = [
            set_at(&owner(), target(), "title", "old", 1),
            set_at(&owner(), target(), "title", "new", 5),
        ];
        let view = fold_claims(
            &target(),
            &claims,
            &AllowAll,
            &ResolveOptions::default().with_as_of(at(3)),
        );
        assert_eq!(view.get("title"), ["old"]);
    }

    #[test]
    fn unauthorized_signer_is_skipped() {
        let intruder_id = intruder().id();
        let mut policy = MockAuthorizationPolicy::new();
        policy
            .expect_is_authorized()
            .returning(move |signer, _| *signer != intruder_id);

        let claims = [
            set_at(&owner(), target(), "title", "mine", 1),
            set_at(&intruder(), target(), "title", "hijacked", 2),
        ];
        let view = fold_claims(&target(), &claims, &policy, &ResolveOptions::default());
        assert_eq!(view.get("title"), ["mine"]);
        assert_eq!(view.modified(), Some(at(1)));
    }

    #[test]
    fn policy_is_asked_with_resolved_permanode() {
        let expected = target();
        let mut policy = MockAuthorizationPolicy::new();
        policy
            .expect_is_authorized()
            .withf(move |_, permanode| expected.eq(permanode))
            .times(2)
            .return_const(true);

        let claims = [
            add_at(&owner(), target(), "tag", "a", 1),
            add_at(&intruder(), target(), "tag", "b", 2),
        ];
        let view = fold_claims(&target(), &claims, &policy, &ResolveOptions::default());
        assert_eq!(view.get("tag"), ["a", "b"]);
    }

    #[test]
    fn sort_for_replay_orders_by_time_then_ref() {
        let early = set_at(&owner(), target(), "title", "early", 1);
        let tie_a = add_at(&owner(), target(), "tag", "x", 2);
        let tie_b = add_at(&owner(), target(), "tag", "y", 2);
        let mut pairs: Vec<(BlobRef, Claim)> = [&tie_b, &early, &tie_a]
            .into_iter()
            .map(|c| (c.blob_ref().unwrap(), c.clone()))
            .collect();
        sort_for_replay(&mut pairs);

        assert_eq!(pairs[0].1, early);
        assert!(pairs[1].0 < pairs[2].0);
    }
}
