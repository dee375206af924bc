use std::sync::Arc;

use perma_blob::{BlobRef, BlobStore, MemoryBlobStore};
use perma_claim::Signer;
use perma_describe::{DescribeError, DescribeOutcome, DescribeService, ViewCache};
use perma_index::ClaimLogIndex;
use perma_resolve::{
    AddSemantics, AllowAll, AuthorizationPolicy, OwnerPolicy, PermanodeResolver, ResolveOptions,
};
use perma_test_utils::{
    add_at, at, delegate, intruder, memory_store, owner, permanode_of, set_at, FailingBlobStore,
};
use pretty_assertions::assert_eq;

struct Fixture {
    memory: MemoryBlobStore,
    index: Arc<ClaimLogIndex>,
    service: DescribeService,
}

fn fixture_with(policy: Arc<dyn AuthorizationPolicy>) -> Fixture {
    let (memory, store) = memory_store();
    let index = Arc::new(ClaimLogIndex::new(store));
    let resolver = PermanodeResolver::new(Arc::clone(&index), policy);
    let service = DescribeService::new(resolver).with_cache(ViewCache::new(100));
    Fixture {
        memory,
        index,
        service,
    }
}

fn fixture() -> Fixture {
    fixture_with(Arc::new(AllowAll))
}

async fn stored_permanode(fx: &Fixture, signer: &Signer, n: u8) -> BlobRef {
    let permanode = permanode_of(signer, n);
    fx.memory.put(&permanode.encode().unwrap()).await.unwrap()
}

#[tokio::test]
async fn batch_reports_view_and_not_found() {
    let fx = fixture();
    let p = stored_permanode(&fx, &owner(), 1).await;
    fx.index.append(&set_at(&owner(), p, "title", "Hello", 1)).await.unwrap();
    let missing = BlobRef::compute(b"never stored");

    let response = fx.service.describe(&[p, missing]).await.unwrap();
    assert_eq!(response.len(), 2);
    assert_eq!(response.view(&p).unwrap().get("title"), ["Hello"]);
    assert_eq!(response.get(&missing).unwrap().outcome, DescribeOutcome::NotFound);
}

#[tokio::test]
async fn non_permanode_blobs_are_flagged() {
    let fx = fixture();
    let p = stored_permanode(&fx, &owner(), 1).await;
    let file = fx.memory.put(b"just some file").await.unwrap();
    let claim = fx
        .index
        .append(&set_at(&owner(), p, "title", "x", 1))
        .await
        .unwrap()
        .claim_ref;

    let response = fx.service.describe(&[file, claim]).await.unwrap();
    assert_eq!(response.get(&file).unwrap().outcome, DescribeOutcome::NotPermanode);
    assert_eq!(response.get(&claim).unwrap().outcome, DescribeOutcome::NotPermanode);
}

#[tokio::test]
async fn duplicate_requests_collapse() {
    let fx = fixture();
    let p = stored_permanode(&fx, &owner(), 1).await;
    let response = fx.service.describe(&[p, p, p]).await.unwrap();
    assert_eq!(response.len(), 1);
    assert!(response.view(&p).unwrap().is_empty());
}

#[tokio::test]
async fn describe_uses_two_batched_reads() {
    let fx = fixture();
    let mut permanodes = Vec::new();
    for n in 1..=3 {
        let p = stored_permanode(&fx, &owner(), n).await;
        for secs in 0..4 {
            fx.index
                .append(&add_at(&owner(), p, "tag", &format!("t{secs}"), secs))
                .await
                .unwrap();
        }
        permanodes.push(p);
    }

    let before = fx.memory.stats();
    let response = fx.service.describe(&permanodes).await.unwrap();
    let after = fx.memory.stats();

    assert_eq!(response.error_count(), 0);
    assert_eq!(after.batch_reads - before.batch_reads, 2);
    assert_eq!(after.point_reads, before.point_reads);
}

#[tokio::test]
async fn cached_views_skip_claim_fetch() {
    let fx = fixture();
    let p = stored_permanode(&fx, &owner(), 1).await;
    fx.index.append(&set_at(&owner(), p, "title", "Cached", 1)).await.unwrap();

    fx.service.describe(&[p]).await.unwrap();
    let before = fx.memory.stats();
    let response = fx.service.describe(&[p]).await.unwrap();
    let after = fx.memory.stats();

    assert_eq!(response.view(&p).unwrap().get("title"), ["Cached"]);
    assert_eq!(after.batch_reads - before.batch_reads, 1);
    assert_eq!(fx.service.cache().unwrap().stats().hits, 1);
}

#[tokio::test]
async fn new_claim_is_visible_after_append() {
    let fx = fixture();
    let p = stored_permanode(&fx, &owner(), 1).await;
    fx.index.append(&set_at(&owner(), p, "title", "Before", 1)).await.unwrap();
    let first = fx.service.describe(&[p]).await.unwrap();
    assert_eq!(first.view(&p).unwrap().get("title"), ["Before"]);

    // appended without touching the cache
    fx.index.append(&set_at(&owner(), p, "title", "After", 2)).await.unwrap();
    let second = fx.service.describe(&[p]).await.unwrap();
    assert_eq!(second.view(&p).unwrap().get("title"), ["After"]);

    fx.index.append(&add_at(&owner(), p, "tag", "fresh", 3)).await.unwrap();
    fx.service.invalidate(&p).await;
    let third = fx.service.describe(&[p]).await.unwrap();
    assert_eq!(third.view(&p).unwrap().get("tag"), ["fresh"]);
}

#[tokio::test]
async fn missing_claim_body_fails_only_that_item() {
    let fx = fixture();
    let broken = stored_permanode(&fx, &owner(), 1).await;
    let healthy = stored_permanode(&fx, &owner(), 2).await;
    let lost = fx
        .index
        .append(&set_at(&owner(), broken, "title", "lost", 1))
        .await
        .unwrap()
        .claim_ref;
    fx.index.append(&set_at(&owner(), healthy, "title", "ok", 1)).await.unwrap();
    fx.memory.remove(&lost);

    let response = fx.service.describe(&[broken, healthy]).await.unwrap();
    assert!(matches!(
        response.get(&broken).unwrap().outcome,
        DescribeOutcome::ResolutionError(_)
    ));
    assert_eq!(response.view(&healthy).unwrap().get("title"), ["ok"]);
}

#[tokio::test]
async fn owner_is_learned_from_permanode_blob() {
    let fx = fixture_with(Arc::new(OwnerPolicy::new()));
    let p = stored_permanode(&fx, &owner(), 1).await;
    fx.index.append(&set_at(&owner(), p, "title", "Real", 1)).await.unwrap();
    fx.index.append(&set_at(&intruder(), p, "title", "Fake", 2)).await.unwrap();

    let response = fx.service.describe(&[p]).await.unwrap();
    assert_eq!(response.view(&p).unwrap().get("title"), ["Real"]);
    assert_eq!(fx.index.claim_count(&p), 2);
}

#[tokio::test]
async fn as_of_bypasses_cache() {
    let fx = fixture();
    let p = stored_permanode(&fx, &owner(), 1).await;
    fx.index.append(&set_at(&owner(), p, "title", "v1", 1)).await.unwrap();
    fx.index.append(&set_at(&owner(), p, "title", "v2", 10)).await.unwrap();

    let past = fx
        .service
        .describe_with(&[p], &ResolveOptions::default().with_as_of(at(5)))
        .await
        .unwrap();
    assert_eq!(past.view(&p).unwrap().get("title"), ["v1"]);

    let now = fx.service.describe(&[p]).await.unwrap();
    assert_eq!(now.view(&p).unwrap().get("title"), ["v2"]);
}

#[tokio::test]
async fn other_add_semantics_never_share_cached_views() {
    let fx = fixture();
    let p = stored_permanode(&fx, &owner(), 1).await;
    fx.index.append(&add_at(&owner(), p, "tag", "dup", 1)).await.unwrap();
    fx.index.append(&add_at(&owner(), p, "tag", "dup", 2)).await.unwrap();
    let set = ResolveOptions::default().with_add_semantics(AddSemantics::Set);

    let multiset = fx.service.describe(&[p]).await.unwrap();
    assert_eq!(multiset.view(&p).unwrap().get("tag"), ["dup", "dup"]);

    let deduped = fx.service.describe_with(&[p], &set).await.unwrap();
    let replayed = fx.service.resolver().resolve(&p, &set).await.unwrap();
    assert_eq!(deduped.view(&p).unwrap().get("tag"), ["dup"]);
    assert_eq!(deduped.view(&p).unwrap(), &replayed);

    let again = fx.service.describe(&[p]).await.unwrap();
    assert_eq!(again.view(&p).unwrap().get("tag"), ["dup", "dup"]);
}

#[tokio::test]
async fn grant_and_revoke_show_up_in_cached_describe() {
    let policy = Arc::new(OwnerPolicy::new());
    let fx = fixture_with(policy.clone());
    let p = stored_permanode(&fx, &owner(), 1).await;
    fx.index.append(&add_at(&delegate(), p, "tag", "shared", 1)).await.unwrap();
    let current = ResolveOptions::default();

    let before = fx.service.describe(&[p]).await.unwrap();
    assert!(before.view(&p).unwrap().get("tag").is_empty());

    policy.grant(p, delegate().id());
    let granted = fx.service.describe(&[p]).await.unwrap();
    let replayed = fx.service.resolver().resolve(&p, &current).await.unwrap();
    assert_eq!(granted.view(&p).unwrap().get("tag"), ["shared"]);
    assert_eq!(granted.view(&p).unwrap(), &replayed);

    policy.revoke(&p, &delegate().id());
    let revoked = fx.service.describe(&[p]).await.unwrap();
    assert!(revoked.view(&p).unwrap().get("tag").is_empty());

    let stats = fx.service.cache().unwrap().stats();
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 3);
}

#[tokio::test]
async fn store_outage_fails_whole_batch() {
    let store = FailingBlobStore::new();
    let index = Arc::new(ClaimLogIndex::new(Arc::new(store.clone())));
    let service = DescribeService::new(PermanodeResolver::new(index, Arc::new(AllowAll)));
    store.set_fail_gets(true);

    let err = service.describe(&[BlobRef::compute(b"x")]).await.unwrap_err();
    assert!(matches!(err, DescribeError::StorageUnavailable(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn response_serializes_to_documented_shape() {
    let fx = fixture();
    let p = stored_permanode(&fx, &owner(), 1).await;
    fx.index.append(&set_at(&owner(), p, "title", "Hi", 1)).await.unwrap();
    fx.index.append(&add_at(&owner(), p, "tag", "a", 2)).await.unwrap();

    let response = fx.service.describe(&[p]).await.unwrap();
    let value = serde_json::to_value(&response).unwrap();
    let item = &value[p.to_string()];
    assert_eq!(item["blobRef"], p.to_string());
    assert_eq!(item["permanode"]["attr"]["title"], serde_json::json!(["Hi"]));
    assert_eq!(item["permanode"]["attr"]["tag"], serde_json::json!(["a"]));
    assert!(item["permanode"]["modified"].is_string());
}
