//! Scripted title/tag editing session against an in-memory store

use std::sync::Arc;

use perma_blob::{BlobRef, BlobStore, MemoryBlobStore, SharedBlobStore};
use perma_claim::Signer;
use perma_core::{PermanodeService, ServiceConfig};
use perma_describe::DescribeResponse;
use perma_resolve::OwnerPolicy;

/// Outcome of the demo session
#[derive(Debug)]
pub struct DemoRun {
    pub service: PermanodeService,
    pub permanode: BlobRef,
    /// Human-readable log of each step
    pub steps: Vec<String>,
}

/// Create a permanode, edit it as owner, delegate and stranger
///
/// # Errors
/// Returns error if any store operation fails
pub async fn run_demo(config: ServiceConfig) -> anyhow::Result<DemoRun> {
    let store: SharedBlobStore = Arc::new(MemoryBlobStore::new());
    let policy = Arc::new(OwnerPolicy::new());
    let service = PermanodeService::new(store, policy.clone(), config);

    let alice = Signer::generate();
    let carol = Signer::generate();
    let mallory = Signer::generate();
    let mut steps = Vec::new();

    let doc = service.new_permanode(&alice).await?;
    steps.push(format!("alice created permanode {doc}"));

    service.set_attribute(&alice, doc, "title", "Vacation photos").await?;
    steps.push("alice set title = \"Vacation photos\"".to_owned());

    for tag in ["beach", "2011", "family"] {
        service.add_attribute(&alice, doc, "tag", tag).await?;
        steps.push(format!("alice added tag {tag}"));
    }
    service.del_attribute(&alice, doc, "tag", "2011").await?;
    steps.push("alice removed tag 2011".to_owned());

    service.set_attribute(&alice, doc, "title", "Summer vacation").await?;
    steps.push("alice set title = \"Summer vacation\"".to_owned());

    let outcome = service.set_attribute(&mallory, doc, "title", "pwned").await?;
    steps.push(format!(
        "mallory set title = \"pwned\" (stored as {}, authorized: {})",
        outcome.claim_ref.short(),
        outcome.authorized
    ));

    policy.grant(doc, carol.id());
    service.add_attribute(&carol, doc, "tag", "shared").await?;
    steps.push("carol (delegate) added tag shared".to_owned());

    Ok(DemoRun {
        service,
        permanode: doc,
        steps,
    })
}

/// Describe the demo permanode alongside a plain file and a missing blob
///
/// # Errors
/// Returns error if the demo or the describe batch fails
pub async fn describe_json(config: ServiceConfig) -> anyhow::Result<(DescribeResponse, serde_json::Value)> {
    let run = run_demo(config).await?;
    let file = run.service.store().put(b"IMG_0001.jpg bytes").await?;
    let missing = BlobRef::compute(b"never uploaded");

    let response = run.service.describe(&[run.permanode, file, missing]).await?;
    let value = serde_json::to_value(&response)?;
    Ok((response, value))
}
