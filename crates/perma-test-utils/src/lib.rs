//! Testing utilities for the perma workspace
//!
//! Shared signers, deterministic timestamps, claim builders and a blob store
//! that can be told to fail.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use perma_blob::{BlobRef, BlobStore, BlobStoreError, Bytes, MemoryBlobStore, SharedBlobStore};
use perma_claim::{Claim, ClaimDraft, ClaimType, Permanode, Signer};

pub fn owner() -> Signer {
    Signer::from_seed([1; 32])
}

pub fn delegate() -> Signer {
    Signer::from_seed([2; 32])
}

pub fn intruder() -> Signer {
    Signer::from_seed([66; 32])
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2011, 6, 1, 0, 0, 0).unwrap()
}

/// `base_time()` plus `secs` seconds
pub fn at(secs: i64) -> DateTime<Utc> {
    base_time() + Duration::seconds(secs)
}

/// Deterministic permanode owned by `signer`; `n` picks the nonce
pub fn permanode_of(signer: &Signer, n: u8) -> Permanode {
    signer.new_permanode_at(base_time(), [n; 16]).unwrap()
}

pub fn claim_at(
    signer: &Signer,
    target: BlobRef,
    claim_type: ClaimType,
    attribute: &str,
    value: &str,
    secs: i64,
) -> Claim {
    signer
        .sign_claim(ClaimDraft::new(target, claim_type, attribute, value, at(secs)))
        .unwrap()
}

pub fn set_at(signer: &Signer, target: BlobRef, attribute: &str, value: &str, secs: i64) -> Claim {
    claim_at(signer, target, ClaimType::SetAttribute, attribute, value, secs)
}

pub fn add_at(signer: &Signer, target: BlobRef, attribute: &str, value: &str, secs: i64) -> Claim {
    claim_at(signer, target, ClaimType::AddAttribute, attribute, value, secs)
}

pub fn del_at(signer: &Signer, target: BlobRef, attribute: &str, value: &str, secs: i64) -> Claim {
    claim_at(signer, target, ClaimType::DelAttribute, attribute, value, secs)
}

/// Memory store plus a shared trait-object handle to the same storage
pub fn memory_store() -> (MemoryBlobStore, SharedBlobStore) {
    let store = MemoryBlobStore::new();
    let shared: SharedBlobStore = Arc::new(store.clone());
    (store, shared)
}

/// Blob store whose reads and writes can be switched to fail
#[derive(Debug, Clone, Default)]
pub struct FailingBlobStore {
    inner: MemoryBlobStore,
    fail_puts: Arc<AtomicBool>,
    fail_gets: Arc<AtomicBool>,
}

impl FailingBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memory(&self) -> &MemoryBlobStore {
        &self.inner
    }

    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, op: &str) -> Result<(), BlobStoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(BlobStoreError::unavailable(format!("injected {op} failure")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BlobStore for FailingBlobStore {
    async fn put(&self, bytes: &[u8]) -> Result<BlobRef, BlobStoreError> {
        Self::check(&self.fail_puts, "put")?;
        self.inner.put(bytes).await
    }

    async fn get(&self, blob: &BlobRef) -> Result<Option<Bytes>, BlobStoreError> {
        Self::check(&self.fail_gets, "get")?;
        self.inner.get(blob).await
    }

    async fn get_many(
        &self,
        blobs: &[BlobRef],
        concurrency: usize,
    ) -> Result<BTreeMap<BlobRef, Bytes>, BlobStoreError> {
        Self::check(&self.fail_gets, "get_many")?;
        self.inner.get_many(blobs, concurrency).await
    }

    async fn enumerate(&self) -> Result<Vec<BlobRef>, BlobStoreError> {
        Self::check(&self.fail_gets, "enumerate")?;
        self.inner.enumerate().await
    }
}
