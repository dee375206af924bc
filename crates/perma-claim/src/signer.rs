//! Claim signing
//!
//! Issues signed permanodes and claims. All bytes covered by the signature
//! come from the canonical codec, so verification is a re-encode plus an
//! ed25519 check.

use std::fmt;

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer as _, SigningKey};
use perma_blob::BlobRef;

use crate::codec;
use crate::error::ClaimError;
use crate::schema::{Claim, ClaimDraft, ClaimType, Permanode, SignerId};

/// Holder of an ed25519 signing key
#[derive(Clone)]
pub struct Signer {
    signing_key: SigningKey,
}

impl Signer {
    /// Create a signer from a fresh random key
    #[must_use]
    pub fn generate() -> Self {
        Self::from_seed(rand::random())
    }

    /// Create a signer from a 32-byte seed (deterministic)
    #[must_use]
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Public identity of this signer
    #[must_use]
    pub fn id(&self) -> SignerId {
        SignerId::from(self.signing_key.verifying_key())
    }

    /// Sign a claim draft
    ///
    /// # Errors
    /// Returns error if the draft fails validation
    pub fn sign_claim(&self, draft: ClaimDraft) -> Result<Claim, ClaimError> {
        draft.validate()?;
        let signer = self.id();
        let message = codec::claim_signing_bytes(&draft, &signer)?;
        let signature = self.signing_key.sign(&message);
        Ok(Claim::from_parts(draft, signer, signature))
    }

    /// Sign a claim stamped with the current time
    ///
    /// # Errors
    /// Returns error if the attribute is empty
    pub fn claim_now(
        &self,
        target: BlobRef,
        claim_type: ClaimType,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Claim, ClaimError> {
        self.sign_claim(ClaimDraft::new(
            target,
            claim_type,
            attribute,
            value,
            Utc::now(),
        ))
    }

    /// Create a new permanode owned by this signer
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn new_permanode(&self) -> Result<Permanode, ClaimError> {
        self.new_permanode_at(Utc::now(), rand::random())
    }

    /// Create a permanode with explicit time and nonce (deterministic)
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn new_permanode_at(
        &self,
        created: DateTime<Utc>,
        random: [u8; 16],
    ) -> Result<Permanode, ClaimError> {
        let random = hex::encode(random);
        let signer = self.id();
        let message = codec::permanode_signing_bytes(&random, created, &signer)?;
        let signature = self.signing_key.sign(&message);
        Ok(Permanode::from_parts(random, created, signer, signature))
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer").field("id", &self.id().short()).finish()
    }
}
