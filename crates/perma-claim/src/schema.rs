//! Schema blob types
//!
//! A [`Permanode`] is a signed blob that carries no attributes; it only
//! anchors identity. A [`Claim`] is a signed statement mutating one attribute
//! of one permanode. Both are immutable once built.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use perma_blob::BlobRef;

use crate::codec;
use crate::error::ClaimError;

/// Public identity of a claim author (ed25519 verifying key bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignerId([u8; 32]);

impl SignerId {
    /// Create from raw key bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short string representation (first 16 hex chars)
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }

    /// Interpret the identity as an ed25519 verifying key
    ///
    /// # Errors
    /// Returns error if the bytes are not a valid curve point
    pub fn verifying_key(&self) -> Result<VerifyingKey, ClaimError> {
        VerifyingKey::from_bytes(&self.0)
            .map_err(|e| ClaimError::malformed(format!("invalid signer key: {e}")))
    }
}

impl From<VerifyingKey> for SignerId {
    fn from(key: VerifyingKey) -> Self {
        Self(key.to_bytes())
    }
}

impl Display for SignerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for SignerId {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| ClaimError::malformed(format!("signer: {e}")))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ClaimError::malformed("signer must be 32 bytes"))?;
        Ok(Self(arr))
    }
}

/// Kind of mutation a claim performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClaimType {
    /// Replace the attribute with a single value
    SetAttribute,
    /// Append a value to the attribute
    AddAttribute,
    /// Remove one value, or the whole attribute when the value is empty
    DelAttribute,
}

impl ClaimType {
    /// Wire name of the claim type
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SetAttribute => "set-attribute",
            Self::AddAttribute => "add-attribute",
            Self::DelAttribute => "del-attribute",
        }
    }
}

impl Display for ClaimType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimType {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "set-attribute" => Ok(Self::SetAttribute),
            "add-attribute" => Ok(Self::AddAttribute),
            "del-attribute" => Ok(Self::DelAttribute),
            other => Err(ClaimError::malformed(format!("unknown claim type '{other}'"))),
        }
    }
}

/// Unsigned claim content
///
/// Turned into a [`Claim`] by [`Signer::sign_claim`](crate::Signer::sign_claim).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimDraft {
    /// Permanode being mutated
    pub target: BlobRef,
    /// Mutation kind
    pub claim_type: ClaimType,
    /// Attribute name
    pub attribute: String,
    /// Attribute value
    pub value: String,
    /// Claimant-asserted creation time
    pub timestamp: DateTime<Utc>,
}

impl ClaimDraft {
    /// Create a draft
    pub fn new(
        target: BlobRef,
        claim_type: ClaimType,
        attribute: impl Into<String>,
        value: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            target,
            claim_type,
            attribute: attribute.into(),
            value: value.into(),
            timestamp,
        }
    }

    /// Validate structural invariants
    ///
    /// # Errors
    /// Returns error if the attribute name is empty
    pub fn validate(&self) -> Result<(), ClaimError> {
        if self.attribute.is_empty() {
            return Err(ClaimError::malformed("attribute must not be empty"));
        }
        Ok(())
    }
}

/// Signed, immutable attribute mutation
///
/// # Invariants
/// - `attribute` is non-empty
/// - the blob reference is a pure function of the canonical encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    draft: ClaimDraft,
    signer: SignerId,
    signature: Signature,
}

impl Claim {
    pub(crate) fn from_parts(draft: ClaimDraft, signer: SignerId, signature: Signature) -> Self {
        Self {
            draft,
            signer,
            signature,
        }
    }

    /// Permanode being mutated
    #[inline]
    #[must_use]
    pub fn target(&self) -> &BlobRef {
        &self.draft.target
    }

    /// Mutation kind
    #[inline]
    #[must_use]
    pub fn claim_type(&self) -> ClaimType {
        self.draft.claim_type
    }

    /// Attribute name
    #[inline]
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.draft.attribute
    }

    /// Attribute value
    #[inline]
    #[must_use]
    pub fn value(&self) -> &str {
        &self.draft.value
    }

    /// Claimant-asserted creation time
    #[inline]
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.draft.timestamp
    }

    /// Author identity
    #[inline]
    #[must_use]
    pub fn signer(&self) -> &SignerId {
        &self.signer
    }

    /// Signature over the unsigned canonical encoding
    #[inline]
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Unsigned content
    #[inline]
    #[must_use]
    pub fn draft(&self) -> &ClaimDraft {
        &self.draft
    }

    /// Canonical byte encoding
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn encode(&self) -> Result<Vec<u8>, ClaimError> {
        codec::encode_claim(self)
    }

    /// Content reference of the canonical encoding
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn blob_ref(&self) -> Result<BlobRef, ClaimError> {
        Ok(codec::digest(&self.encode()?))
    }

    /// Verify the signature against the signer key
    ///
    /// # Errors
    /// Returns [`ClaimError::BadSignature`] if verification fails
    pub fn verify(&self) -> Result<(), ClaimError> {
        let message = codec::claim_signing_bytes(&self.draft, &self.signer)?;
        self.signer
            .verifying_key()?
            .verify(&message, &self.signature)
            .map_err(|_| ClaimError::BadSignature {
                signer: self.signer.to_string(),
            })
    }
}

/// Signed anchor blob for a mutable entity
///
/// The signer is the permanode's owner. `random` makes two permanodes
/// created by the same owner at the same instant distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permanode {
    random: String,
    created: DateTime<Utc>,
    signer: SignerId,
    signature: Signature,
}

impl Permanode {
    pub(crate) fn from_parts(
        random: String,
        created: DateTime<Utc>,
        signer: SignerId,
        signature: Signature,
    ) -> Self {
        Self {
            random,
            created,
            signer,
            signature,
        }
    }

    /// Uniqueness nonce (hex)
    #[inline]
    #[must_use]
    pub fn random(&self) -> &str {
        &self.random
    }

    /// Creation time asserted by the owner
    #[inline]
    #[must_use]
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Owner identity
    #[inline]
    #[must_use]
    pub fn owner(&self) -> &SignerId {
        &self.signer
    }

    /// Owner's signature over the unsigned canonical encoding
    #[inline]
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Canonical byte encoding
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn encode(&self) -> Result<Vec<u8>, ClaimError> {
        codec::encode_permanode(self)
    }

    /// Content reference of the canonical encoding
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn blob_ref(&self) -> Result<BlobRef, ClaimError> {
        Ok(codec::digest(&self.encode()?))
    }

    /// Verify the owner's signature
    ///
    /// # Errors
    /// Returns [`ClaimError::BadSignature`] if verification fails
    pub fn verify(&self) -> Result<(), ClaimError> {
        let message = codec::permanode_signing_bytes(&self.random, self.created, &self.signer)?;
        self.signer
            .verifying_key()?
            .verify(&message, &self.signature)
            .map_err(|_| ClaimError::BadSignature {
                signer: self.signer.to_string(),
            })
    }
}

/// Any decodable schema blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaBlob {
    /// Permanode anchor
    Permanode(Permanode),
    /// Attribute claim
    Claim(Claim),
}

impl SchemaBlob {
    /// Wire name of the blob type
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Permanode(_) => codec::PERMANODE_TYPE,
            Self::Claim(_) => codec::CLAIM_TYPE,
        }
    }
}
