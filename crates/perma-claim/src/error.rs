//! Claim codec errors

use perma_blob::BlobRefError;

/// Errors raised while encoding, decoding or verifying schema blobs.
///
/// Every variant means the blob must be rejected before it reaches storage.
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    /// Structure is wrong or a required field is absent
    #[error("malformed claim: {reason}")]
    Malformed { reason: String },

    /// Signature does not verify against the signer key
    #[error("signature verification failed for signer {signer}")]
    BadSignature { signer: String },

    /// Schema version this codec does not understand
    #[error("unsupported schema version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// Bytes are valid JSON but not a schema blob at all
    #[error("not a schema blob")]
    NotSchemaBlob,

    /// Blob is a schema blob of a different type
    #[error("unexpected blob type: expected {expected}, got {actual}")]
    UnexpectedType { expected: String, actual: String },

    /// Encoding failed
    #[error("encoding error: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ClaimError {
    /// Create a malformed-claim error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

impl From<BlobRefError> for ClaimError {
    fn from(err: BlobRefError) -> Self {
        Self::malformed(format!("bad blob reference: {err}"))
    }
}
